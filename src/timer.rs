//! Per-component wall-clock accounting.
//!
//! One slot per plugin plus one reserved for the host (index `num_plugins`).
//! At most one task is active at a time; starting a task stops whichever
//! task was previously active and accumulates its elapsed time first.

use std::time::{Duration, Instant};

/// A single task's accumulated time.
#[derive(Debug, Clone, Copy)]
struct TaskSlot {
    accumulated: Duration,
}

impl TaskSlot {
    fn new() -> Self {
        Self {
            accumulated: Duration::ZERO,
        }
    }
}

/// Wall-clock accounting for the host task plus every plugin in the chain.
#[derive(Debug)]
pub struct TaskTimer {
    slots: Vec<TaskSlot>,
    active: Option<(usize, Instant)>,
}

/// Reserved task id for host-side bookkeeping (MIDI slicing, I/O, clock advance).
pub fn host_task_id(num_plugins: usize) -> usize {
    num_plugins
}

impl TaskTimer {
    /// Creates a timer sized to `num_plugins + 1` slots, per spec.
    pub fn new(num_plugins: usize) -> Self {
        Self {
            slots: vec![TaskSlot::new(); num_plugins + 1],
            active: None,
        }
    }

    /// Stops the active task (if any) and starts `id`. A no-op if `id` is
    /// already the active task.
    pub fn start(&mut self, id: usize) {
        if let Some((active_id, _)) = self.active {
            if active_id == id {
                return;
            }
        }
        self.stop();
        self.active = Some((id, Instant::now()));
    }

    /// Stops whichever task is active, accumulating its elapsed time.
    pub fn stop(&mut self) {
        if let Some((id, started_at)) = self.active.take() {
            self.slots[id].accumulated += started_at.elapsed();
        }
    }

    /// Returns `(task_id, accumulated_millis, percentage_of_total)` for every slot.
    pub fn totals(&self) -> Vec<(usize, u128, f64)> {
        let total: u128 = self.slots.iter().map(|s| s.accumulated.as_millis()).sum();
        self.slots
            .iter()
            .enumerate()
            .map(|(id, slot)| {
                let millis = slot.accumulated.as_millis();
                let pct = if total == 0 {
                    0.0
                } else {
                    millis as f64 / total as f64 * 100.0
                };
                (id, millis, pct)
            })
            .collect()
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }
}

impl Clone for TaskSlot {
    fn clone(&self) -> Self {
        *self
    }
}
