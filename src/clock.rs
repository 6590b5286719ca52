//! Monotonic transport clock.
//!
//! Owned exclusively by the [`crate::engine::ProcessingEngine`]. Has no
//! relation to wall-clock time; it is a logical sample-position counter
//! that advances by exactly one blocksize per loop iteration.

/// Logical sample-position transport.
#[derive(Debug, Default)]
pub struct AudioClock {
    current_sample: u64,
    is_running: bool,
}

impl AudioClock {
    pub fn new() -> Self {
        Self {
            current_sample: 0,
            is_running: false,
        }
    }

    /// Resets the clock to sample zero and starts it running.
    pub fn init(&mut self) {
        self.current_sample = 0;
        self.is_running = true;
    }

    /// Advances the clock by `n` frames. No-op if the clock isn't running.
    ///
    /// # Panics
    /// Panics if `n == 0` and the clock is running; advancing by zero
    /// frames is never a meaningful loop iteration.
    pub fn advance(&mut self, n: u64) {
        if !self.is_running {
            return;
        }
        assert!(n > 0, "AudioClock::advance requires n > 0");
        self.current_sample += n;
    }

    /// Freezes the clock; subsequent `advance` calls become no-ops.
    pub fn stop(&mut self) {
        self.is_running = false;
    }

    pub fn current_sample(&self) -> u64 {
        self.current_sample
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_by_exact_blocksize() {
        let mut clock = AudioClock::new();
        clock.init();
        clock.advance(512);
        clock.advance(512);
        assert_eq!(clock.current_sample(), 1024);
    }

    #[test]
    fn stop_freezes_current_sample() {
        let mut clock = AudioClock::new();
        clock.init();
        clock.advance(512);
        clock.stop();
        clock.advance(512);
        clock.advance(512);
        assert_eq!(clock.current_sample(), 512);
        assert!(!clock.is_running());
    }

    #[test]
    #[should_panic(expected = "n > 0")]
    fn advance_zero_panics_while_running() {
        let mut clock = AudioClock::new();
        clock.init();
        clock.advance(0);
    }
}
