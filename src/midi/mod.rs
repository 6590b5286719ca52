//! MIDI event timeline: ordered sequence + range-slice query.

mod file;

pub use file::MidiSource;

/// A single MIDI event, annotated with both its sample-offset within the
/// block it's delivered in (`delta_frames`) and its absolute position
/// (`timestamp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    pub delta_frames: u32,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
    pub timestamp: u64,
}

/// An ordered, immutable-after-load timeline of MIDI events.
///
/// Sorted by `timestamp` ascending; ties broken by original file order
/// (a stable sort over file-index-tagged events), per spec.md §9's
/// explicit statement of the existing (previously implicit) behavior.
#[derive(Debug, Default, Clone)]
pub struct MidiSequence {
    events: Vec<MidiEvent>,
}

impl MidiSequence {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Builds a sequence from already-timestamped events, sorting them
    /// stably by timestamp so that simultaneous events keep their
    /// original (file) order.
    pub fn from_events(mut events: Vec<MidiEvent>) -> Self {
        events.sort_by_key(|e| e.timestamp);
        Self { events }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.events.last().map(|e| e.timestamp)
    }

    /// Appends every event with `timestamp` in `[start, start + blocksize)`
    /// to `out`, rewriting `delta_frames = timestamp - start`.
    ///
    /// Returns `true` if any event in the sequence has a timestamp at or
    /// past `start + blocksize` (more events remain); `false` once the
    /// query range is past the last event, signaling end-of-sequence.
    pub fn fill_range(&self, start: u64, blocksize: usize, out: &mut Vec<MidiEvent>) -> bool {
        let end = start + blocksize as u64;
        let mut more_remain = false;

        for event in &self.events {
            if event.timestamp >= start && event.timestamp < end {
                out.push(MidiEvent {
                    delta_frames: (event.timestamp - start) as u32,
                    ..*event
                });
            } else if event.timestamp >= end {
                more_remain = true;
            }
        }
        more_remain
    }
}
