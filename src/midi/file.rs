//! Standard MIDI File loading, via `midly`.
//!
//! Events are parsed in file order, assigned absolute sample-position
//! timestamps using the file's tempo map and the engine's sample rate,
//! then handed to [`super::MidiSequence::from_events`] for the stable
//! sort spec.md §4.4 requires. Streaming MIDI is explicitly unsupported:
//! `read_all_events` loads the whole file before the processing loop starts.

use std::fs;
use std::path::{Path, PathBuf};

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use super::{MidiEvent, MidiSequence};
use crate::error::EngineError;

/// Default tempo assumed before the first tempo meta-event: 120 BPM.
const DEFAULT_MICROS_PER_BEAT: u32 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Unopened,
    Open,
    Closed,
    Failed,
}

/// A Standard MIDI File (Type-0 or Type-1) source.
pub struct MidiSource {
    path: PathBuf,
    state: SourceState,
    bytes: Option<Vec<u8>>,
}

impl MidiSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            state: SourceState::Unopened,
            bytes: None,
        }
    }

    /// Opens the file (reads it into memory; parsing is deferred to
    /// `read_all_events` so open failures and parse failures are
    /// distinguishable).
    pub fn open(&mut self) -> Result<(), EngineError> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                self.bytes = Some(bytes);
                self.state = SourceState::Open;
                Ok(())
            }
            Err(err) => {
                self.state = SourceState::Failed;
                Err(EngineError::Io(format!(
                    "cannot open MIDI file '{}': {err}",
                    self.path.display()
                )))
            }
        }
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    /// Parses every event in the file into `sample_rate`-relative absolute
    /// sample-position timestamps and loads them into `sequence`.
    pub fn read_all_events(
        &mut self,
        sample_rate: f64,
        sequence: &mut MidiSequence,
    ) -> Result<(), EngineError> {
        let bytes = self
            .bytes
            .as_ref()
            .ok_or_else(|| EngineError::Io("read_all_events called before open".to_string()))?;

        let smf = Smf::parse(bytes)
            .map_err(|err| EngineError::Io(format!("malformed MIDI file: {err}")))?;

        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(tpb) => tpb.as_int() as u32,
            Timing::Timecode(fps, subframe) => {
                // SMPTE timing: treat "ticks" as subframes-per-second units;
                // there is no tempo map to honor, each tick is a fixed duration.
                let ticks_per_second = fps.as_f32() as u32 * subframe as u32;
                return self.read_smpte_events(&smf, ticks_per_second, sample_rate, sequence);
            }
        };

        let tempo_map = build_tempo_map(&smf);

        let mut raw_events: Vec<(u32, usize, MidiEvent)> = Vec::new();
        for (track_index, track) in smf.tracks.iter().enumerate() {
            let mut tick: u32 = 0;
            let mut order = 0usize;
            for track_event in track {
                tick += track_event.delta.as_int();
                match track_event.kind {
                    TrackEventKind::Midi { channel, message } => {
                        if let Some((status, data1, data2)) = encode_midi_message(channel.as_int(), message) {
                            let sample_position = tempo_map.tick_to_sample(tick, ticks_per_beat, sample_rate);
                            raw_events.push((
                                tick,
                                track_index * 1_000_000 + order,
                                MidiEvent {
                                    delta_frames: 0,
                                    status,
                                    data1,
                                    data2,
                                    timestamp: sample_position,
                                },
                            ));
                            order += 1;
                        }
                    }
                    TrackEventKind::SysEx(_) | TrackEventKind::Escape(_) => {
                        log::warn!(
                            "track {track_index}, tick {tick}: skipping unsupported SysEx/escape event (MIDI partial parse)"
                        );
                    }
                    // Tempo events are consumed by build_tempo_map; every
                    // other meta event (track name, markers, …) carries no
                    // audio-relevant information for this host.
                    _ => {}
                }
            }
        }

        // Original file order (track, then within-track position) breaks
        // ties; MidiSequence::from_events does the timestamp-stable sort.
        raw_events.sort_by_key(|(_, order_key, _)| *order_key);
        let events = raw_events.into_iter().map(|(_, _, event)| event).collect();
        *sequence = MidiSequence::from_events(events);
        Ok(())
    }

    fn read_smpte_events(
        &self,
        smf: &Smf,
        ticks_per_second: u32,
        sample_rate: f64,
        sequence: &mut MidiSequence,
    ) -> Result<(), EngineError> {
        let mut raw_events: Vec<(usize, MidiEvent)> = Vec::new();
        for (track_index, track) in smf.tracks.iter().enumerate() {
            let mut tick: u32 = 0;
            let mut order = 0usize;
            for track_event in track {
                tick += track_event.delta.as_int();
                match track_event.kind {
                    TrackEventKind::Midi { channel, message } => {
                        if let Some((status, data1, data2)) = encode_midi_message(channel.as_int(), message) {
                            let seconds = tick as f64 / ticks_per_second.max(1) as f64;
                            let sample_position = (seconds * sample_rate).round() as u64;
                            raw_events.push((
                                track_index * 1_000_000 + order,
                                MidiEvent {
                                    delta_frames: 0,
                                    status,
                                    data1,
                                    data2,
                                    timestamp: sample_position,
                                },
                            ));
                            order += 1;
                        }
                    }
                    TrackEventKind::SysEx(_) | TrackEventKind::Escape(_) => {
                        log::warn!(
                            "track {track_index}, tick {tick}: skipping unsupported SysEx/escape event (MIDI partial parse)"
                        );
                    }
                    _ => {}
                }
            }
        }
        raw_events.sort_by_key(|(order_key, _)| *order_key);
        let events = raw_events.into_iter().map(|(_, event)| event).collect();
        *sequence = MidiSequence::from_events(events);
        Ok(())
    }

    pub fn close(&mut self) {
        self.state = SourceState::Closed;
    }
}

/// Packs a channel voice message into `(status, data1, data2)` the way
/// spec.md's `MidiEvent` stores it.
fn encode_midi_message(channel: u8, message: MidiMessage) -> Option<(u8, u8, u8)> {
    match message {
        MidiMessage::NoteOff { key, vel } => Some((0x80 | channel, key.as_int(), vel.as_int())),
        MidiMessage::NoteOn { key, vel } => Some((0x90 | channel, key.as_int(), vel.as_int())),
        MidiMessage::Aftertouch { key, vel } => Some((0xA0 | channel, key.as_int(), vel.as_int())),
        MidiMessage::Controller { controller, value } => {
            Some((0xB0 | channel, controller.as_int(), value.as_int()))
        }
        MidiMessage::ProgramChange { program } => Some((0xC0 | channel, program.as_int(), 0)),
        MidiMessage::ChannelAftertouch { vel } => Some((0xD0 | channel, vel.as_int(), 0)),
        MidiMessage::PitchBend { bend } => {
            let raw = bend.0.as_int();
            let lsb = (raw & 0x7F) as u8;
            let msb = ((raw >> 7) & 0x7F) as u8;
            Some((0xE0 | channel, lsb, msb))
        }
    }
}

/// A tempo change at a given tick, in microseconds per quarter note.
struct TempoChange {
    tick: u32,
    micros_per_beat: u32,
    /// Absolute seconds elapsed at `tick`, precomputed for fast lookup.
    seconds_at_tick: f64,
}

struct TempoMap {
    changes: Vec<TempoChange>,
}

impl TempoMap {
    /// Converts a tick position to an absolute sample position, walking
    /// the tempo segments accumulated so far.
    fn tick_to_sample(&self, tick: u32, ticks_per_beat: u32, sample_rate: f64) -> u64 {
        let segment = self
            .changes
            .iter()
            .rev()
            .find(|c| c.tick <= tick)
            .expect("tempo map always has an entry at tick 0");

        let ticks_into_segment = (tick - segment.tick) as f64;
        let seconds_per_tick = (segment.micros_per_beat as f64 / ticks_per_beat as f64) / 1_000_000.0;
        let seconds = segment.seconds_at_tick + ticks_into_segment * seconds_per_tick;
        (seconds * sample_rate).round() as u64
    }
}

/// Scans every track for tempo meta-events and builds a sorted map from
/// tick to elapsed wall-clock time. Logs a warning for meta-events of an
/// unrecognized type, since one of those could in principle be a tempo
/// change this parser doesn't know how to interpret.
fn build_tempo_map(smf: &Smf) -> TempoMap {
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int() as u32,
        Timing::Timecode(..) => 1,
    };

    let mut raw_changes: Vec<(u32, u32)> = vec![(0, DEFAULT_MICROS_PER_BEAT)];
    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut tick = 0u32;
        for track_event in track {
            tick += track_event.delta.as_int();
            match track_event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(micros)) => {
                    raw_changes.push((tick, micros.as_int()));
                }
                TrackEventKind::Meta(MetaMessage::Unknown(kind, _)) => {
                    log::warn!(
                        "track {track_index}, tick {tick}: unknown tempo event (meta type 0x{kind:02X}), ignored"
                    );
                }
                _ => {}
            }
        }
    }
    raw_changes.sort_by_key(|(tick, _)| *tick);
    raw_changes.dedup_by_key(|(tick, _)| *tick);

    let mut changes = Vec::with_capacity(raw_changes.len());
    let mut seconds_at_tick = 0.0f64;
    let mut prev_tick = 0u32;
    let mut prev_micros = DEFAULT_MICROS_PER_BEAT;

    for (index, (tick, micros_per_beat)) in raw_changes.into_iter().enumerate() {
        if index > 0 {
            let ticks_elapsed = (tick - prev_tick) as f64;
            let seconds_per_tick = (prev_micros as f64 / ticks_per_beat as f64) / 1_000_000.0;
            seconds_at_tick += ticks_elapsed * seconds_per_tick;
        }
        changes.push(TempoChange {
            tick,
            micros_per_beat,
            seconds_at_tick,
        });
        prev_tick = tick;
        prev_micros = micros_per_beat;
    }

    TempoMap { changes }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_tempo_map_converts_ticks_linearly() {
        let map = TempoMap {
            changes: vec![TempoChange {
                tick: 0,
                micros_per_beat: 500_000, // 120 BPM
                seconds_at_tick: 0.0,
            }],
        };
        // 480 ticks/beat, 120 BPM => 1 beat = 0.5s = 22050 samples @ 44100Hz
        let sample = map.tick_to_sample(480, 480, 44100.0);
        assert_eq!(sample, 22050);
    }

    #[test]
    fn tempo_change_shifts_subsequent_ticks() {
        let map = TempoMap {
            changes: vec![
                TempoChange {
                    tick: 0,
                    micros_per_beat: 500_000,
                    seconds_at_tick: 0.0,
                },
                TempoChange {
                    tick: 480,
                    micros_per_beat: 1_000_000, // drop to 60 BPM
                    seconds_at_tick: 0.5,
                },
            ],
        };
        // One more beat at 60 BPM = 1.0s after the 0.5s already elapsed.
        let sample = map.tick_to_sample(960, 480, 44100.0);
        assert_eq!(sample, (1.5 * 44100.0).round() as u64);
    }
}
