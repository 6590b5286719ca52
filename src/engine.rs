//! The processing engine: the single driver loop that reads input, slices
//! MIDI, drives the plugin chain, writes output, and advances the clock.

use std::path::PathBuf;

use crate::buffer::SampleBuffer;
use crate::clock::AudioClock;
use crate::error::EngineError;
use crate::midi::{MidiEvent, MidiSequence, MidiSource};
use crate::plugin::PluginChain;
use crate::settings::AudioSettings;
use crate::source::{Direction, SampleSource};
use crate::timer::TaskTimer;

/// Everything the engine needs before its pre-loop invariants can be
/// checked. Built directly from a validated [`crate::cli::RunConfig`].
pub struct EngineConfig {
    pub settings: AudioSettings,
    pub input_path: Option<PathBuf>,
    pub output_path: PathBuf,
    pub midi_path: Option<PathBuf>,
    pub plugin_spec: Option<String>,
    pub display_info: bool,
    /// Extra silent frames fed through the chain after `finishedReading`
    /// fires, before the loop stops. `0` reproduces spec behavior exactly.
    pub tail_frames: usize,
}

/// Frame counters and per-task timing reported after the loop stops.
pub struct RunReport {
    pub input_frames: u64,
    pub output_frames: u64,
    pub timings: Vec<(usize, u128, f64)>,
}

pub struct ProcessingEngine {
    settings: AudioSettings,
    clock: AudioClock,
    input: Option<SampleSource>,
    output: SampleSource,
    midi_source: Option<MidiSource>,
    midi_sequence: Option<MidiSequence>,
    chain: PluginChain,
    timer: TaskTimer,
    tail_frames: usize,
}

impl ProcessingEngine {
    /// Constructs the engine, resolving and initializing the plugin chain
    /// and opening every source. Fails fast on the first violated pre-loop
    /// invariant (spec.md §4.8).
    pub fn build(config: EngineConfig) -> Result<Self, EngineError> {
        let settings = config.settings;

        let mut chain = PluginChain::new();
        if let Some(spec) = &config.plugin_spec {
            chain.add_from_argument_string(spec, &settings)?;
        }
        if chain.is_empty() {
            return Err(EngineError::MissingRequiredOption(
                "No plugins loaded".to_string(),
            ));
        }
        chain.initialize_all(&settings)?;

        let head_is_instrument = chain.head_is_instrument();

        let mut midi_source = match &config.midi_path {
            Some(path) => {
                let mut source = MidiSource::new(path);
                source.open()?;
                Some(source)
            }
            None => None,
        };
        let midi_sequence = match midi_source.as_mut() {
            Some(source) => {
                let mut sequence = MidiSequence::new();
                source.read_all_events(settings.sample_rate, &mut sequence)?;
                Some(sequence)
            }
            None => None,
        };

        let input = match &config.input_path {
            Some(path) => {
                let mut source = SampleSource::from_path(path, Direction::Read);
                source.open(&settings)?;
                Some(source)
            }
            None if head_is_instrument => {
                if midi_sequence.is_none() {
                    return Err(EngineError::MissingRequiredOption(
                        "instrument head plugin with no --input requires --midi-file".to_string(),
                    ));
                }
                let mut source = SampleSource::silence(Direction::Read);
                source.open(&settings)?;
                Some(source)
            }
            None => {
                return Err(EngineError::MissingRequiredOption(
                    "--input is required unless the chain head is an instrument".to_string(),
                ));
            }
        };

        let mut output = SampleSource::from_path(&config.output_path, Direction::Write);
        output.open(&settings)?;

        let timer = TaskTimer::new(chain.len());

        if config.display_info {
            chain.display_info();
        }

        Ok(Self {
            settings,
            clock: AudioClock::new(),
            input,
            output,
            midi_source,
            midi_sequence,
            chain,
            timer,
            tail_frames: config.tail_frames,
        })
    }

    /// Runs the main loop to completion (spec.md §4.8) and returns the
    /// post-loop report. Sources, buffers and plugins are released before
    /// returning, on every path, including error paths.
    pub fn run(&mut self) -> Result<RunReport, EngineError> {
        let result = self.run_inner();
        self.close();
        result
    }

    fn run_inner(&mut self) -> Result<RunReport, EngineError> {
        let host_task = crate::timer::host_task_id(self.chain.len());
        self.clock.init();

        let mut in_buf = SampleBuffer::new(&self.settings);
        let mut out_buf = SampleBuffer::new(&self.settings);
        let mut events: Vec<MidiEvent> = Vec::new();

        let mut input_frames = 0u64;
        let mut output_frames = 0u64;
        let mut in_tail = false;
        let mut tail_remaining = self.tail_frames;

        loop {
            self.timer.start(host_task);

            let finished_reading = if in_tail {
                in_buf.clear();
                true
            } else {
                let input = self.input.as_mut().expect("pre-loop invariant: input present");
                let filled = input.read_sample_block(&mut in_buf)?;
                !filled
            };
            if !in_tail {
                input_frames = self
                    .input
                    .as_ref()
                    .expect("pre-loop invariant: input present")
                    .num_frames_processed();
            }

            events.clear();
            let mut midi_more_remain = true;
            if let Some(sequence) = &self.midi_sequence {
                midi_more_remain = sequence.fill_range(
                    self.clock.current_sample(),
                    self.settings.blocksize,
                    &mut events,
                );
                self.timer.start(host_task);
                self.chain.process_midi_events(&events, &mut self.timer);
            }

            // An empty sequence never has "more events ahead", so it would
            // otherwise look identical to a real end-of-sequence; spec.md
            // §4.8 treats it as no events and defers to audio EOF instead.
            let midi_governs = self
                .midi_sequence
                .as_ref()
                .is_some_and(|sequence| !sequence.is_empty());
            let midi_signals_eof = midi_governs && !midi_more_remain;
            if midi_governs && midi_signals_eof != finished_reading {
                log::warn!(
                    "MIDI end-of-sequence ({}) disagrees with audio end-of-stream ({}); MIDI overrides",
                    midi_signals_eof,
                    finished_reading
                );
            }
            let loop_should_stop = if midi_governs {
                midi_signals_eof
            } else {
                finished_reading
            };

            self.timer.start(host_task);
            self.chain.process_audio(&in_buf, &mut out_buf, &mut self.timer);

            self.timer.start(host_task);
            self.output.write_sample_block(&out_buf)?;
            output_frames = self.output.num_frames_processed();

            self.clock.advance(self.settings.blocksize as u64);

            if in_tail {
                tail_remaining = tail_remaining.saturating_sub(self.settings.blocksize);
                if tail_remaining == 0 {
                    break;
                }
            } else if loop_should_stop {
                if self.tail_frames == 0 {
                    break;
                }
                in_tail = true;
                tail_remaining = self.tail_frames;
            }
        }

        self.clock.stop();
        self.timer.stop();

        Ok(RunReport {
            input_frames,
            output_frames,
            timings: self.timer.totals(),
        })
    }

    fn close(&mut self) {
        self.chain.close_all();
        if let Some(input) = self.input.as_mut() {
            let _ = input.close();
        }
        let _ = self.output.close();
        if let Some(midi) = self.midi_source.as_mut() {
            midi.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &std::path::Path, samples: &[f32], channels: u16, sample_rate: u32) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    /// A Type-0 Standard MIDI File with a single, empty track: no events
    /// other than the mandatory end-of-track meta event.
    fn write_empty_smf(path: &std::path::Path) {
        let track: &[u8] = &[0x00, 0xFF, 0x2F, 0x00]; // delta 0, end of track
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"MThd");
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&480u16.to_be_bytes());
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(track.len() as u32).to_be_bytes());
        bytes.extend_from_slice(track);
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn passthrough_chain_copies_input_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("in.wav");
        let output_path = dir.path().join("out.wav");
        write_wav(&input_path, &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 1, 44100);

        let config = EngineConfig {
            settings: AudioSettings::new(44100.0, 4, 1),
            input_path: Some(input_path),
            output_path: output_path.clone(),
            midi_path: None,
            plugin_spec: Some("passthrough".to_string()),
            display_info: false,
            tail_frames: 0,
        };
        let mut engine = ProcessingEngine::build(config).unwrap();
        let report = engine.run().unwrap();
        assert_eq!(report.input_frames, 6);
        assert_eq!(report.output_frames, 8); // padded to a whole blocksize

        let mut reader = hound::WavReader::open(&output_path).unwrap();
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(&samples[..6], &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
    }

    #[test]
    fn instrument_head_without_input_requires_midi_file() {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("out.wav");
        let config = EngineConfig {
            settings: AudioSettings::default(),
            input_path: None,
            output_path,
            midi_path: None,
            plugin_spec: Some("testsynth".to_string()),
            display_info: false,
            tail_frames: 0,
        };
        let err = ProcessingEngine::build(config).unwrap_err();
        assert!(matches!(err, EngineError::MissingRequiredOption(_)));
    }

    #[test]
    fn empty_plugin_chain_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("out.wav");
        let config = EngineConfig {
            settings: AudioSettings::default(),
            input_path: None,
            output_path,
            midi_path: None,
            plugin_spec: None,
            display_info: false,
            tail_frames: 0,
        };
        let err = ProcessingEngine::build(config).unwrap_err();
        assert!(matches!(err, EngineError::MissingRequiredOption(_)));
        assert!(err.to_string().contains("No plugins loaded"));
    }

    /// spec.md §4.8 edge case: an empty MIDI sequence with a MIDI source
    /// present is treated as no events; the loop must run to the real
    /// audio EOF instead of stopping after the first block.
    #[test]
    fn empty_midi_sequence_defers_to_audio_eof() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("in.wav");
        let midi_path = dir.path().join("empty.mid");
        let output_path = dir.path().join("out.wav");

        write_wav(&input_path, &[0.1; 10], 1, 44100);
        write_empty_smf(&midi_path);

        let config = EngineConfig {
            settings: AudioSettings::new(44100.0, 4, 1),
            input_path: Some(input_path),
            output_path,
            midi_path: Some(midi_path),
            plugin_spec: Some("passthrough".to_string()),
            display_info: false,
            tail_frames: 0,
        };
        let mut engine = ProcessingEngine::build(config).unwrap();
        let report = engine.run().unwrap();

        // 10 frames at blocksize 4 => 3 full blocks of input, padded to 12;
        // an empty MIDI sequence must not cut this short at one block (4).
        assert_eq!(report.input_frames, 10);
        assert_eq!(report.output_frames, 12);
    }
}
