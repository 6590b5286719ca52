//! End-to-end scenarios against [`offline_plugin_host::engine::ProcessingEngine`],
//! exercising the literal end-to-end scenarios from spec.md §8 that don't
//! require a process spawn (scenario 6, the CLI banner paths, is covered by
//! `src/cli.rs`'s own test module instead).

use offline_plugin_host::engine::{EngineConfig, ProcessingEngine};
use offline_plugin_host::error::EngineError;
use offline_plugin_host::settings::AudioSettings;

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

fn write_varlen(buf: &mut Vec<u8>, mut value: u32) {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    buf.extend_from_slice(&bytes);
}

/// Hand-assembles a minimal Type-0 Standard MIDI File: a single note on at
/// `note_on_tick`, a note off `note_off_tick` ticks later, 480 ticks/quarter,
/// no tempo meta-events (so the default 120 BPM applies throughout).
fn write_minimal_smf(path: &std::path::Path, note_on_tick: u32, note_off_tick: u32) {
    let mut track = Vec::new();
    write_varlen(&mut track, note_on_tick);
    track.extend_from_slice(&[0x90, 69, 100]); // note on, A4, vel 100
    write_varlen(&mut track, note_off_tick - note_on_tick);
    track.extend_from_slice(&[0x80, 69, 0]); // note off
    write_varlen(&mut track, 0);
    track.extend_from_slice(&[0xFF, 0x2F, 0x00]); // end of track

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"MThd");
    bytes.extend_from_slice(&6u32.to_be_bytes());
    bytes.extend_from_slice(&0u16.to_be_bytes()); // format 0
    bytes.extend_from_slice(&1u16.to_be_bytes()); // one track
    bytes.extend_from_slice(&480u16.to_be_bytes()); // 480 ticks/quarter
    bytes.extend_from_slice(b"MTrk");
    bytes.extend_from_slice(&(track.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&track);

    std::fs::write(path, bytes).unwrap();
}

/// Scenario 2: no plugins given ⇒ MissingRequiredOption, message names the cause.
#[test]
fn scenario_2_no_plugins_is_missing_required_option() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        settings: AudioSettings::default(),
        input_path: None,
        output_path: dir.path().join("out.wav"),
        midi_path: None,
        plugin_spec: None,
        display_info: false,
        tail_frames: 0,
    };
    let err = ProcessingEngine::build(config).unwrap_err();
    assert!(matches!(err, EngineError::MissingRequiredOption(_)));
    assert!(err.to_string().contains("No plugins loaded"));
}

/// Scenario 3: instrument head + MIDI file, no input ⇒ SILENCE is synthesized,
/// the loop runs to the MIDI sequence's last event and pads to a whole block.
#[test]
fn scenario_3_instrument_with_midi_and_no_input_runs_to_last_event() {
    let dir = tempfile::tempdir().unwrap();
    let midi_path = dir.path().join("notes.mid");
    let output_path = dir.path().join("out.wav");

    // 480 ticks/quarter @ 120 BPM default tempo => 1 tick = 1/960 s.
    // note off at tick 960 => 1.0s => 44100 samples at the default rate.
    write_minimal_smf(&midi_path, 0, 960);

    let settings = AudioSettings::default(); // 44100 Hz, 512 frames, 2 channels
    let config = EngineConfig {
        settings,
        input_path: None,
        output_path: output_path.clone(),
        midi_path: Some(midi_path),
        plugin_spec: Some("testsynth".to_string()),
        display_info: false,
        tail_frames: 0,
    };
    let mut engine = ProcessingEngine::build(config).unwrap();
    let report = engine.run().unwrap();

    let blocksize = settings.blocksize as u64;
    let last_timestamp = 44100u64;
    let expected_frames = last_timestamp.div_ceil(blocksize) * blocksize;
    assert_eq!(report.output_frames, expected_frames);

    let reader = hound::WavReader::open(&output_path).unwrap();
    assert_eq!(reader.duration() as u64, expected_frames);
}

/// Scenario 4: instrument head, no input, no MIDI ⇒ MissingRequiredOption.
#[test]
fn scenario_4_instrument_without_input_or_midi_is_missing_required_option() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        settings: AudioSettings::default(),
        input_path: None,
        output_path: dir.path().join("out.wav"),
        midi_path: None,
        plugin_spec: Some("testsynth".to_string()),
        display_info: false,
        tail_frames: 0,
    };
    let err = ProcessingEngine::build(config).unwrap_err();
    assert!(matches!(err, EngineError::MissingRequiredOption(_)));
}

/// Scenario 5: a one-second input at a configured blocksize/channel/rate
/// produces exactly the documented number of full iterations plus one
/// short final block, and the clock lands on the padded total.
#[test]
fn scenario_5_custom_settings_produce_documented_iteration_count() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("in.wav");
    let output_path = dir.path().join("out.wav");

    let sample_rate = 48000u32;
    let channels = 2u16;
    let blocksize = 256usize;
    let frame_count = sample_rate as usize; // exactly one second
    let samples = vec![0.0f32; frame_count * channels as usize];
    write_wav(&input_path, &samples, channels, sample_rate);

    let settings = AudioSettings::new(sample_rate as f64, blocksize, channels as usize);
    let config = EngineConfig {
        settings,
        input_path: Some(input_path),
        output_path,
        midi_path: None,
        plugin_spec: Some("passthrough".to_string()),
        display_info: false,
        tail_frames: 0,
    };
    let mut engine = ProcessingEngine::build(config).unwrap();
    let report = engine.run().unwrap();

    // 48000 / 256 = 187 full iterations, plus a 188th short block.
    let full_iterations = frame_count / blocksize;
    assert_eq!(full_iterations, 187);
    let total_iterations = full_iterations + 1;
    assert_eq!(report.output_frames, (total_iterations * blocksize) as u64);
    assert_eq!(report.input_frames, frame_count as u64);
}

/// Identity law: a chain containing a single pass-through plugin produces
/// output equal to input (PCM-bit-exact) for input of any length, including
/// a length that isn't a multiple of the blocksize.
#[test]
fn identity_law_single_passthrough_is_bit_exact() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("in.wav");
    let output_path = dir.path().join("out.wav");

    let samples: Vec<f32> = (0..777).map(|i| (i as f32 * 0.01).sin()).collect();
    write_wav(&input_path, &samples, 1, 44100);

    let settings = AudioSettings::new(44100.0, 64, 1);
    let config = EngineConfig {
        settings,
        input_path: Some(input_path),
        output_path: output_path.clone(),
        midi_path: None,
        plugin_spec: Some("passthrough".to_string()),
        display_info: false,
        tail_frames: 0,
    };
    let mut engine = ProcessingEngine::build(config).unwrap();
    engine.run().unwrap();

    let mut reader = hound::WavReader::open(&output_path).unwrap();
    let output_samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
    assert_eq!(&output_samples[..samples.len()], samples.as_slice());
    assert!(output_samples[samples.len()..].iter().all(|&s| s == 0.0));
}
