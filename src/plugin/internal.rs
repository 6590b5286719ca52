//! Built-in in-process plugins: no dynamic loading required.
//!
//! These exist for two reasons spec.md calls for directly: the
//! `again(gain=<float>)` effect named in spec.md §8 scenario 1, and a
//! minimal instrument (`testsynth`) that can stand in for `someInstrument`
//! in scenario 3 without requiring an external `.clap` bundle on disk.

use std::f32::consts::PI;

use crate::buffer::SampleBuffer;
use crate::midi::MidiEvent;
use crate::plugin::PluginSubtype;
use crate::settings::AudioSettings;

const MAX_VOICES: usize = 8;

pub enum InternalPlugin {
    /// Copies input to output unchanged. The Identity law in spec.md §8
    /// is checked against exactly this plugin.
    PassThrough,
    /// Multiplies every sample by a fixed gain.
    Gain { gain: f32 },
    /// A minimal monophonic-per-voice sine instrument, driven by MIDI
    /// note on/off, tolerant of a silent (or absent) audio input.
    TestSynth {
        sample_rate: f32,
        voices: [Voice; MAX_VOICES],
        pending: Vec<MidiEvent>,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Voice {
    active: bool,
    note: u8,
    velocity: f32,
    phase: f32,
}

impl InternalPlugin {
    pub fn passthrough() -> Self {
        InternalPlugin::PassThrough
    }

    pub fn gain(gain: f32) -> Self {
        InternalPlugin::Gain { gain }
    }

    pub fn test_synth() -> Self {
        InternalPlugin::TestSynth {
            sample_rate: 44100.0,
            voices: [Voice::default(); MAX_VOICES],
            pending: Vec::new(),
        }
    }

    pub fn subtype(&self) -> PluginSubtype {
        match self {
            InternalPlugin::PassThrough | InternalPlugin::Gain { .. } => PluginSubtype::Effect,
            InternalPlugin::TestSynth { .. } => PluginSubtype::Instrument,
        }
    }

    pub fn initialize(&mut self, settings: &AudioSettings) {
        if let InternalPlugin::TestSynth { sample_rate, .. } = self {
            *sample_rate = settings.sample_rate as f32;
        }
    }

    pub fn process_audio(&mut self, input: &SampleBuffer, output: &mut SampleBuffer) {
        match self {
            InternalPlugin::PassThrough => output.copy_from(input),
            InternalPlugin::Gain { gain } => {
                for (out_ch, in_ch) in output.channels_mut().iter_mut().zip(input.channels()) {
                    for (o, i) in out_ch.iter_mut().zip(in_ch.iter()) {
                        *o = i * *gain;
                    }
                }
            }
            InternalPlugin::TestSynth {
                sample_rate,
                voices,
                pending,
            } => {
                for event in pending.drain(..) {
                    apply_note_event(voices, event);
                }
                output.clear();
                for frame in 0..output.blocksize() {
                    let mut sample = 0.0f32;
                    for voice in voices.iter_mut() {
                        if voice.active {
                            sample += (voice.phase * 2.0 * PI).sin() * voice.velocity;
                            let freq = 440.0 * 2.0f32.powf((voice.note as f32 - 69.0) / 12.0);
                            voice.phase += freq / *sample_rate;
                            if voice.phase >= 1.0 {
                                voice.phase -= 1.0;
                            }
                        }
                    }
                    for channel in output.channels_mut() {
                        channel[frame] = sample;
                    }
                }
            }
        }
    }

    pub fn process_midi_events(&mut self, events: &[MidiEvent]) {
        if let InternalPlugin::TestSynth { pending, .. } = self {
            pending.extend_from_slice(events);
        }
    }

    pub fn display_info(&self) {
        match self {
            InternalPlugin::PassThrough => log::info!("  built-in pass-through, no parameters"),
            InternalPlugin::Gain { gain } => log::info!("  built-in gain, gain={gain}"),
            InternalPlugin::TestSynth { .. } => {
                log::info!("  built-in test synth, {MAX_VOICES} voices, sine oscillator")
            }
        }
    }
}

fn apply_note_event(voices: &mut [Voice; MAX_VOICES], event: MidiEvent) {
    let status_high = event.status & 0xF0;
    match status_high {
        0x90 if event.data2 > 0 => {
            if let Some(voice) = voices.iter_mut().find(|v| !v.active) {
                voice.active = true;
                voice.note = event.data1;
                voice.velocity = event.data2 as f32 / 127.0;
                voice.phase = 0.0;
            }
        }
        0x80 | 0x90 => {
            for voice in voices.iter_mut() {
                if voice.active && voice.note == event.data1 {
                    voice.active = false;
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AudioSettings {
        AudioSettings::new(44100.0, 8, 1)
    }

    #[test]
    fn gain_of_one_is_identity() {
        let mut plugin = InternalPlugin::gain(1.0);
        plugin.initialize(&settings());
        let mut input = SampleBuffer::new(&settings());
        input.channel_mut(0).copy_from_slice(&[0.1; 8]);
        let mut output = SampleBuffer::new(&settings());
        plugin.process_audio(&input, &mut output);
        assert_eq!(input.channel(0), output.channel(0));
    }

    #[test]
    fn test_synth_stays_silent_with_no_notes() {
        let mut plugin = InternalPlugin::test_synth();
        plugin.initialize(&settings());
        let input = SampleBuffer::new(&settings());
        let mut output = SampleBuffer::new(&settings());
        plugin.process_audio(&input, &mut output);
        assert!(output.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_synth_produces_audio_after_note_on() {
        let mut plugin = InternalPlugin::test_synth();
        plugin.initialize(&settings());
        plugin.process_midi_events(&[MidiEvent {
            delta_frames: 0,
            status: 0x90,
            data1: 69,
            data2: 100,
            timestamp: 0,
        }]);
        let input = SampleBuffer::new(&settings());
        let mut output = SampleBuffer::new(&settings());
        plugin.process_audio(&input, &mut output);
        assert!(output.channel(0).iter().any(|&s| s != 0.0));
    }
}
