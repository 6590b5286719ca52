//! CLAP plugin backend, via `clack-host`.
//!
//! This is the "external collaborator" dynamic-library loader spec.md §6
//! leaves unspecified beyond the five-operation contract: load a bundle,
//! activate it, and drive it block by block. Adapted from a real-time
//! host wrapper, generalized from a fixed stereo layout to
//! [`AudioSettings::num_channels`] and MIDI events carrying `delta_frames`.

use std::ffi::CStr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use clack_host::events::event_types::{NoteOffEvent, NoteOnEvent};
use clack_host::factory::plugin::PluginFactory;
use clack_host::prelude::*;
use clack_host::process::StartedPluginAudioProcessor;

use crate::buffer::SampleBuffer;
use crate::error::EngineError;
use crate::midi::MidiEvent;
use crate::plugin::PluginSubtype;
use crate::settings::AudioSettings;

#[derive(Default)]
struct HostShared {
    restart_requested: AtomicBool,
}

impl<'a> SharedHandler<'a> for HostShared {
    fn initializing(&self, _instance: InitializingPluginHandle<'a>) {}

    fn request_restart(&self) {
        self.restart_requested.store(true, Ordering::SeqCst);
    }

    fn request_process(&self) {}

    fn request_callback(&self) {}
}

struct HostMainThread<'a> {
    #[allow(dead_code)]
    shared: &'a HostShared,
}

impl<'a> MainThreadHandler<'a> for HostMainThread<'a> {
    fn initialized(&mut self, _instance: InitializedPluginHandle<'a>) {}
}

struct HostAudioProcessor;

impl<'a> AudioProcessorHandler<'a> for HostAudioProcessor {}

struct BatchHost;

impl HostHandlers for BatchHost {
    type Shared<'a> = HostShared;
    type MainThread<'a> = HostMainThread<'a>;
    type AudioProcessor<'a> = HostAudioProcessor;
}

/// A loaded, not-yet-activated CLAP plugin instance.
pub struct ClapHostPlugin {
    bundle: PluginBundle,
    instance: PluginInstance<BatchHost>,
    name: String,
    subtype: PluginSubtype,
    num_channels: usize,
    processor: Option<RunningProcessor>,
}

struct RunningProcessor {
    processor: StartedPluginAudioProcessor<BatchHost>,
    scratch_in: Vec<Vec<f32>>,
    scratch_out: Vec<Vec<f32>>,
    input_ports: AudioPorts,
    output_ports: AudioPorts,
    steady_time: u64,
    /// MIDI delivered since the last `process_audio` call; drained into
    /// the next CLAP `process()` call's input event buffer.
    pending_midi: Vec<MidiEvent>,
}

impl ClapHostPlugin {
    /// Loads the first plugin descriptor in a `.clap` bundle at `path`.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let bundle = unsafe { PluginBundle::load(path) }
            .map_err(|e| EngineError::Plugin(format!("failed to load bundle: {e:?}")))?;

        let factory: PluginFactory = bundle
            .get_factory()
            .ok_or_else(|| EngineError::Plugin("no plugin factory in bundle".to_string()))?;

        let descriptor = factory
            .plugin_descriptors()
            .next()
            .ok_or_else(|| EngineError::Plugin("bundle contains no plugins".to_string()))?;

        let name = descriptor
            .name()
            .map(|s: &CStr| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let subtype = guess_subtype(&descriptor);

        let host_info = HostInfo::new("offline-plugin-host", "offline-plugin-host", "", "0.1.0")
            .map_err(|e| EngineError::Plugin(format!("failed to build host info: {e:?}")))?;

        let instance = PluginInstance::<BatchHost>::new(
            |_| HostShared::default(),
            |shared| HostMainThread { shared },
            &bundle,
            descriptor
                .id()
                .ok_or_else(|| EngineError::Plugin("plugin descriptor has no id".to_string()))?,
            &host_info,
        )
        .map_err(|e| EngineError::Plugin(format!("failed to instantiate plugin: {e:?}")))?;

        Ok(Self {
            bundle,
            instance,
            name,
            subtype,
            num_channels: 2,
            processor: None,
        })
    }

    pub fn subtype(&self) -> PluginSubtype {
        self.subtype
    }

    pub fn initialize(&mut self, settings: &AudioSettings) -> Result<(), EngineError> {
        self.num_channels = settings.num_channels;

        let audio_config = PluginAudioConfiguration {
            sample_rate: settings.sample_rate,
            min_frames_count: 1,
            max_frames_count: settings.blocksize as u32,
        };

        let activated = self
            .instance
            .activate(|_, _| HostAudioProcessor, audio_config)
            .map_err(|e| EngineError::Plugin(format!("activation failed: {e:?}")))?;

        let processor = activated
            .start_processing()
            .map_err(|e| EngineError::Plugin(format!("failed to start processing: {e:?}")))?;

        self.processor = Some(RunningProcessor {
            processor,
            scratch_in: vec![vec![0.0; settings.blocksize]; settings.num_channels],
            scratch_out: vec![vec![0.0; settings.blocksize]; settings.num_channels],
            input_ports: AudioPorts::with_capacity(settings.num_channels, 1),
            output_ports: AudioPorts::with_capacity(settings.num_channels, 1),
            steady_time: 0,
            pending_midi: Vec::new(),
        });
        Ok(())
    }

    pub fn process_audio(
        &mut self,
        input: &SampleBuffer,
        output: &mut SampleBuffer,
    ) -> Result<(), EngineError> {
        let running = self
            .processor
            .as_mut()
            .ok_or_else(|| EngineError::Plugin("process called before initialize".to_string()))?;

        let frame_count = input.blocksize();
        for (scratch, channel) in running.scratch_in.iter_mut().zip(input.channels()) {
            scratch[..frame_count].copy_from_slice(&channel[..frame_count]);
        }

        let input_audio = running.input_ports.with_input_buffers([AudioPortBuffer {
            latency: 0,
            channels: AudioPortBufferType::f32_input_only(
                running
                    .scratch_in
                    .iter_mut()
                    .map(|b| InputChannel::constant(&mut b[..frame_count])),
            ),
        }]);

        let mut output_audio = running.output_ports.with_output_buffers([AudioPortBuffer {
            latency: 0,
            channels: AudioPortBufferType::f32_output_only(
                running.scratch_out.iter_mut().map(|b| &mut b[..frame_count]),
            ),
        }]);

        let mut input_event_buffer = EventBuffer::new();
        for event in running.pending_midi.drain(..) {
            push_midi_event(&mut input_event_buffer, &event);
        }
        let input_events = InputEvents::from_buffer(&input_event_buffer);
        let mut output_event_buffer = EventBuffer::new();
        let mut output_events = OutputEvents::from_buffer(&mut output_event_buffer);

        running
            .processor
            .process(
                &input_audio,
                &mut output_audio,
                &input_events,
                &mut output_events,
                Some(running.steady_time),
                None,
            )
            .map_err(|e| EngineError::Plugin(format!("process failed: {e:?}")))?;

        for (channel, scratch) in output.channels_mut().iter_mut().zip(running.scratch_out.iter()) {
            channel[..frame_count].copy_from_slice(&scratch[..frame_count]);
        }
        running.steady_time += frame_count as u64;
        Ok(())
    }

    /// Buffers MIDI events for the current block; they ride along with
    /// the next `process_audio` call's CLAP `process()` invocation, since
    /// CLAP delivers audio and events together.
    pub fn process_midi_events(&mut self, events: &[MidiEvent]) {
        if let Some(running) = self.processor.as_mut() {
            running.pending_midi.extend_from_slice(events);
        }
    }

    pub fn display_info(&self) {
        log::info!(
            "  CLAP plugin '{}' ({} channel(s))",
            self.name,
            self.num_channels
        );
    }

    pub fn close(&mut self) {
        if let Some(running) = self.processor.take() {
            let stopped = running.processor.stop_processing();
            self.instance.deactivate(stopped);
        }
    }
}

fn push_midi_event(buffer: &mut EventBuffer, event: &MidiEvent) {
    let status_high = event.status & 0xF0;
    let channel = (event.status & 0x0F) as u16;
    let key = event.data1 as u16;
    let pckn = Pckn::new(0u16, channel, key, event.data1 as u32);
    match status_high {
        0x90 if event.data2 > 0 => {
            buffer.push(&NoteOnEvent::new(
                event.delta_frames,
                pckn,
                event.data2 as f64 / 127.0,
            ));
        }
        0x80 | 0x90 => {
            buffer.push(&NoteOffEvent::new(event.delta_frames, pckn, 0.0));
        }
        _ => {}
    }
}

fn guess_subtype(descriptor: &clack_host::factory::plugin::PluginDescriptor) -> PluginSubtype {
    let is_instrument = descriptor.features().any(|feature: &CStr| {
        feature.to_string_lossy().eq_ignore_ascii_case("instrument")
    });
    if is_instrument {
        PluginSubtype::Instrument
    } else {
        PluginSubtype::Effect
    }
}
