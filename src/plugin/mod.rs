//! Plugin hosting: a polymorphic audio/MIDI processor with a fixed
//! five-operation contract (open, initialize, process audio, process
//! MIDI, display info, close), realized as a tagged enum so the engine
//! never has to downcast — it only ever inspects `subtype`.

mod chain;
mod clap_host;
mod internal;
mod loader;

pub use chain::PluginChain;
pub use loader::{resolve_plugin_spec, PluginSpec};

use crate::buffer::SampleBuffer;
use crate::error::EngineError;
use crate::midi::MidiEvent;
use crate::settings::AudioSettings;

/// What kind of audio this plugin produces or transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginSubtype {
    Effect,
    Instrument,
    Unknown,
}

/// Which backend is actually doing the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginType {
    Invalid,
    Clap,
    InternalPassthrough,
}

/// Lifecycle state machine: `Created -> Opened -> Initialized ->
/// Processing (self-loop) -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Created,
    Opened,
    Initialized,
    Closed,
}

/// A single loaded plugin. Dispatches to either an in-process built-in
/// implementation or a loaded CLAP bundle.
pub struct Plugin {
    name: String,
    plugin_type: PluginType,
    subtype: PluginSubtype,
    state: LifecycleState,
    backend: Backend,
}

enum Backend {
    Internal(internal::InternalPlugin),
    Clap(clap_host::ClapHostPlugin),
}

impl Plugin {
    pub(crate) fn new_internal(name: String, plugin: internal::InternalPlugin) -> Self {
        let subtype = plugin.subtype();
        Self {
            name,
            plugin_type: PluginType::InternalPassthrough,
            subtype,
            state: LifecycleState::Created,
            backend: Backend::Internal(plugin),
        }
    }

    pub(crate) fn new_clap(name: String, plugin: clap_host::ClapHostPlugin) -> Self {
        let subtype = plugin.subtype();
        Self {
            name,
            plugin_type: PluginType::Clap,
            subtype,
            state: LifecycleState::Created,
            backend: Backend::Clap(plugin),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plugin_type(&self) -> PluginType {
        self.plugin_type
    }

    pub fn subtype(&self) -> PluginSubtype {
        self.subtype
    }

    /// Marks the plugin opened. Loading already happened during
    /// resolution (see [`resolve_plugin_spec`]); this only transitions
    /// the lifecycle state so `initialize` can be called.
    pub fn mark_opened(&mut self) {
        debug_assert_eq!(self.state, LifecycleState::Created);
        self.state = LifecycleState::Opened;
    }

    /// Communicates [`AudioSettings`] to the plugin and transitions to
    /// `Initialized`. Required before any processing call.
    pub fn initialize(&mut self, settings: &AudioSettings) -> Result<(), EngineError> {
        debug_assert_eq!(self.state, LifecycleState::Opened);
        match &mut self.backend {
            Backend::Internal(plugin) => plugin.initialize(settings),
            Backend::Clap(plugin) => plugin.initialize(settings)?,
        }
        self.state = LifecycleState::Initialized;
        Ok(())
    }

    /// Processes one block of audio. A plugin that errors mid-stream
    /// still fully populates `out`, logging and continuing per spec.md
    /// §4.5's `PROCESSING`-phase policy.
    pub fn process_audio(&mut self, input: &SampleBuffer, output: &mut SampleBuffer) {
        debug_assert_eq!(self.state, LifecycleState::Initialized);
        match &mut self.backend {
            Backend::Internal(plugin) => plugin.process_audio(input, output),
            Backend::Clap(plugin) => {
                if let Err(err) = plugin.process_audio(input, output) {
                    log::error!("plugin '{}' failed mid-stream: {err}", self.name);
                    output.copy_from(input);
                }
            }
        }
    }

    /// Delivers MIDI events scheduled for the current block.
    pub fn process_midi_events(&mut self, events: &[MidiEvent]) {
        match &mut self.backend {
            Backend::Internal(plugin) => plugin.process_midi_events(events),
            Backend::Clap(plugin) => plugin.process_midi_events(events),
        }
    }

    /// Prints descriptive metadata to the log stream.
    pub fn display_info(&self) {
        log::info!("plugin: {} ({:?}, {:?})", self.name, self.plugin_type, self.subtype);
        match &self.backend {
            Backend::Internal(plugin) => plugin.display_info(),
            Backend::Clap(plugin) => plugin.display_info(),
        }
    }

    /// Releases plugin resources. Idempotent.
    pub fn close(&mut self) {
        if self.state == LifecycleState::Closed {
            return;
        }
        if let Backend::Clap(plugin) = &mut self.backend {
            plugin.close();
        }
        self.state = LifecycleState::Closed;
    }
}

impl Drop for Plugin {
    fn drop(&mut self) {
        self.close();
    }
}
