//! Ordered collection of plugins with a uniform drive loop.
//!
//! Audio flows through a pair of scratch buffers that alternate ownership
//! of "current input" as the chain is walked, so no block-rate
//! allocation happens on the hot path (spec.md §9's "Scratch buffer
//! alternation" design note).

use super::loader::{resolve_plugin_spec, PluginSpec};
use super::{Plugin, PluginSubtype};
use crate::buffer::SampleBuffer;
use crate::error::EngineError;
use crate::midi::MidiEvent;
use crate::settings::AudioSettings;
use crate::timer::TaskTimer;

#[derive(Default)]
pub struct PluginChain {
    plugins: Vec<Plugin>,
    scratch_a: Option<SampleBuffer>,
    scratch_b: Option<SampleBuffer>,
}

impl PluginChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    /// Parses a delimited plugin-name list and appends each resolved
    /// plugin in order. Leaves the chain unmodified if any name fails to
    /// resolve.
    pub fn add_from_argument_string(
        &mut self,
        spec: &str,
        settings: &AudioSettings,
    ) -> Result<(), EngineError> {
        let specs: Vec<PluginSpec> = crate::plugin::loader::parse_plugin_list(spec)?;
        let mut resolved = Vec::with_capacity(specs.len());
        for plugin_spec in &specs {
            resolved.push(resolve_plugin_spec(plugin_spec, settings)?);
        }
        self.plugins.extend(resolved);
        Ok(())
    }

    /// True if any plugin in the chain is an instrument. Per spec.md §3,
    /// an instrument must be at index 0 if present at all; that invariant
    /// is checked by [`Self::validate_instrument_position`], not here.
    pub fn has_instrument(&self) -> bool {
        self.plugins
            .iter()
            .any(|p| p.subtype() == PluginSubtype::Instrument)
    }

    pub fn head_is_instrument(&self) -> bool {
        self.plugins
            .first()
            .map(|p| p.subtype() == PluginSubtype::Instrument)
            .unwrap_or(false)
    }

    /// Enforces that only the head plugin may be an instrument.
    pub fn validate_instrument_position(&self) -> Result<(), EngineError> {
        for (index, plugin) in self.plugins.iter().enumerate().skip(1) {
            if plugin.subtype() == PluginSubtype::Instrument {
                return Err(EngineError::InvalidPluginChain(format!(
                    "instrument plugin '{}' at index {index} must be the chain head",
                    plugin.name()
                )));
            }
        }
        Ok(())
    }

    /// Opens and initializes every plugin in order; failure at any index
    /// is fatal.
    pub fn initialize_all(&mut self, settings: &AudioSettings) -> Result<(), EngineError> {
        self.validate_instrument_position()?;
        for plugin in &mut self.plugins {
            plugin.mark_opened();
            plugin.initialize(settings)?;
        }
        self.scratch_a = Some(SampleBuffer::new(settings));
        self.scratch_b = Some(SampleBuffer::new(settings));
        Ok(())
    }

    /// Drives audio through the chain, timing each plugin. A single-plugin
    /// chain reads `in_buf` and writes `out_buf` directly; a longer chain
    /// alternates between the two owned scratch buffers.
    pub fn process_audio(
        &mut self,
        in_buf: &SampleBuffer,
        out_buf: &mut SampleBuffer,
        timer: &mut TaskTimer,
    ) {
        if self.plugins.is_empty() {
            out_buf.copy_from(in_buf);
            return;
        }

        if self.plugins.len() == 1 {
            timer.start(0);
            self.plugins[0].process_audio(in_buf, out_buf);
            return;
        }

        let scratch_a = self.scratch_a.as_mut().expect("chain initialized");
        let scratch_b = self.scratch_b.as_mut().expect("chain initialized");

        let last = self.plugins.len() - 1;
        for (index, plugin) in self.plugins.iter_mut().enumerate() {
            timer.start(index);
            let (current_in, current_out): (&SampleBuffer, &mut SampleBuffer) = if index == 0 {
                (in_buf, scratch_a)
            } else if index == last {
                let source = if index % 2 == 1 { &*scratch_a } else { &*scratch_b };
                plugin.process_audio(source, out_buf);
                continue;
            } else if index % 2 == 1 {
                (scratch_a, scratch_b)
            } else {
                (scratch_b, scratch_a)
            };
            plugin.process_audio(current_in, current_out);
        }
    }

    /// Delivers the event list to every plugin in chain order, timing each.
    pub fn process_midi_events(&mut self, events: &[MidiEvent], timer: &mut TaskTimer) {
        for (index, plugin) in self.plugins.iter_mut().enumerate() {
            timer.start(index);
            plugin.process_midi_events(events);
        }
    }

    pub fn display_info(&self) {
        for plugin in &self.plugins {
            plugin.display_info();
        }
    }

    pub fn close_all(&mut self) {
        for plugin in &mut self.plugins {
            plugin.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_plugin_chain_is_direct_pass_through() {
        let settings = AudioSettings::new(44100.0, 4, 1);
        let mut chain = PluginChain::new();
        chain
            .add_from_argument_string("passthrough", &settings)
            .unwrap();
        chain.initialize_all(&settings).unwrap();

        let mut input = SampleBuffer::new(&settings);
        input.channel_mut(0).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        let mut output = SampleBuffer::new(&settings);
        let mut timer = TaskTimer::new(chain.len());
        chain.process_audio(&input, &mut output, &mut timer);

        assert_eq!(input.channel(0), output.channel(0));
    }

    #[test]
    fn multi_plugin_chain_alternates_scratch_buffers() {
        let settings = AudioSettings::new(44100.0, 2, 1);
        let mut chain = PluginChain::new();
        chain
            .add_from_argument_string("again(gain=2.0), again(gain=3.0)", &settings)
            .unwrap();
        chain.initialize_all(&settings).unwrap();

        let mut input = SampleBuffer::new(&settings);
        input.channel_mut(0).copy_from_slice(&[1.0, 1.0]);
        let mut output = SampleBuffer::new(&settings);
        let mut timer = TaskTimer::new(chain.len());
        chain.process_audio(&input, &mut output, &mut timer);

        // 1.0 * 2.0 * 3.0 == 6.0
        assert_eq!(output.channel(0), &[6.0, 6.0]);
    }

    #[test]
    fn empty_plugin_list_leaves_chain_unmodified_on_failure() {
        let settings = AudioSettings::default();
        let mut chain = PluginChain::new();
        let err = chain.add_from_argument_string("", &settings).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPluginChain(_)));
        assert!(chain.is_empty());
    }

    #[test]
    fn instrument_must_be_chain_head() {
        let settings = AudioSettings::default();
        let mut chain = PluginChain::new();
        chain
            .add_from_argument_string("passthrough, testsynth", &settings)
            .unwrap();
        let err = chain.initialize_all(&settings).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPluginChain(_)));
    }
}
