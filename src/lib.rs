//! An offline, single-threaded, block-rate audio plugin host.
//!
//! Reads an audio file (and optionally a Standard MIDI File) block by
//! block, drives it through an ordered chain of plugins, and writes the
//! result to an output file. No realtime I/O, no UI: this crate is the
//! rendering engine and its command-line driver.

pub mod buffer;
pub mod clock;
pub mod cli;
pub mod engine;
pub mod error;
pub mod logging;
pub mod midi;
pub mod plugin;
pub mod settings;
pub mod source;
pub mod timer;
