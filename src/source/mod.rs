//! Sample sources: pull/push endpoints over audio I/O.
//!
//! Realized as a tagged enum rather than a trait object, per the DESIGN
//! NOTES preference for dispatch tables over downcasting — the engine
//! never needs to know more about a source than "is it open for the
//! direction I need, and can it read/write a block".

mod wav;

use std::path::Path;

use crate::buffer::SampleBuffer;
use crate::error::EngineError;
use crate::settings::AudioSettings;

pub use wav::WavSource;

/// Which way data flows through a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// Lifecycle state, per spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Unopened,
    Open,
    Closed,
    Failed,
}

/// The concrete backend a [`SampleSource`] is wrapping.
enum SourceKind {
    /// Produces zero-filled blocks indefinitely; never reports EOF.
    Silence,
    Wav(WavSource),
}

/// Guesses a source type from a file extension, case-insensitively.
///
/// Returns `None` (⇒ `INVALID` per spec §4.3) for anything not recognized.
pub fn guess_kind_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "wav" | "wave" => Some("wav"),
        "aiff" | "aif" => Some("aiff"),
        "pcm" | "raw" => Some("pcm"),
        _ => None,
    }
}

/// A single audio endpoint: either a file-backed source/sink or the
/// synthetic SILENCE generator.
pub struct SampleSource {
    name: String,
    direction: Direction,
    state: SourceState,
    num_frames_processed: u64,
    kind: Option<SourceKind>,
    path: Option<std::path::PathBuf>,
}

impl SampleSource {
    /// Builds the synthetic SILENCE source, auto-selected when an
    /// instrument head plugin has no user-provided input file.
    pub fn silence(direction: Direction) -> Self {
        Self {
            name: "SILENCE".to_string(),
            direction,
            state: SourceState::Unopened,
            num_frames_processed: 0,
            kind: Some(SourceKind::Silence),
            path: None,
        }
    }

    /// Builds a source bound to a file path; the concrete codec is
    /// resolved from the extension when `open` is called.
    pub fn from_path(path: &Path, direction: Direction) -> Self {
        Self {
            name: path.display().to_string(),
            direction,
            state: SourceState::Unopened,
            num_frames_processed: 0,
            kind: None,
            path: Some(path.to_path_buf()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn num_frames_processed(&self) -> u64 {
        self.num_frames_processed
    }

    /// Opens the underlying file or generator. SILENCE sources always
    /// succeed; file-backed sources fail when the extension is unrecognized
    /// or the codec is not WAV (see spec.md §1's out-of-scope codec list).
    pub fn open(&mut self, settings: &AudioSettings) -> Result<(), EngineError> {
        if self.kind.is_none() {
            let path = self.path.clone().expect("non-silence source has a path");
            let guessed = guess_kind_from_extension(&path);
            match guessed {
                Some("wav") => {
                    let wav = match self.direction {
                        Direction::Read => WavSource::open_read(&path)?,
                        Direction::Write => WavSource::create_write(&path, settings)?,
                    };
                    self.kind = Some(SourceKind::Wav(wav));
                }
                Some(other) => {
                    self.state = SourceState::Failed;
                    return Err(EngineError::Io(format!(
                        "unsupported source format '{other}' for '{}': codec not implemented",
                        path.display()
                    )));
                }
                None => {
                    self.state = SourceState::Failed;
                    return Err(EngineError::Io(format!(
                        "cannot infer source type for '{}': unrecognized extension",
                        path.display()
                    )));
                }
            }
        }
        self.state = SourceState::Open;
        Ok(())
    }

    /// Fills `buf` with up to one block of frames. Returns `true` if the
    /// block is entirely real samples, `false` on (and including) the
    /// block that reaches end-of-stream — the remainder of that block is
    /// still zero-padded.
    pub fn read_sample_block(&mut self, buf: &mut SampleBuffer) -> Result<bool, EngineError> {
        debug_assert_eq!(self.direction, Direction::Read);
        match self.kind.as_mut().expect("source not opened") {
            SourceKind::Silence => {
                buf.clear();
                Ok(true)
            }
            SourceKind::Wav(wav) => {
                let frames_read = wav.read_block(buf)?;
                self.num_frames_processed += frames_read as u64;
                if frames_read < buf.blocksize() {
                    buf.zero_pad_from(frames_read);
                    Ok(false)
                } else {
                    Ok(true)
                }
            }
        }
    }

    /// Writes a full block of frames. Returns `Ok(())` on success; IO
    /// failures are surfaced as [`EngineError::Io`].
    pub fn write_sample_block(&mut self, buf: &SampleBuffer) -> Result<(), EngineError> {
        debug_assert_eq!(self.direction, Direction::Write);
        match self.kind.as_mut().expect("source not opened") {
            SourceKind::Silence => Ok(()),
            SourceKind::Wav(wav) => {
                wav.write_block(buf)?;
                self.num_frames_processed += buf.blocksize() as u64;
                Ok(())
            }
        }
    }

    /// Flushes and releases handles. Idempotent.
    pub fn close(&mut self) -> Result<(), EngineError> {
        if self.state == SourceState::Closed {
            return Ok(());
        }
        if let Some(SourceKind::Wav(wav)) = self.kind.as_mut() {
            wav.finalize()?;
        }
        self.state = SourceState::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn silence_source_always_fills_and_never_eofs() {
        let settings = AudioSettings::new(44100.0, 8, 1);
        let mut source = SampleSource::silence(Direction::Read);
        source.open(&settings).unwrap();
        let mut buf = SampleBuffer::new(&settings);
        buf.channel_mut(0).fill(1.0);
        let filled = source.read_sample_block(&mut buf).unwrap();
        assert!(filled);
        assert!(buf.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn unrecognized_extension_fails_open() {
        let settings = AudioSettings::default();
        let mut source = SampleSource::from_path(&PathBuf::from("foo.xyz"), Direction::Read);
        let err = source.open(&settings).unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
        assert_eq!(source.state(), SourceState::Failed);
    }

    #[test]
    fn guesses_known_extensions_case_insensitively() {
        assert_eq!(
            guess_kind_from_extension(&PathBuf::from("a.WAV")),
            Some("wav")
        );
        assert_eq!(
            guess_kind_from_extension(&PathBuf::from("a.aiff")),
            Some("aiff")
        );
        assert_eq!(guess_kind_from_extension(&PathBuf::from("a.mid")), None);
    }

    #[test]
    fn close_is_idempotent() {
        let settings = AudioSettings::default();
        let mut source = SampleSource::silence(Direction::Read);
        source.open(&settings).unwrap();
        source.close().unwrap();
        source.close().unwrap();
        assert_eq!(source.state(), SourceState::Closed);
    }
}
