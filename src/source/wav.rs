//! WAV codec integration, via `hound`.
//!
//! This is the thin adapter SPEC_FULL.md's Codec Integration section
//! describes: the decoder/encoder itself is `hound`'s, not hand-rolled.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::buffer::SampleBuffer;
use crate::error::EngineError;
use crate::settings::AudioSettings;

pub struct WavSource {
    reader: Option<WavReader<BufReader<File>>>,
    writer: Option<WavWriter<BufWriter<File>>>,
    num_channels: usize,
}

impl WavSource {
    pub fn open_read(path: &Path) -> Result<Self, EngineError> {
        let reader = WavReader::open(path)?;
        let num_channels = reader.spec().channels as usize;
        Ok(Self {
            reader: Some(reader),
            writer: None,
            num_channels,
        })
    }

    pub fn create_write(path: &Path, settings: &AudioSettings) -> Result<Self, EngineError> {
        let spec = WavSpec {
            channels: settings.num_channels as u16,
            sample_rate: settings.sample_rate.round() as u32,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(path, spec)?;
        Ok(Self {
            reader: None,
            writer: Some(writer),
            num_channels: settings.num_channels,
        })
    }

    /// Reads up to `buf.blocksize()` frames per channel, deinterleaving as
    /// it goes. Returns the number of frames actually read (a short final
    /// read is not zero-padded here; the caller owns that decision).
    pub fn read_block(&mut self, buf: &mut SampleBuffer) -> Result<usize, EngineError> {
        let reader = self.reader.as_mut().expect("WavSource opened for write");
        let blocksize = buf.blocksize();
        let channels = self.num_channels.min(buf.num_channels());

        let mut frames_read = 0usize;
        let mut samples = reader.samples::<f32>();
        'frames: for frame in 0..blocksize {
            for ch in 0..channels {
                match samples.next() {
                    Some(Ok(sample)) => buf.channel_mut(ch)[frame] = sample,
                    _ => break 'frames,
                }
            }
            frames_read = frame + 1;
        }
        Ok(frames_read)
    }

    /// Writes exactly `buf.blocksize()` frames, interleaving channels.
    pub fn write_block(&mut self, buf: &SampleBuffer) -> Result<(), EngineError> {
        let writer = self.writer.as_mut().expect("WavSource opened for read");
        for frame in 0..buf.blocksize() {
            for ch in 0..buf.num_channels() {
                writer.write_sample(buf.channel(ch)[frame])?;
            }
        }
        Ok(())
    }

    /// Flushes and finalizes the WAV header. Safe to call more than once;
    /// the second call is a no-op since `finalize` consumes the writer.
    pub fn finalize(&mut self) -> Result<(), EngineError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_a_written_block() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let settings = AudioSettings::new(44100.0, 4, 2);

        let mut writer = WavSource::create_write(&path, &settings).unwrap();
        let mut buf = SampleBuffer::new(&settings);
        buf.channel_mut(0).copy_from_slice(&[0.1, 0.2, 0.3, 0.4]);
        buf.channel_mut(1).copy_from_slice(&[-0.1, -0.2, -0.3, -0.4]);
        writer.write_block(&buf).unwrap();
        writer.finalize().unwrap();

        let mut reader = WavSource::open_read(&path).unwrap();
        let mut read_buf = SampleBuffer::new(&settings);
        let frames = reader.read_block(&mut read_buf).unwrap();
        assert_eq!(frames, 4);
        for (a, b) in buf.channel(0).iter().zip(read_buf.channel(0).iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn short_read_reports_actual_frame_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.wav");
        let settings = AudioSettings::new(44100.0, 2, 1);

        let mut writer = WavSource::create_write(&path, &settings).unwrap();
        let mut buf = SampleBuffer::new(&settings);
        buf.channel_mut(0).copy_from_slice(&[1.0, 1.0]);
        writer.write_block(&buf).unwrap();
        writer.finalize().unwrap();

        let mut reader = WavSource::open_read(&path).unwrap();
        let big_settings = AudioSettings::new(44100.0, 8, 1);
        let mut read_buf = SampleBuffer::new(&big_settings);
        let frames = reader.read_block(&mut read_buf).unwrap();
        assert_eq!(frames, 2);
    }
}
