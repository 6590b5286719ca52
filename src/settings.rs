//! Process-wide audio settings.
//!
//! Finalized once, before the processing loop starts, then held by shared
//! reference for the rest of the run. Nothing past initialization may
//! mutate these values; plugins and sources only ever read them.

/// Default sample rate in Hz, used when `--sample-rate` is not given.
pub const DEFAULT_SAMPLE_RATE: f64 = 44100.0;

/// Default blocksize in frames, used when `--blocksize` is not given.
pub const DEFAULT_BLOCKSIZE: usize = 512;

/// Default channel count, used when `--channels` is not given.
pub const DEFAULT_NUM_CHANNELS: usize = 2;

/// Sample rate, blocksize and channel count shared by every component in a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSettings {
    pub sample_rate: f64,
    pub blocksize: usize,
    pub num_channels: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            blocksize: DEFAULT_BLOCKSIZE,
            num_channels: DEFAULT_NUM_CHANNELS,
        }
    }
}

impl AudioSettings {
    pub fn new(sample_rate: f64, blocksize: usize, num_channels: usize) -> Self {
        Self {
            sample_rate,
            blocksize,
            num_channels,
        }
    }

    /// True if every field holds a value that can actually be processed with.
    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0.0 && self.blocksize > 0 && self.num_channels >= 1
    }
}
