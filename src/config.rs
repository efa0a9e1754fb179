// Engine configuration - audio format, buffering and click sample locations
//
// Loaded from a RON file by the command-line player. Every field has a default,
// so a partial file (or no file at all) yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MetronomeError, MetronomeResult};

/// Slowest accepted tempo (BPM)
pub const MIN_TEMPO: u32 = 10;
/// Fastest accepted tempo (BPM)
pub const MAX_TEMPO: u32 = 350;
/// Smallest bar length in beats
pub const MIN_BEATS_PER_BAR: usize = 1;
/// Largest bar length in beats
pub const MAX_BEATS_PER_BAR: usize = 8;

/// A click and its tail occupy two blocks; at the fastest tempo the next
/// click decision must come after both.
pub fn check_block_fits_beat(sample_rate: u32, block_size: usize) -> MetronomeResult<()> {
    let shortest_interval = sample_rate as u64 * 60 / MAX_TEMPO as u64;
    if shortest_interval <= 2 * block_size as u64 {
        return Err(MetronomeError::Config(format!(
            "block_size {} is too large for {} BPM at {} Hz",
            block_size, MAX_TEMPO, sample_rate
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate of the clicks and of the output stream (Hz)
    pub sample_rate: u32,
    /// Samples per block exchanged with the output device
    pub block_size: usize,
    /// Blocks held by the playback queue
    pub queue_capacity: usize,
    /// Pending control commands the real-time side can hold
    pub command_capacity: usize,
    /// WAV file for the regular click
    pub lo_click_path: PathBuf,
    /// WAV file for the accent click
    pub hi_click_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            block_size: 512,
            queue_capacity: 10,
            command_capacity: 64,
            lo_click_path: PathBuf::from("samples/lo.wav"),
            hi_click_path: PathBuf::from("samples/hi.wav"),
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a RON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> MetronomeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            MetronomeError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = ron::from_str(&text)
            .map_err(|e| MetronomeError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can drive the scheduler
    pub fn validate(&self) -> MetronomeResult<()> {
        if self.sample_rate == 0 {
            return Err(MetronomeError::Config("sample_rate must be > 0".into()));
        }
        if self.block_size == 0 {
            return Err(MetronomeError::Config("block_size must be > 0".into()));
        }
        if self.queue_capacity < 2 {
            return Err(MetronomeError::Config("queue_capacity must be >= 2".into()));
        }
        if self.command_capacity == 0 {
            return Err(MetronomeError::Config("command_capacity must be > 0".into()));
        }

        check_block_fits_beat(self.sample_rate, self.block_size)
    }

    /// Switch to the rate the output device actually runs at. The block size
    /// scales with the rate so clicks resampled to it still fit in one block.
    pub fn adopt_sample_rate(&mut self, sample_rate: u32) -> MetronomeResult<()> {
        if sample_rate == self.sample_rate {
            return Ok(());
        }
        if sample_rate == 0 || self.sample_rate == 0 {
            return Err(MetronomeError::Config("sample_rate must be > 0".into()));
        }

        let scaled = (self.block_size as u64 * sample_rate as u64).div_ceil(self.sample_rate as u64);
        self.block_size = scaled as usize;
        self.sample_rate = sample_rate;
        self.validate()
    }

    /// Blocks produced before the device starts pulling
    pub fn prefill_blocks(&self) -> usize {
        self.queue_capacity.saturating_sub(1)
    }

    /// Audio time covered by a full queue (advisory only)
    pub fn prefill_window(&self) -> Duration {
        let samples = (self.block_size * self.queue_capacity) as u64;
        Duration::from_micros(samples * 1_000_000 / self.sample_rate.max(1) as u64)
    }
}
