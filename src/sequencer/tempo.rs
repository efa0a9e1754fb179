// Tempo - validated BPM value, staged changes, and the timing derived from it

use crate::config::{MAX_TEMPO, MIN_TEMPO};
use crate::error::{MetronomeError, MetronomeResult};

/// What a tempo request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempoChange {
    /// Took effect immediately (scheduler not running)
    Applied,
    /// Waiting for the next beat boundary
    Staged,
    /// Matched the active tempo; any staged change was dropped
    Cleared,
}

/// Owns the active tempo and at most one staged replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoController {
    bpm: u32,
    pending: Option<u32>,
}

impl TempoController {
    pub fn new(bpm: u32) -> MetronomeResult<Self> {
        Ok(Self {
            bpm: Self::validate(bpm)?,
            pending: None,
        })
    }

    /// Check a BPM value against the supported range
    pub fn validate(bpm: u32) -> MetronomeResult<u32> {
        if !(MIN_TEMPO..=MAX_TEMPO).contains(&bpm) {
            return Err(MetronomeError::TempoOutOfRange {
                value: bpm,
                min: MIN_TEMPO,
                max: MAX_TEMPO,
            });
        }
        Ok(bpm)
    }

    /// Active tempo
    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// Staged tempo, if any
    pub fn pending(&self) -> Option<u32> {
        self.pending
    }

    /// Request a new tempo.
    /// Stopped: applied now. Running: staged, last write wins, and a request
    /// equal to the active tempo cancels whatever was staged.
    pub fn request(&mut self, bpm: u32, running: bool) -> MetronomeResult<TempoChange> {
        let bpm = Self::validate(bpm)?;

        if !running {
            self.bpm = bpm;
            self.pending = None;
            return Ok(TempoChange::Applied);
        }

        if bpm == self.bpm {
            self.pending = None;
            Ok(TempoChange::Cleared)
        } else {
            self.pending = Some(bpm);
            Ok(TempoChange::Staged)
        }
    }

    /// Promote the staged tempo to active, returning it
    pub fn take_pending(&mut self) -> Option<u32> {
        let bpm = self.pending.take()?;
        self.bpm = bpm;
        Some(bpm)
    }
}

/// Sample-domain timing for one tempo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatTiming {
    /// Whole samples per beat
    pub interval: u64,
    /// Exact samples per beat
    pub float_interval: f64,
    /// Fractional samples lost to truncation over one block
    pub drift_error_per_block: f64,
}

impl BeatTiming {
    pub fn new(sample_rate: u32, bpm: u32, block_size: usize) -> Self {
        let float_interval = sample_rate as f64 * 60.0 / bpm as f64;
        let whole = float_interval.floor();
        let error_per_sample = (float_interval - whole) / whole;

        Self {
            interval: whole as u64,
            float_interval,
            drift_error_per_block: block_size as f64 * error_per_sample,
        }
    }
}
