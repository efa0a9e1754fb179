// Sample bank - the silence, lo and hi click waveforms

use crate::error::{MetronomeError, MetronomeResult};
use crate::sampler::loader::load_click;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sound played on a beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClickSound {
    /// No audible click (beat still counts)
    Silence,
    /// Regular click
    Lo,
    /// Accent click (downbeat by default)
    Hi,
}

impl ClickSound {
    pub const ALL: [ClickSound; 3] = [ClickSound::Silence, ClickSound::Lo, ClickSound::Hi];

    /// Slot of this sound in the sample bank
    pub fn index(self) -> usize {
        match self {
            ClickSound::Silence => 0,
            ClickSound::Lo => 1,
            ClickSound::Hi => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Parse a user-facing name ("silence", "lo", "hi")
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "silence" | "off" | "none" => Some(ClickSound::Silence),
            "lo" | "low" => Some(ClickSound::Lo),
            "hi" | "high" | "accent" => Some(ClickSound::Hi),
            _ => None,
        }
    }
}

/// The three click waveforms, all the same length, at one sample rate.
/// Immutable once built; shared between the control side and the audio callback.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBank {
    sample_rate: u32,
    clicks: [Vec<f32>; 3],
}

impl SampleBank {
    /// Build a bank from the lo and hi clicks.
    /// The shorter click is zero-padded so every slot has the same length.
    pub fn new(sample_rate: u32, lo: Vec<f32>, hi: Vec<f32>) -> MetronomeResult<Self> {
        if sample_rate == 0 {
            return Err(MetronomeError::InvalidSampleBank(
                "sample rate must be > 0".into(),
            ));
        }

        let len = lo.len().max(hi.len());
        if len == 0 {
            return Err(MetronomeError::InvalidSampleBank(
                "click samples are empty".into(),
            ));
        }

        let pad = |mut samples: Vec<f32>| {
            samples.resize(len, 0.0);
            samples
        };

        Ok(Self {
            sample_rate,
            clicks: [vec![0.0; len], pad(lo), pad(hi)],
        })
    }

    /// Load the lo and hi clicks from WAV files, resampled to `sample_rate`
    pub fn from_files<P: AsRef<Path>>(
        lo_path: P,
        hi_path: P,
        sample_rate: u32,
    ) -> MetronomeResult<Self> {
        let lo = load_click(lo_path.as_ref(), sample_rate)?;
        let hi = load_click(hi_path.as_ref(), sample_rate)?;
        Self::new(sample_rate, lo, hi)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples in every click
    pub fn click_len(&self) -> usize {
        self.clicks[0].len()
    }

    /// Waveform for the given sound
    pub fn click(&self, sound: ClickSound) -> &[f32] {
        &self.clicks[sound.index()]
    }

    /// A click may straddle at most two blocks, so it cannot be longer than one
    pub fn check_block_size(&self, block_size: usize) -> MetronomeResult<()> {
        if self.click_len() > block_size {
            return Err(MetronomeError::InvalidSampleBank(format!(
                "click of {} samples does not fit in a block of {}",
                self.click_len(),
                block_size
            )));
        }
        Ok(())
    }
}
