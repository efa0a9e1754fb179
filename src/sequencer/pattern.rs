// Beat pattern - which click sound plays on each beat of the bar
//
// Stored in a fixed array sized for the longest bar, with a logical length
// tracking the current beats per bar, so resizing never reallocates.

use crate::config::{MAX_BEATS_PER_BAR, MIN_BEATS_PER_BAR};
use crate::error::{MetronomeError, MetronomeResult};
use crate::sampler::ClickSound;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatPattern {
    sounds: [ClickSound; MAX_BEATS_PER_BAR],
    len: usize,
}

impl BeatPattern {
    /// Default pattern: accent on beat 1, regular click on every other beat
    pub fn new(beats_per_bar: usize) -> MetronomeResult<Self> {
        Self::validate_beats_per_bar(beats_per_bar)?;

        let mut sounds = [ClickSound::Lo; MAX_BEATS_PER_BAR];
        sounds[0] = ClickSound::Hi;

        Ok(Self {
            sounds,
            len: beats_per_bar,
        })
    }

    pub fn validate_beats_per_bar(beats_per_bar: usize) -> MetronomeResult<usize> {
        if !(MIN_BEATS_PER_BAR..=MAX_BEATS_PER_BAR).contains(&beats_per_bar) {
            return Err(MetronomeError::BeatsPerBarOutOfRange {
                value: beats_per_bar,
                min: MIN_BEATS_PER_BAR,
                max: MAX_BEATS_PER_BAR,
            });
        }
        Ok(beats_per_bar)
    }

    pub fn beats_per_bar(&self) -> usize {
        self.len
    }

    /// Sounds for beats 1..=beats_per_bar
    pub fn sounds(&self) -> &[ClickSound] {
        &self.sounds[..self.len]
    }

    /// Sound for a 1-based beat number. Beats outside the bar are silent.
    pub fn sound_for(&self, beat: usize) -> ClickSound {
        if beat == 0 || beat > self.len {
            return ClickSound::Silence;
        }
        self.sounds[beat - 1]
    }

    /// Overwrite the sound of one beat
    pub fn assign(&mut self, beat: usize, sound: ClickSound) -> MetronomeResult<()> {
        if beat == 0 || beat > self.len {
            return Err(MetronomeError::InvalidBeatIndex {
                beat,
                beats_per_bar: self.len,
            });
        }
        self.sounds[beat - 1] = sound;
        Ok(())
    }

    /// Append a regular click. Returns false when already at the maximum.
    pub fn increase(&mut self) -> bool {
        if self.len >= MAX_BEATS_PER_BAR {
            return false;
        }
        self.sounds[self.len] = ClickSound::Lo;
        self.len += 1;
        true
    }

    /// Drop the last beat. Returns false when already at one beat.
    pub fn decrease(&mut self) -> bool {
        if self.len <= MIN_BEATS_PER_BAR {
            return false;
        }
        self.len -= 1;
        true
    }
}

impl Default for BeatPattern {
    fn default() -> Self {
        let mut sounds = [ClickSound::Lo; MAX_BEATS_PER_BAR];
        sounds[0] = ClickSound::Hi;
        Self { sounds, len: 4 }
    }
}
