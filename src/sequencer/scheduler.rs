// Click scheduler - sample-accurate block generator for the metronome
//
// Every call produces exactly one block. A block either carries the tail of the
// click started in the previous block, or is checked for a new click: the click
// is laid into a two-block scratch buffer at its exact offset, the first half is
// returned and the second half is kept as the tail for the next call.
//
// Truncating samples-per-beat to an integer loses a fraction of a sample per
// beat. That fraction is accumulated block by block and every time it crosses a
// whole sample the click grid is shifted by one sample, so the long-run tempo
// stays exact while clicks only ever land on whole samples.

use std::sync::Arc;

use super::pattern::BeatPattern;
use super::tempo::{BeatTiming, TempoChange, TempoController};
use crate::config::check_block_fits_beat;
use crate::error::{MetronomeError, MetronomeResult};
use crate::sampler::{ClickSound, SampleBank};

/// Result of producing one block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextBlock {
    /// The block was written; `beat` is the beat it belongs to (0 before the first click)
    Audio { beat: usize },
    /// Bar-limited playback is complete; nothing was written
    EndOfStream,
}

/// Counters owned by the scheduler. All zero after construction or reset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimingState {
    /// Samples delivered since start (or since the last tempo change)
    pub total_samples_delivered: u64,
    /// Running sum of fractional-sample error
    pub accumulated_drift_error: f64,
    /// Whole samples the click grid has been shifted by
    pub samples_to_shift: u64,
    /// Beat of the most recent click, 1..=beats_per_bar (0 before the first)
    pub current_beat: usize,
    /// Clicks started at the current tempo
    pub beats_at_tempo: u64,
}

pub struct ClickScheduler {
    bank: Arc<SampleBank>,
    block_size: usize,
    tempo: TempoController,
    timing: BeatTiming,
    pattern: BeatPattern,
    state: TimingState,

    // Pre-allocated so next_block never allocates
    scratch: Vec<f32>,
    tail: Vec<f32>,
    tail_pending: bool,

    started: bool,
    // Clicks still allowed under a bar limit
    clicks_remaining: Option<u64>,
    finished: bool,
}

impl ClickScheduler {
    pub fn new(
        bank: Arc<SampleBank>,
        block_size: usize,
        bpm: u32,
        pattern: BeatPattern,
    ) -> MetronomeResult<Self> {
        if block_size == 0 {
            return Err(MetronomeError::Config("block_size must be > 0".into()));
        }
        check_block_fits_beat(bank.sample_rate(), block_size)?;
        bank.check_block_size(block_size)?;

        let tempo = TempoController::new(bpm)?;
        let timing = BeatTiming::new(bank.sample_rate(), bpm, block_size);

        Ok(Self {
            bank,
            block_size,
            tempo,
            timing,
            pattern,
            state: TimingState::default(),
            scratch: vec![0.0; 2 * block_size],
            tail: vec![0.0; block_size],
            tail_pending: false,
            started: false,
            clicks_remaining: None,
            finished: false,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.bank.sample_rate()
    }

    /// Active tempo (BPM)
    pub fn tempo(&self) -> u32 {
        self.tempo.bpm()
    }

    /// Tempo waiting for the next beat boundary
    pub fn pending_tempo(&self) -> Option<u32> {
        self.tempo.pending()
    }

    pub fn timing(&self) -> BeatTiming {
        self.timing
    }

    pub fn state(&self) -> &TimingState {
        &self.state
    }

    pub fn current_beat(&self) -> usize {
        self.state.current_beat
    }

    pub fn pattern(&self) -> &BeatPattern {
        &self.pattern
    }

    pub fn beats_per_bar(&self) -> usize {
        self.pattern.beats_per_bar()
    }

    /// True while the second half of a click is waiting to be delivered
    pub fn has_pending_tail(&self) -> bool {
        self.tail_pending
    }

    /// True once bar-limited playback has ended
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Clicks left before bar-limited playback ends
    pub fn clicks_remaining(&self) -> Option<u64> {
        self.clicks_remaining
    }

    /// Before the first block the change is immediate; afterwards it is staged
    /// and applied when the current click's tail has been delivered.
    pub fn request_tempo(&mut self, bpm: u32) -> MetronomeResult<TempoChange> {
        let change = self.tempo.request(bpm, self.started)?;
        if change == TempoChange::Applied {
            self.timing = BeatTiming::new(self.bank.sample_rate(), bpm, self.block_size);
        }
        Ok(change)
    }

    pub fn increase_beats_per_bar(&mut self) -> bool {
        self.pattern.increase()
    }

    /// Shrinks the bar immediately; a current beat past the new end restarts at 1
    pub fn decrease_beats_per_bar(&mut self) -> bool {
        let changed = self.pattern.decrease();
        if self.state.current_beat > self.pattern.beats_per_bar() {
            self.state.current_beat = 1;
        }
        changed
    }

    pub fn assign_beat_sound(&mut self, beat: usize, sound: ClickSound) -> MetronomeResult<()> {
        self.pattern.assign(beat, sound)
    }

    /// End playback after `bars` bars' worth of clicks from now, counted at the
    /// current beats per bar. Replaces any earlier limit.
    pub fn limit_bars(&mut self, bars: u32) -> MetronomeResult<()> {
        if bars == 0 {
            return Err(MetronomeError::InvalidBarCount);
        }
        self.clicks_remaining = Some(bars as u64 * self.pattern.beats_per_bar() as u64);
        Ok(())
    }

    pub fn clear_bar_limit(&mut self) {
        self.clicks_remaining = None;
    }

    /// Zero every counter and drop any tail, as on stop.
    /// A staged tempo becomes the active one for the next start.
    pub fn reset(&mut self) {
        self.state = TimingState::default();
        self.tail_pending = false;
        self.started = false;
        self.finished = false;
        self.clicks_remaining = None;
        if let Some(bpm) = self.tempo.take_pending() {
            self.timing = BeatTiming::new(self.bank.sample_rate(), bpm, self.block_size);
        }
    }

    /// Produce the next block into `out` (exactly `block_size` samples)
    pub fn next_block(&mut self, out: &mut [f32]) -> NextBlock {
        debug_assert_eq!(out.len(), self.block_size);

        if self.finished {
            out.fill(0.0);
            return NextBlock::EndOfStream;
        }
        self.started = true;

        if self.tail_pending {
            out.copy_from_slice(&self.tail);
            self.tail_pending = false;

            // Beat boundary: the in-flight click is complete
            if let Some(bpm) = self.tempo.take_pending() {
                self.apply_tempo(bpm);
            }
        } else {
            let offset = if self.state.total_samples_delivered == 0 {
                Some(0)
            } else {
                let until = self.samples_until_next_click();
                (until <= self.block_size as u64).then_some(until as usize)
            };

            match offset {
                Some(offset) => {
                    if self.clicks_remaining == Some(0) {
                        self.finished = true;
                        out.fill(0.0);
                        return NextBlock::EndOfStream;
                    }
                    self.start_click(offset, out);
                }
                None => out.fill(0.0),
            }
        }

        self.advance_counters();

        NextBlock::Audio {
            beat: self.state.current_beat,
        }
    }

    /// Samples from the start of the next block to the next click on the shifted grid
    fn samples_until_next_click(&self) -> u64 {
        let interval = self.timing.interval;
        let elapsed = self.state.total_samples_delivered % interval;
        let mut until = interval - elapsed + self.state.samples_to_shift % interval;
        if until > interval {
            until -= interval;
        }
        until
    }

    fn start_click(&mut self, offset: usize, out: &mut [f32]) {
        self.state.current_beat = self.state.current_beat % self.pattern.beats_per_bar() + 1;
        self.state.beats_at_tempo += 1;
        if let Some(remaining) = self.clicks_remaining.as_mut() {
            *remaining -= 1;
        }

        let click = self
            .bank
            .click(self.pattern.sound_for(self.state.current_beat));

        self.scratch.fill(0.0);
        self.scratch[offset..offset + click.len()].copy_from_slice(click);

        let (head, tail) = self.scratch.split_at(self.block_size);
        out.copy_from_slice(head);
        self.tail.copy_from_slice(tail);
        self.tail_pending = true;
    }

    /// New tempo starts cleanly from this boundary. Drift and shift are zeroed
    /// along with the counters: a shift carried over from the old interval
    /// would offset the new grid.
    fn apply_tempo(&mut self, bpm: u32) {
        self.timing = BeatTiming::new(self.bank.sample_rate(), bpm, self.block_size);
        self.state.total_samples_delivered = 0;
        self.state.beats_at_tempo = 0;
        self.state.accumulated_drift_error = 0.0;
        self.state.samples_to_shift = 0;
    }

    fn advance_counters(&mut self) {
        self.state.total_samples_delivered += self.block_size as u64;

        let before = self.state.accumulated_drift_error.floor();
        self.state.accumulated_drift_error += self.timing.drift_error_per_block;
        let after = self.state.accumulated_drift_error.floor();
        if after > before {
            self.state.samples_to_shift += (after - before) as u64;
        }
    }
}
