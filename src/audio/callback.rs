// Block renderer - everything the device callback does, independent of the backend
//
// Each time the device has consumed a whole block the renderer
//   1. applies queued control commands to the scheduler,
//   2. produces one new block into the playback queue,
//   3. pops the oldest block and publishes its beat as the displayed beat.
// The queue therefore stays at its prefilled depth and the displayed beat lags
// production by that depth, which is exactly the audible latency.
//
// No allocation, I/O or locking happens after construction.

use std::sync::Arc;

use super::format_conversion::write_mono_to_interleaved_frame;
use super::status::{SharedPlaybackState, TransportState};
use crate::error::MetronomeError;
use crate::messaging::{Command, CommandConsumer};
use crate::sequencer::{ClickScheduler, NextBlock, PlaybackQueue};
use cpal::{FromSample, SizedSample};
use ringbuf::traits::Consumer;

/// Outcome of one render call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Keep calling
    Continue,
    /// Bar-limited playback drained completely; output is silence from here on
    Finished,
    /// Playback halted on an error; output is silence from here on
    Fault(MetronomeError),
    /// The session was ended from outside (device stream error); output is silence
    Halted,
}

pub struct BlockRenderer {
    scheduler: ClickScheduler,
    queue: PlaybackQueue,
    commands: CommandConsumer,
    shared: Arc<SharedPlaybackState>,

    current: Vec<f32>,
    cursor: usize,
    draining: bool,
    ended: Option<RenderOutcome>,
}

impl BlockRenderer {
    pub fn new(
        scheduler: ClickScheduler,
        queue_capacity: usize,
        commands: CommandConsumer,
        shared: Arc<SharedPlaybackState>,
    ) -> Self {
        let block_size = scheduler.block_size();
        Self {
            scheduler,
            queue: PlaybackQueue::new(queue_capacity, block_size),
            commands,
            shared,
            current: vec![0.0; block_size],
            // Exhausted, so the first sample requested loads a block
            cursor: block_size,
            draining: false,
            ended: None,
        }
    }

    /// Fill the queue to its steady-state depth before the device starts pulling.
    /// Returns the number of blocks produced.
    pub fn prefill(&mut self) -> usize {
        let (added, ended) = self.queue.prefill(&mut self.scheduler);
        self.draining = ended;
        added
    }

    pub fn scheduler(&self) -> &ClickScheduler {
        &self.scheduler
    }

    pub fn queued_blocks(&self) -> usize {
        self.queue.len()
    }

    pub fn shared(&self) -> &Arc<SharedPlaybackState> {
        &self.shared
    }

    pub fn outcome(&self) -> RenderOutcome {
        self.ended.clone().unwrap_or(RenderOutcome::Continue)
    }

    /// Fill a mono buffer
    pub fn render(&mut self, out: &mut [f32]) -> RenderOutcome {
        self.check_halted();
        for sample in out.iter_mut() {
            *sample = self.next_sample().unwrap_or(0.0);
        }
        self.outcome()
    }

    /// Fill an interleaved device buffer, same sample on every channel
    pub fn render_interleaved<T>(&mut self, data: &mut [T], channels: usize) -> RenderOutcome
    where
        T: SizedSample + FromSample<f32>,
    {
        self.check_halted();
        for frame in data.chunks_mut(channels.max(1)) {
            let sample = self.next_sample().unwrap_or(0.0);
            write_mono_to_interleaved_frame(sample, frame);
        }
        self.outcome()
    }

    // Once per device callback: a session no longer marked Running plays nothing more
    fn check_halted(&mut self) {
        if self.ended.is_none() && self.shared.state() != TransportState::Running {
            self.shared.set_displayed_beat(0);
            self.ended = Some(RenderOutcome::Halted);
        }
    }

    fn next_sample(&mut self) -> Option<f32> {
        if self.ended.is_some() {
            return None;
        }
        if self.cursor >= self.current.len() {
            if let Err(outcome) = self.load_next_block() {
                self.end(outcome);
                return None;
            }
        }
        let sample = self.current[self.cursor];
        self.cursor += 1;
        Some(sample)
    }

    fn load_next_block(&mut self) -> Result<(), RenderOutcome> {
        self.apply_commands();

        if !self.draining {
            match self.queue.try_push_from(&mut self.scheduler) {
                Ok(NextBlock::Audio { .. }) => {}
                Ok(NextBlock::EndOfStream) => self.draining = true,
                Err(e) => return Err(RenderOutcome::Fault(e)),
            }
        }

        match self.queue.try_pop_into(&mut self.current) {
            Some(beat) => {
                self.shared.set_displayed_beat(beat);
                self.cursor = 0;
                Ok(())
            }
            None if self.draining => Err(RenderOutcome::Finished),
            // Prefill keeps capacity - 1 blocks queued and every pop follows a push,
            // so an empty queue here means that invariant was broken
            None => Err(RenderOutcome::Fault(MetronomeError::BufferUnderflow)),
        }
    }

    // Values were validated on the control side before being queued
    fn apply_commands(&mut self) {
        while let Some(command) = self.commands.try_pop() {
            match command {
                Command::SetTempo(bpm) => {
                    let _ = self.scheduler.request_tempo(bpm);
                }
                Command::IncreaseBeatsPerBar => {
                    self.scheduler.increase_beats_per_bar();
                }
                Command::DecreaseBeatsPerBar => {
                    self.scheduler.decrease_beats_per_bar();
                }
                Command::AssignBeatSound { beat, sound } => {
                    let _ = self.scheduler.assign_beat_sound(beat, sound);
                }
                Command::LimitBars(bars) => {
                    let _ = self.scheduler.limit_bars(bars);
                }
            }
        }
    }

    fn end(&mut self, outcome: RenderOutcome) {
        self.shared.reset();
        if let RenderOutcome::Fault(error) = &outcome {
            self.shared.report_fault(error);
        }
        debug_assert_eq!(self.shared.state(), TransportState::Stopped);
        self.ended = Some(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::create_command_channel;
    use crate::sampler::SampleBank;
    use crate::sequencer::BeatPattern;
    use ringbuf::traits::Producer;

    const BLOCK: usize = 512;

    fn renderer(bpm: u32, capacity: usize) -> (BlockRenderer, crate::messaging::CommandProducer) {
        let bank = Arc::new(SampleBank::new(16000, vec![0.5; 100], vec![1.0; 100]).unwrap());
        let scheduler = ClickScheduler::new(bank, BLOCK, bpm, BeatPattern::default()).unwrap();
        let (tx, rx) = create_command_channel(16);
        let shared = SharedPlaybackState::new();
        shared.set_state(TransportState::Running);
        (BlockRenderer::new(scheduler, capacity, rx, shared), tx)
    }

    #[test]
    fn test_prefill_then_steady_depth() {
        let (mut r, _tx) = renderer(150, 10);
        assert_eq!(r.prefill(), 9);

        let mut out = vec![0.0; BLOCK];
        for _ in 0..50 {
            assert_eq!(r.render(&mut out), RenderOutcome::Continue);
            assert_eq!(r.queued_blocks(), 9);
        }
    }

    #[test]
    fn test_displayed_beat_follows_consumed_blocks() {
        let (mut r, _tx) = renderer(150, 10);
        r.prefill();
        let mut out = vec![0.0; BLOCK];

        r.render(&mut out);
        assert_eq!(out[0], 1.0);
        assert_eq!(r.shared().displayed_beat(), 1);

        // The scheduler is already nine blocks ahead of what is heard.
        // Beat 2 starts in block 12; it is heard on the 13th render.
        for _ in 1..12 {
            r.render(&mut out);
            assert_eq!(r.shared().displayed_beat(), 1);
        }
        assert_eq!(r.scheduler().current_beat(), 2);
        r.render(&mut out);
        assert_eq!(r.shared().displayed_beat(), 2);
        assert_eq!(out[256], 0.5);
    }

    #[test]
    fn test_partial_buffers_keep_stream_continuous() {
        let (mut a, _ta) = renderer(140, 10);
        let (mut b, _tb) = renderer(140, 10);
        a.prefill();
        b.prefill();

        let mut whole = vec![0.0; BLOCK * 40];
        a.render(&mut whole);

        let mut pieces = Vec::new();
        let mut chunk = vec![0.0; 300];
        while pieces.len() < whole.len() {
            b.render(&mut chunk);
            pieces.extend_from_slice(&chunk);
        }
        assert_eq!(&pieces[..whole.len()], &whole[..]);
    }

    #[test]
    fn test_interleaved_writes_every_channel() {
        let (mut r, _tx) = renderer(150, 4);
        r.prefill();
        let mut data = vec![0i16; 2 * 8];
        r.render_interleaved(&mut data, 2);
        assert!(data[0] > 30000);
        assert_eq!(data[0], data[1]);
    }

    #[test]
    fn test_commands_reach_scheduler() {
        let (mut r, mut tx) = renderer(150, 4);
        r.prefill();
        tx.try_push(Command::IncreaseBeatsPerBar).unwrap();
        tx.try_push(Command::AssignBeatSound {
            beat: 5,
            sound: crate::sampler::ClickSound::Hi,
        })
        .unwrap();
        tx.try_push(Command::SetTempo(120)).unwrap();

        let mut out = vec![0.0; BLOCK];
        r.render(&mut out);
        assert_eq!(r.scheduler().beats_per_bar(), 5);
        assert_eq!(
            r.scheduler().pattern().sound_for(5),
            crate::sampler::ClickSound::Hi
        );
        assert_eq!(r.scheduler().pending_tempo(), Some(120));
    }

    #[test]
    fn test_bar_limit_drains_then_finishes() {
        let (mut r, _tx) = renderer(300, 4);
        r.scheduler.limit_bars(1).unwrap();
        r.prefill();

        let mut out = vec![0.0; BLOCK];
        let mut clicks = 0;
        let mut blocks = 0;
        loop {
            let outcome = r.render(&mut out);
            clicks += out
                .iter()
                .enumerate()
                .filter(|&(i, &x)| x != 0.0 && (i == 0 || out[i - 1] == 0.0))
                .count();
            if outcome != RenderOutcome::Continue {
                assert_eq!(outcome, RenderOutcome::Finished);
                break;
            }
            blocks += 1;
            assert!(blocks < 1000);
        }

        assert_eq!(clicks, 4);
        assert_eq!(r.shared().state(), TransportState::Stopped);
        assert_eq!(r.shared().displayed_beat(), 0);
        assert_eq!(r.shared().take_fault(), None);

        // Silence from here on
        out.fill(1.0);
        assert_eq!(r.render(&mut out), RenderOutcome::Finished);
        assert!(out.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_single_slot_queue_plays_without_latency() {
        let (mut r, _tx) = renderer(150, 1);
        assert_eq!(r.prefill(), 0);

        let mut out = vec![0.0; BLOCK];
        assert_eq!(r.render(&mut out), RenderOutcome::Continue);
        assert_eq!(out[0], 1.0);
        assert_eq!(r.shared().displayed_beat(), r.scheduler().current_beat());
    }

    #[test]
    fn test_stream_error_silences_renderer() {
        let (mut r, _tx) = renderer(150, 10);
        r.prefill();
        let mut out = vec![0.0; BLOCK];
        for _ in 0..5 {
            assert_eq!(r.render(&mut out), RenderOutcome::Continue);
        }

        // What the device error callback does
        r.shared()
            .report_fault(&MetronomeError::Stream("device unplugged".into()));
        r.shared().reset();

        // Block 12 would carry the second click
        for _ in 5..20 {
            out.fill(1.0);
            assert_eq!(r.render(&mut out), RenderOutcome::Halted);
            assert!(out.iter().all(|&x| x == 0.0));
        }
        assert_eq!(r.shared().state(), TransportState::Stopped);
        assert_eq!(r.shared().displayed_beat(), 0);
        assert!(matches!(
            r.shared().take_fault(),
            Some(MetronomeError::Stream(_))
        ));
    }

    #[test]
    fn test_not_running_renders_nothing() {
        let (mut r, _tx) = renderer(150, 4);
        r.prefill();
        r.shared().set_state(TransportState::Stopped);

        let mut data = vec![7i16; 16];
        assert_eq!(r.render_interleaved(&mut data, 2), RenderOutcome::Halted);
        assert!(data.iter().all(|&x| x == 0));
    }

    #[test]
    fn test_overrun_halts_playback() {
        let (mut r, _tx) = renderer(150, 2);
        r.queue.try_push(&[0.0; BLOCK], 0).unwrap();
        r.queue.try_push(&[0.0; BLOCK], 0).unwrap();

        let mut out = vec![1.0; BLOCK];
        assert_eq!(
            r.render(&mut out),
            RenderOutcome::Fault(MetronomeError::SchedulingOverrun)
        );
        assert!(out.iter().all(|&x| x == 0.0));
        assert_eq!(r.shared().state(), TransportState::Stopped);
        assert_eq!(
            r.shared().take_fault(),
            Some(MetronomeError::SchedulingOverrun)
        );
    }
}
