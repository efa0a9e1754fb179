// Playback queue - fixed ring of pre-allocated blocks between scheduler and device
//
// The queue sits on the real-time side only. It is kept one block short of full
// so each device cycle can produce exactly one block and then consume one.

use super::scheduler::{ClickScheduler, NextBlock};
use crate::error::{MetronomeError, MetronomeResult};

pub struct PlaybackQueue {
    // capacity * block_size samples, slot i at [i * block_size..(i + 1) * block_size]
    slots: Vec<f32>,
    beats: Vec<usize>,
    block_size: usize,
    capacity: usize,
    head: usize,
    len: usize,
}

impl PlaybackQueue {
    pub fn new(capacity: usize, block_size: usize) -> Self {
        Self {
            slots: vec![0.0; capacity * block_size],
            beats: vec![0; capacity],
            block_size,
            capacity,
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Fewer blocks than the steady-state depth
    pub fn is_starved(&self) -> bool {
        self.len + 1 < self.capacity
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    fn tail_slot(&self) -> usize {
        (self.head + self.len) % self.capacity
    }

    fn slot_mut(&mut self, index: usize) -> &mut [f32] {
        let start = index * self.block_size;
        &mut self.slots[start..start + self.block_size]
    }

    /// Let the scheduler write its next block straight into the free slot.
    /// Nothing is enqueued on end of stream.
    pub fn try_push_from(&mut self, scheduler: &mut ClickScheduler) -> MetronomeResult<NextBlock> {
        if self.is_full() {
            return Err(MetronomeError::SchedulingOverrun);
        }

        let index = self.tail_slot();
        let result = scheduler.next_block(self.slot_mut(index));
        if let NextBlock::Audio { beat } = result {
            self.beats[index] = beat;
            self.len += 1;
        }
        Ok(result)
    }

    /// Enqueue a copy of `block`
    pub fn try_push(&mut self, block: &[f32], beat: usize) -> MetronomeResult<()> {
        if self.is_full() {
            return Err(MetronomeError::SchedulingOverrun);
        }
        debug_assert_eq!(block.len(), self.block_size);

        let index = self.tail_slot();
        self.slot_mut(index).copy_from_slice(block);
        self.beats[index] = beat;
        self.len += 1;
        Ok(())
    }

    /// Copy the oldest block into `out` and return its beat
    pub fn try_pop_into(&mut self, out: &mut [f32]) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let index = self.head;
        let start = index * self.block_size;
        out.copy_from_slice(&self.slots[start..start + self.block_size]);

        self.head = (self.head + 1) % self.capacity;
        self.len -= 1;
        Some(self.beats[index])
    }

    /// Fill to `capacity - 1` blocks. Returns the number of blocks added and
    /// whether the scheduler reported end of stream on the way.
    pub fn prefill(&mut self, scheduler: &mut ClickScheduler) -> (usize, bool) {
        let mut added = 0;
        while self.len + 1 < self.capacity {
            match self.try_push_from(scheduler) {
                Ok(NextBlock::Audio { .. }) => added += 1,
                Ok(NextBlock::EndOfStream) => return (added, true),
                Err(_) => break,
            }
        }
        (added, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::SampleBank;
    use crate::sequencer::BeatPattern;
    use std::sync::Arc;

    fn scheduler() -> ClickScheduler {
        let bank = Arc::new(SampleBank::new(16000, vec![0.5; 64], vec![1.0; 64]).unwrap());
        ClickScheduler::new(bank, 512, 150, BeatPattern::default()).unwrap()
    }

    #[test]
    fn test_fifo_order_and_wraparound() {
        let mut queue = PlaybackQueue::new(3, 4);
        let mut out = [0.0; 4];

        for round in 0..5 {
            let value = round as f32;
            queue.try_push(&[value; 4], round).unwrap();
            queue.try_push(&[value + 0.5; 4], round + 100).unwrap();

            assert_eq!(queue.try_pop_into(&mut out), Some(round));
            assert_eq!(out, [value; 4]);
            assert_eq!(queue.try_pop_into(&mut out), Some(round + 100));
            assert_eq!(out, [value + 0.5; 4]);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_when_full_is_overrun() {
        let mut queue = PlaybackQueue::new(2, 4);
        queue.try_push(&[0.0; 4], 1).unwrap();
        queue.try_push(&[0.0; 4], 2).unwrap();
        assert!(queue.is_full());

        assert_eq!(
            queue.try_push(&[0.0; 4], 3),
            Err(MetronomeError::SchedulingOverrun)
        );
        let mut s = scheduler();
        let mut queue = PlaybackQueue::new(1, 512);
        queue.try_push_from(&mut s).unwrap();
        assert_eq!(
            queue.try_push_from(&mut s),
            Err(MetronomeError::SchedulingOverrun)
        );
    }

    #[test]
    fn test_pop_when_empty() {
        let mut queue = PlaybackQueue::new(2, 4);
        let mut out = [1.0; 4];
        assert_eq!(queue.try_pop_into(&mut out), None);
        assert_eq!(out, [1.0; 4]);
    }

    #[test]
    fn test_prefill_leaves_one_free_slot() {
        let mut s = scheduler();
        let mut queue = PlaybackQueue::new(10, 512);

        assert_eq!(queue.prefill(&mut s), (9, false));
        assert_eq!(queue.len(), 9);
        assert!(!queue.is_starved());
        assert_eq!(s.state().total_samples_delivered, 9 * 512);

        // First block out is the one holding the first click
        let mut out = vec![0.0; 512];
        assert_eq!(queue.try_pop_into(&mut out), Some(1));
        assert_eq!(out[0], 1.0);
        assert!(queue.is_starved());
    }

    #[test]
    fn test_prefill_stops_at_end_of_stream() {
        let mut s = scheduler();
        s.limit_bars(1).unwrap();
        // The fifth click (sample 25600) falls due at the end of block 49
        let mut queue = PlaybackQueue::new(64, 512);

        let (added, ended) = queue.prefill(&mut s);
        assert!(ended);
        assert_eq!(added, 49);
        assert!(s.is_finished());
    }

    #[test]
    fn test_clear() {
        let mut queue = PlaybackQueue::new(3, 2);
        queue.try_push(&[1.0, 1.0], 1).unwrap();
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.is_starved());
    }
}
