// Playback status shared between the control thread and the audio callback

use crate::error::MetronomeError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
}

impl From<u8> for TransportState {
    fn from(value: u8) -> Self {
        match value {
            1 => TransportState::Starting,
            2 => TransportState::Running,
            _ => TransportState::Stopped,
        }
    }
}

const FAULT_NONE: u8 = 0;
const FAULT_OVERRUN: u8 = 1;
const FAULT_UNDERFLOW: u8 = 2;
const FAULT_STREAM: u8 = 3;

/// Atomics written by the real-time side and read by the control side
#[derive(Debug)]
pub struct SharedPlaybackState {
    state: AtomicU8,
    displayed_beat: AtomicUsize,
    fault: AtomicU8,
}

impl SharedPlaybackState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(TransportState::Stopped as u8),
            displayed_beat: AtomicUsize::new(0),
            fault: AtomicU8::new(FAULT_NONE),
        })
    }

    pub fn state(&self) -> TransportState {
        TransportState::from(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: TransportState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.state() == TransportState::Running
    }

    /// Beat of the block the device is playing right now
    pub fn displayed_beat(&self) -> usize {
        self.displayed_beat.load(Ordering::Relaxed)
    }

    pub fn set_displayed_beat(&self, beat: usize) {
        self.displayed_beat.store(beat, Ordering::Relaxed);
    }

    /// Record a fault for the control side. The first one wins until taken.
    pub fn report_fault(&self, error: &MetronomeError) {
        let code = match error {
            MetronomeError::SchedulingOverrun => FAULT_OVERRUN,
            MetronomeError::BufferUnderflow => FAULT_UNDERFLOW,
            _ => FAULT_STREAM,
        };
        let _ = self.fault.compare_exchange(
            FAULT_NONE,
            code,
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
    }

    /// Take and clear the recorded fault
    pub fn take_fault(&self) -> Option<MetronomeError> {
        match self.fault.swap(FAULT_NONE, Ordering::AcqRel) {
            FAULT_OVERRUN => Some(MetronomeError::SchedulingOverrun),
            FAULT_UNDERFLOW => Some(MetronomeError::BufferUnderflow),
            FAULT_STREAM => Some(MetronomeError::Stream(
                "audio stream reported an error".into(),
            )),
            _ => None,
        }
    }

    /// Back to stopped with beat 0. A pending fault is kept for the caller.
    pub fn reset(&self) {
        self.set_state(TransportState::Stopped);
        self.set_displayed_beat(0);
    }
}
