// Error types shared by the scheduler, the transport and the audio backends

use thiserror::Error;

/// Metronome-related errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetronomeError {
    #[error("Tempo {value} BPM is out of range [{min}, {max}]")]
    TempoOutOfRange { value: u32, min: u32, max: u32 },

    #[error("Beats per bar {value} is out of range [{min}, {max}]")]
    BeatsPerBarOutOfRange { value: usize, min: usize, max: usize },

    #[error("Beat {beat} is not in the current bar (1..={beats_per_bar})")]
    InvalidBeatIndex { beat: usize, beats_per_bar: usize },

    #[error("Number of bars must be greater than zero")]
    InvalidBarCount,

    #[error("Internal scheduling overrun: playback queue was already full")]
    SchedulingOverrun,

    #[error("Buffer underflow: playback queue was empty when the device requested audio")]
    BufferUnderflow,

    #[error("Command queue is full")]
    CommandQueueFull,

    #[error("Invalid sample bank: {0}")]
    InvalidSampleBank(String),

    #[error("Failed to load sample: {0}")]
    SampleLoad(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Audio stream error: {0}")]
    Stream(String),
}

pub type MetronomeResult<T> = Result<T, MetronomeError>;
