// Sequencer module - beat pattern, tempo, click scheduling and the transport

pub mod pattern;
pub mod queue;
pub mod scheduler;
pub mod tempo;
pub mod transport;

pub use pattern::BeatPattern;
pub use queue::PlaybackQueue;
pub use scheduler::{ClickScheduler, NextBlock, TimingState};
pub use tempo::{BeatTiming, TempoChange, TempoController};
pub use transport::Metronome;
