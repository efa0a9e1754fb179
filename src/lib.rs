// clicktrack - sample-accurate metronome engine
//
// Library exports for the binary, tests and benchmarks

pub mod audio;
pub mod config;
pub mod error;
pub mod messaging;
pub mod sampler;
pub mod sequencer;

pub use audio::{AudioOutput, CpalOutput, OfflineOutput, RenderOutcome, TransportState};
pub use config::EngineConfig;
pub use error::{MetronomeError, MetronomeResult};
pub use sampler::{ClickSound, SampleBank};
pub use sequencer::{BeatPattern, ClickScheduler, Metronome, NextBlock, PlaybackQueue};
