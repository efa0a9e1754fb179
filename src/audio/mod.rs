// Module audio - real-time rendering, device backends and offline export

pub mod callback;
pub mod export;
pub mod format_conversion;
pub mod offline;
pub mod output;
pub mod status;

pub use callback::{BlockRenderer, RenderOutcome};
pub use offline::OfflineOutput;
pub use output::{AudioOutput, CpalOutput};
pub use status::{SharedPlaybackState, TransportState};
