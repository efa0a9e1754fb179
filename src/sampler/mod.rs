pub mod bank;
pub mod loader;

pub use bank::{ClickSound, SampleBank};
pub use loader::load_click;
