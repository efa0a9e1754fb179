// Offline output - a device stand-in that is pulled by the caller
//
// Used for tests and headless runs: the transport opens it exactly like a real
// device, and the caller asks for frames whenever it wants.

use super::callback::{BlockRenderer, RenderOutcome};
use super::output::AudioOutput;
use crate::error::MetronomeResult;
use std::sync::{Arc, Mutex, MutexGuard};

/// Cloning gives another handle to the same stream slot
#[derive(Clone, Default)]
pub struct OfflineOutput {
    slot: Arc<Mutex<Option<BlockRenderer>>>,
}

impl OfflineOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<BlockRenderer>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Pull `frames` mono samples. None when no stream is open.
    pub fn pull(&self, frames: usize) -> Option<(Vec<f32>, RenderOutcome)> {
        let mut slot = self.lock();
        let renderer = slot.as_mut()?;
        let mut out = vec![0.0; frames];
        let outcome = renderer.render(&mut out);
        Some((out, outcome))
    }

    /// Inspect the open renderer
    pub fn with_renderer<R>(&self, f: impl FnOnce(&BlockRenderer) -> R) -> Option<R> {
        self.lock().as_ref().map(f)
    }
}

impl AudioOutput for OfflineOutput {
    fn open(&mut self, renderer: BlockRenderer) -> MetronomeResult<()> {
        *self.lock() = Some(renderer);
        Ok(())
    }

    fn abort(&mut self) {
        self.lock().take();
    }
}
