// Command types - control thread → audio callback

use crate::sampler::ClickSound;

/// Mutations applied by the real-time side at the start of its next cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Stage a tempo change (BPM, already validated)
    SetTempo(u32),
    IncreaseBeatsPerBar,
    DecreaseBeatsPerBar,
    /// Beat is 1-based
    AssignBeatSound { beat: usize, sound: ClickSound },
    /// Stop after this many bars of clicks at the current tempo
    LimitBars(u32),
}
