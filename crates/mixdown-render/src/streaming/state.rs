//! Per-clip processor state that lives across chunks.

use std::collections::HashMap;

use crate::clip::ClipState;
use crate::plan::ClipPlan;

/// State of the clips of one track, keyed by (track, clip).
///
/// An entry is created on a clip's first slice and dropped after its last,
/// so no state is ever shared between clips. Dropping an entry closes the
/// clip's source cursor.
#[derive(Debug, Default)]
pub struct FilterArena {
    states: HashMap<(usize, usize), ClipState>,
}

impl FilterArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a clip, created on first use.
    pub fn state(&mut self, key: (usize, usize), plan: &ClipPlan, sample_rate: u32) -> &mut ClipState {
        self.states
            .entry(key)
            .or_insert_with(|| ClipState::new(plan, sample_rate))
    }

    /// Drops the state of a finished clip.
    pub fn release(&mut self, key: (usize, usize)) {
        self.states.remove(&key);
    }
}
