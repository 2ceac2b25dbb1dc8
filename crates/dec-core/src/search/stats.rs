use std::ops::AddAssign;

use serde::Serialize;
use tracing::debug;

/// Per-sentence search counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentenceStats {
    /// Nodes allocated in the arena.
    pub created: usize,
    /// Nodes that became collection members under a new signature.
    pub added: usize,
    /// Nodes rejected by the admission threshold.
    pub discarded: usize,
    pub recombined: usize,
    /// Members removed by size maintenance.
    pub pruned: usize,
    /// Frontier entries materialized by cube pruning.
    pub popped: usize,
}

impl SentenceStats {
    pub fn log(&self, mode: &'static str) {
        debug!(
            mode,
            created = self.created,
            added = self.added,
            discarded = self.discarded,
            recombined = self.recombined,
            pruned = self.pruned,
            popped = self.popped,
            "search finished"
        );
    }
}

impl AddAssign<&SentenceStats> for SentenceStats {
    fn add_assign(&mut self, rhs: &SentenceStats) {
        self.created += rhs.created;
        self.added += rhs.added;
        self.discarded += rhs.discarded;
        self.recombined += rhs.recombined;
        self.pruned += rhs.pruned;
        self.popped += rhs.popped;
    }
}
