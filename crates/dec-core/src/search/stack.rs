use std::cmp::Ordering;
use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;
use tracing::trace;

use super::hypothesis::{rank_order, Hypothesis, HypothesisId, Signature};
use super::stats::SentenceStats;

/// Size maintenance fires this many members before `2 * max_size`.
const PRUNE_MARGIN: usize = 10;

/// Result of [`HypothesisCollection::add_prune`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// New signature; the node is now a member.
    Added,
    /// A member had the same signature; only `winner` remains a member.
    Recombined {
        winner: HypothesisId,
        loser: HypothesisId,
    },
    /// Below the admission threshold; the node was never looked up.
    Rejected,
}

#[derive(Debug, Clone)]
struct Member {
    id: HypothesisId,
    score: f32,
    /// Recombined losers, kept for n-best extraction.
    alternates: Vec<(HypothesisId, f32)>,
}

/// Score-pruned, recombination-deduplicated set of hypotheses.
///
/// Used as a phrase-based stack (all members cover the same number of
/// source words) and as the contents of a chart cell.
#[derive(Debug, Clone)]
pub struct HypothesisCollection {
    members: FxHashMap<Signature, Member>,
    best_score: f32,
    worst_score: f32,
    max_size: usize,
    beam_width: f32,
    keep_alternates: bool,
    stats: SentenceStats,
}

impl HypothesisCollection {
    /// `beam_width` is a non-positive offset from the best score.
    /// `max_size == 0` disables histogram pruning.
    pub fn new(max_size: usize, beam_width: f32, keep_alternates: bool) -> Self {
        Self {
            members: FxHashMap::default(),
            best_score: f32::NEG_INFINITY,
            worst_score: f32::NEG_INFINITY,
            max_size,
            beam_width,
            keep_alternates,
            stats: SentenceStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn best_score(&self) -> f32 {
        self.best_score
    }

    /// Current admission threshold for `add_prune`.
    pub fn worst_score(&self) -> f32 {
        self.worst_score
    }

    pub fn stats(&self) -> &SentenceStats {
        &self.stats
    }

    pub fn contains(&self, id: HypothesisId) -> bool {
        self.members.values().any(|m| m.id == id)
    }

    /// Insert a node whose signature is not yet present. Returns false (and
    /// changes nothing) when a member already has the same signature.
    pub fn add(&mut self, hypo: &Hypothesis) -> bool {
        match self.members.entry(hypo.signature().clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                v.insert(Member {
                    id: hypo.id(),
                    score: hypo.score(),
                    alternates: Vec::new(),
                });
                self.stats.added += 1;
                self.after_insert(hypo.score());
                true
            }
        }
    }

    /// Recombination-aware insertion.
    pub fn add_prune(&mut self, hypo: &Hypothesis) -> AddOutcome {
        let id = hypo.id();
        let score = hypo.score();
        // NaN and -inf never clear the bar.
        if !(score >= self.worst_score) || score == f32::NEG_INFINITY {
            self.stats.discarded += 1;
            trace!(?id, score, worst = self.worst_score, "discarded, below threshold");
            return AddOutcome::Rejected;
        }

        let keep = self.keep_alternates;
        let outcome = match self.members.entry(hypo.signature().clone()) {
            Entry::Vacant(v) => {
                v.insert(Member {
                    id,
                    score,
                    alternates: Vec::new(),
                });
                self.stats.added += 1;
                AddOutcome::Added
            }
            Entry::Occupied(mut o) => {
                let existing = o.get_mut();
                if score > existing.score {
                    let loser = existing.id;
                    let mut alternates = std::mem::take(&mut existing.alternates);
                    if keep {
                        alternates.insert(0, (existing.id, existing.score));
                    } else {
                        alternates.clear();
                    }
                    *existing = Member {
                        id,
                        score,
                        alternates,
                    };
                    AddOutcome::Recombined { winner: id, loser }
                } else {
                    if keep {
                        existing.alternates.push((id, score));
                    }
                    AddOutcome::Recombined {
                        winner: existing.id,
                        loser: id,
                    }
                }
            }
        };

        match outcome {
            AddOutcome::Added => self.after_insert(score),
            AddOutcome::Recombined { winner, loser } => {
                self.stats.recombined += 1;
                trace!(?winner, ?loser, "recombined");
                if winner == id {
                    self.after_insert(score);
                }
            }
            AddOutcome::Rejected => {}
        }
        outcome
    }

    fn after_insert(&mut self, score: f32) {
        if score > self.best_score {
            self.best_score = score;
            let floor = self.best_score + self.beam_width;
            if floor > self.worst_score {
                self.worst_score = floor;
            }
        }
        if self.max_size > 0 {
            let trigger = (2 * self.max_size)
                .saturating_sub(PRUNE_MARGIN)
                .max(self.max_size);
            if self.members.len() > trigger {
                self.prune_to_size(self.max_size);
            }
        }
    }

    /// Drop members outside the beam of the best score, then keep the `n`
    /// best of the rest (`n == 0` means no cap), ties broken in favour of
    /// older nodes. Afterwards `worst_score` is at least the score of the
    /// n-th survivor, so later insertions below it are rejected without a
    /// lookup.
    pub fn prune_to_size(&mut self, n: usize) {
        if self.members.is_empty() {
            return;
        }
        let floor = self.best_score + self.beam_width;
        let mut ranked: Vec<(HypothesisId, f32)> = self
            .members
            .values()
            .filter(|m| m.score >= floor)
            .map(|m| (m.id, m.score))
            .collect();

        let cutoff = if n > 0 && ranked.len() > n {
            let (_, nth, _) = ranked.select_nth_unstable_by(n - 1, |a, b| rank_order(*a, *b));
            Some(*nth)
        } else {
            None
        };

        let before = self.members.len();
        self.members.retain(|_, m| {
            m.score >= floor
                && cutoff.map_or(true, |c| rank_order((m.id, m.score), c) != Ordering::Greater)
        });
        let removed = before - self.members.len();
        self.stats.pruned += removed;

        let threshold = cutoff.map_or(floor, |c| c.1);
        if threshold > self.worst_score {
            self.worst_score = threshold;
        }
        if removed > 0 {
            trace!(removed, size = self.members.len(), threshold, "pruned");
        }
    }

    /// Highest-scoring member; linear scan.
    pub fn best(&self) -> Option<HypothesisId> {
        self.members
            .values()
            .map(|m| (m.id, m.score))
            .min_by(|a, b| rank_order(*a, *b))
            .map(|(id, _)| id)
    }

    /// Members with scores, best first. Fresh on every call.
    pub fn sorted(&self) -> Vec<(HypothesisId, f32)> {
        let mut v: Vec<_> = self.members.values().map(|m| (m.id, m.score)).collect();
        v.sort_by(|a, b| rank_order(*a, *b));
        v
    }

    /// Trim alternates once the collection is final. Distinct n-best keeps
    /// all of them; otherwise each member keeps its `nbest_size` best.
    pub fn cleanup_alternates(&mut self, nbest_size: usize, distinct: bool) {
        if !self.keep_alternates || distinct {
            return;
        }
        for m in self.members.values_mut() {
            m.alternates.sort_by(|a, b| rank_order(*a, *b));
            m.alternates.truncate(nbest_size);
        }
    }

    /// `(member, alternates)` for every member that absorbed a recombination.
    pub fn alternates(&self) -> impl Iterator<Item = (HypothesisId, Vec<HypothesisId>)> + '_ {
        self.members
            .values()
            .filter(|m| !m.alternates.is_empty())
            .map(|m| (m.id, m.alternates.iter().map(|(id, _)| *id).collect()))
    }
}
