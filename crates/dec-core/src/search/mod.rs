//! Beam search over translation hypotheses.
//!
//! Phrase-based decoding fills one stack per number of covered source
//! words; chart decoding fills one cell per source span, bottom up. Both
//! recombine equivalent hypotheses, prune by a relative beam and a size cap,
//! and can enumerate combinations lazily with cube pruning. N-best lists are
//! read back from the recombination graph left behind by the search.

mod chart;
mod coverage;
pub mod cube;
mod future;
mod hypothesis;
mod nbest;
mod phrase;
mod score;
mod shortlist;
mod stack;
mod stats;
#[cfg(test)]
pub(crate) mod testutil;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::settings::{settings, SearchOptions};
use crate::source::{CandidateSource, Sentence};

pub use chart::search_chart;
pub use coverage::Coverage;
pub use future::FutureScores;
pub use hypothesis::{
    rank_order, Boundary, BoundaryRecombination, DerivationKind, Hypothesis, HypothesisArena,
    HypothesisId, Recombination, Signature,
};
pub use nbest::{Segment, Translation};
pub use phrase::search_phrase;
pub use score::{DefaultScoreFunction, ScoreFunction};
pub use shortlist::{RuleOption, RuleShortlist};
pub use stack::{AddOutcome, HypothesisCollection};
pub use stats::SentenceStats;

/// Per-sentence decode failure. Never fatal for a batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("no translation found")]
    NoTranslation,

    #[error("decode cancelled")]
    Cancelled,

    #[error("time budget of {0} ms exceeded")]
    Timeout(u64),

    #[error("malformed candidate: {0}")]
    MalformedCandidate(String),
}

/// Shared flag checked between stacks and chart cells.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Model plug-ins for one decode.
#[derive(Clone)]
pub struct SearchHooks {
    pub scorer: Arc<dyn ScoreFunction>,
    pub recombination: Arc<dyn Recombination>,
    pub cancel: CancelToken,
}

impl SearchHooks {
    pub fn new(scorer: Arc<dyn ScoreFunction>) -> Self {
        Self {
            scorer,
            recombination: Arc::new(BoundaryRecombination),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for SearchHooks {
    fn default() -> Self {
        Self::new(Arc::new(DefaultScoreFunction::new(
            settings().score.distortion_weight,
        )))
    }
}

/// Cancellation and wall-clock limit for one decode.
pub(crate) struct Budget<'a> {
    cancel: &'a CancelToken,
    deadline: Option<(Instant, u64)>,
}

impl<'a> Budget<'a> {
    pub(crate) fn start(cancel: &'a CancelToken, timeout_ms: u64) -> Self {
        let deadline =
            (timeout_ms > 0).then(|| (Instant::now() + Duration::from_millis(timeout_ms), timeout_ms));
        Self { cancel, deadline }
    }

    pub(crate) fn check(&self) -> Result<(), DecodeError> {
        if self.cancel.is_cancelled() {
            return Err(DecodeError::Cancelled);
        }
        match self.deadline {
            Some((at, ms)) if Instant::now() >= at => Err(DecodeError::Timeout(ms)),
            _ => Ok(()),
        }
    }
}

/// Everything a finished search leaves behind: the arena, the surviving
/// complete hypotheses and the recombination alternates of every member.
#[derive(Debug)]
pub struct SearchGraph {
    arena: HypothesisArena,
    finals: Vec<(HypothesisId, f32)>,
    alternates: FxHashMap<HypothesisId, Vec<HypothesisId>>,
    stats: SentenceStats,
}

impl SearchGraph {
    pub(crate) fn new(
        arena: HypothesisArena,
        finals: Vec<(HypothesisId, f32)>,
        alternates: FxHashMap<HypothesisId, Vec<HypothesisId>>,
        stats: SentenceStats,
    ) -> Self {
        Self {
            arena,
            finals,
            alternates,
            stats,
        }
    }

    pub fn arena(&self) -> &HypothesisArena {
        &self.arena
    }

    /// Complete hypotheses that survived the last stack or the top cell, best first.
    pub fn finals(&self) -> &[(HypothesisId, f32)] {
        &self.finals
    }

    /// Recombined losers of `id`, if it absorbed any.
    pub fn alternates(&self, id: HypothesisId) -> &[HypothesisId] {
        self.alternates.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn stats(&self) -> &SentenceStats {
        &self.stats
    }

    pub fn best(&self) -> Option<Translation> {
        self.nbest(1, false, 1).into_iter().next()
    }

    /// Up to `n` translations, best first. With `distinct` set, derivations
    /// with an already-seen output are skipped, looking at no more than
    /// `n * oversample` derivations.
    pub fn nbest(&self, n: usize, distinct: bool, oversample: usize) -> Vec<Translation> {
        nbest::extract(self, n, distinct, oversample)
    }
}

/// Phrase-based 1-best translation. Empty input translates to empty output.
pub fn translate(
    source: &dyn CandidateSource,
    sentence: &Sentence,
    opts: &SearchOptions,
    hooks: &SearchHooks,
) -> Result<Translation, DecodeError> {
    if sentence.is_empty() {
        return Ok(Translation::default());
    }
    let graph = search_phrase(source, sentence, opts, hooks, 1)?;
    graph.best().ok_or(DecodeError::NoTranslation)
}

/// Phrase-based n-best translation.
pub fn translate_nbest(
    source: &dyn CandidateSource,
    sentence: &Sentence,
    n: usize,
    opts: &SearchOptions,
    hooks: &SearchHooks,
) -> Result<Vec<Translation>, DecodeError> {
    if sentence.is_empty() {
        return Ok(vec![Translation::default()]);
    }
    if n == 0 {
        return Ok(Vec::new());
    }
    let graph = search_phrase(source, sentence, opts, hooks, n)?;
    Ok(graph.nbest(n, opts.distinct_nbest, opts.nbest_oversample))
}

/// Hierarchical 1-best translation.
pub fn translate_chart(
    source: &dyn CandidateSource,
    sentence: &Sentence,
    opts: &SearchOptions,
    hooks: &SearchHooks,
) -> Result<Translation, DecodeError> {
    if sentence.is_empty() {
        return Ok(Translation::default());
    }
    let graph = search_chart(source, sentence, opts, hooks, 1)?;
    graph.best().ok_or(DecodeError::NoTranslation)
}

/// Hierarchical n-best translation.
pub fn translate_chart_nbest(
    source: &dyn CandidateSource,
    sentence: &Sentence,
    n: usize,
    opts: &SearchOptions,
    hooks: &SearchHooks,
) -> Result<Vec<Translation>, DecodeError> {
    if sentence.is_empty() {
        return Ok(vec![Translation::default()]);
    }
    if n == 0 {
        return Ok(Vec::new());
    }
    let graph = search_chart(source, sentence, opts, hooks, n)?;
    Ok(graph.nbest(n, opts.distinct_nbest, opts.nbest_oversample))
}
