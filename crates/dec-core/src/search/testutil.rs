use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::settings::{SearchAlgorithm, SearchOptions};
use crate::source::{Candidate, CandidateSource, Grammar, PhraseTable, Sentence, Span, TargetPhrase};

use super::coverage::Coverage;
use super::hypothesis::{
    Boundary, DerivationKind, Hypothesis, HypothesisArena, HypothesisId, NewHypothesis,
    Recombination, Signature,
};
use super::{DefaultScoreFunction, SearchHooks};

pub(crate) const PHRASES: &str = "\
das ||| the ||| -0.5
das ||| that ||| -1.0
haus ||| house ||| -0.3
ist ||| is ||| -0.2
klein ||| small ||| -0.4
klein ||| little ||| -0.9
das haus ||| the house ||| -0.6
ist klein ||| is small ||| -0.5
";

pub(crate) const RULES: &str = "\
ne [X,1] pas ||| not [X,1] ||| -0.5
[X,1] de [X,2] ||| [X,2] of [X,1] ||| -0.3
mange ||| eat ||| -0.2
mange ||| eats ||| -0.4
chat ||| cat ||| -0.1
maison ||| house ||| -0.2
";

pub(crate) fn phrase_table() -> PhraseTable {
    PhraseTable::parse(PHRASES, -100.0).unwrap()
}

pub(crate) fn grammar() -> Grammar {
    Grammar::parse(RULES, -100.0).unwrap().with_glue(-1.0)
}

/// Monotone search with generous limits.
pub(crate) fn test_opts() -> SearchOptions {
    SearchOptions {
        algorithm: SearchAlgorithm::Normal,
        stack_size: 100,
        beam_width: -10.0,
        pop_limit: 1000,
        max_distortion: Some(0),
        max_phrase_length: 7,
        context_words: 2,
        timeout_ms: 0,
        chart_stack_size: 100,
        chart_beam_width: -10.0,
        rule_limit: 100,
        rule_beam_threshold: -10.0,
        chart_pop_limit: 100,
        option_limit: 20,
        distinct_nbest: true,
        nbest_oversample: 3,
    }
}

pub(crate) fn hooks() -> SearchHooks {
    SearchHooks::new(Arc::new(DefaultScoreFunction::new(0.0)))
}

pub(crate) fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "expected {expected}, got {actual}"
    );
}

/// Hand-built candidates per span, returned as given.
#[derive(Default)]
pub(crate) struct FixedSource {
    spans: FxHashMap<Span, Vec<Candidate>>,
}

impl FixedSource {
    pub(crate) fn word(&mut self, span: Span, word: &str, score: f32) -> &mut Self {
        self.spans
            .entry(span)
            .or_default()
            .push(Candidate::phrase(Arc::new(TargetPhrase::from_words([word], score))));
        self
    }

    pub(crate) fn rule(&mut self, span: Span, phrase: TargetPhrase, children: Vec<Span>) -> &mut Self {
        self.spans.entry(span).or_default().push(Candidate {
            phrase: Arc::new(phrase),
            children,
        });
        self
    }
}

impl CandidateSource for FixedSource {
    fn candidates(&self, _sentence: &Sentence, span: Span) -> Vec<Candidate> {
        self.spans.get(&span).cloned().unwrap_or_default()
    }
}

/// Signature from the phrase words alone, so tests control collisions.
pub(crate) struct WordKey;

impl Recombination for WordKey {
    fn signature(&self, hypo: &Hypothesis) -> Signature {
        let words: Vec<_> = hypo.phrase().words().cloned().collect();
        Signature::new().words(&words)
    }
}

/// Allocate a phrase node with the given score whose signature is `key`.
pub(crate) fn keyed_node(arena: &mut HypothesisArena, score: f32, key: &str) -> HypothesisId {
    arena.alloc(
        NewHypothesis {
            kind: DerivationKind::Phrase,
            inside: score,
            estimate: 0.0,
            predecessors: Vec::new(),
            span: Span::new(0, 1),
            coverage: Coverage::new(1),
            phrase: Arc::new(TargetPhrase::from_words([key], 0.0)),
            boundary: Boundary::default(),
        },
        &WordKey,
    )
}
