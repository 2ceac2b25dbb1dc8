//! Lazy k-best extraction over the recombination graph.
//!
//! A surviving node and the alternates it absorbed form a class: any member
//! can stand in for the node wherever it was used as a predecessor. A
//! derivation of a class picks one member plus a rank into the k-best list
//! of each of that member's predecessors. Successor derivations bump one
//! rank at a time, so lists are only computed as deep as they are read.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::source::{Span, Symbol};

use super::hypothesis::{DerivationKind, HypothesisId};
use super::SearchGraph;

/// Source span and the target words it produced directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub span: Span,
    pub target: Vec<Arc<str>>,
}

/// One complete output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Translation {
    pub words: Vec<Arc<str>>,
    pub score: f32,
    /// Phrase mode: applied phrases in target order. Chart mode: rule
    /// applications in pre-order, with their terminal words.
    pub segments: Vec<Segment>,
}

impl Translation {
    pub fn text(&self) -> String {
        self.words.join(" ")
    }
}

impl fmt::Display for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

#[derive(Debug, Clone)]
struct Derivation {
    edge: HypothesisId,
    ranks: Vec<usize>,
    score: f32,
}

impl PartialEq for Derivation {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Derivation {}

impl Ord for Derivation {
    /// Greater is better: higher score, then older edge, then smaller ranks.
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.edge.cmp(&self.edge))
            .then_with(|| other.ranks.cmp(&self.ranks))
    }
}

impl PartialOrd for Derivation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct ClassState {
    candidates: BinaryHeap<Derivation>,
    seen: FxHashSet<(HypothesisId, Vec<usize>)>,
    found: Vec<Derivation>,
    expand_last: bool,
}

struct KBest<'g> {
    graph: &'g SearchGraph,
    classes: FxHashMap<HypothesisId, ClassState>,
}

impl<'g> KBest<'g> {
    fn new(graph: &'g SearchGraph) -> Self {
        Self {
            graph,
            classes: FxHashMap::default(),
        }
    }

    fn init(&mut self, class: HypothesisId) {
        let graph = self.graph;
        let mut state = ClassState::default();
        for member in std::iter::once(class).chain(graph.alternates(class).iter().copied()) {
            let h = &graph.arena()[member];
            let ranks = vec![0; h.predecessors().len()];
            state.seen.insert((member, ranks.clone()));
            state.candidates.push(Derivation {
                edge: member,
                ranks,
                score: h.inside(),
            });
        }
        self.classes.insert(class, state);
    }

    /// Score of the `k`-th best derivation of `class`, computing it if needed.
    fn score(&mut self, class: HypothesisId, k: usize) -> Option<f32> {
        self.fill(class, k);
        self.classes.get(&class)?.found.get(k).map(|d| d.score)
    }

    fn fill(&mut self, class: HypothesisId, k: usize) {
        if !self.classes.contains_key(&class) {
            self.init(class);
        }
        loop {
            let Some(state) = self.classes.get_mut(&class) else {
                return;
            };
            if state.found.len() > k {
                return;
            }
            if state.expand_last {
                state.expand_last = false;
                if let Some(last) = state.found.last().cloned() {
                    self.push_successors(class, &last);
                }
            }
            let Some(state) = self.classes.get_mut(&class) else {
                return;
            };
            match state.candidates.pop() {
                Some(d) => {
                    state.found.push(d);
                    state.expand_last = true;
                }
                None => return,
            }
        }
    }

    fn push_successors(&mut self, class: HypothesisId, d: &Derivation) {
        let graph = self.graph;
        let preds = graph.arena()[d.edge].predecessors();
        for (slot, &pred) in preds.iter().enumerate() {
            let rank = d.ranks[slot];
            let (Some(current), Some(next)) = (self.score(pred, rank), self.score(pred, rank + 1))
            else {
                continue;
            };
            let mut ranks = d.ranks.clone();
            ranks[slot] = rank + 1;
            let Some(state) = self.classes.get_mut(&class) else {
                return;
            };
            if state.seen.insert((d.edge, ranks.clone())) {
                state.candidates.push(Derivation {
                    edge: d.edge,
                    ranks,
                    score: d.score - current + next,
                });
            }
        }
    }

    /// Assemble the output of the `k`-th derivation of `class`. Predecessor
    /// lists are filled on the way down.
    fn build(&mut self, class: HypothesisId, k: usize, out: &mut Translation) {
        self.fill(class, k);
        let Some(d) = self.classes.get(&class).and_then(|s| s.found.get(k)).cloned() else {
            return;
        };
        let graph = self.graph;
        let h = &graph.arena()[d.edge];
        let preds = h.predecessors();
        match h.kind() {
            DerivationKind::Phrase => {
                if let Some(&parent) = preds.first() {
                    self.build(parent, d.ranks[0], out);
                }
                if !h.span().is_empty() {
                    let target: Vec<_> = h.phrase().words().cloned().collect();
                    out.words.extend(target.iter().cloned());
                    out.segments.push(Segment {
                        span: h.span(),
                        target,
                    });
                }
            }
            DerivationKind::Chart => {
                out.segments.push(Segment {
                    span: h.span(),
                    target: h.phrase().words().cloned().collect(),
                });
                for sym in h.phrase().symbols() {
                    match sym {
                        Symbol::Word(w) => out.words.push(Arc::clone(w)),
                        Symbol::NonTerminal(i) => {
                            if let Some(&child) = preds.get(*i) {
                                self.build(child, d.ranks[*i], out);
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Merge the k-best lists of every final hypothesis, best first.
pub(crate) fn extract(
    graph: &SearchGraph,
    n: usize,
    distinct: bool,
    oversample: usize,
) -> Vec<Translation> {
    if n == 0 {
        return Vec::new();
    }
    let budget = if distinct { n * oversample.max(1) } else { n };
    let mut kbest = KBest::new(graph);
    let mut frontier = BinaryHeap::new();
    for &(id, _) in graph.finals() {
        if let Some(score) = kbest.score(id, 0) {
            frontier.push(Derivation {
                edge: id,
                ranks: vec![0],
                score,
            });
        }
    }

    let mut out = Vec::new();
    let mut seen_outputs: FxHashSet<Vec<Arc<str>>> = FxHashSet::default();
    let mut tried = 0;
    while out.len() < n && tried < budget {
        let Some(d) = frontier.pop() else { break };
        tried += 1;
        let rank = d.ranks[0];
        let mut t = Translation {
            score: d.score,
            ..Default::default()
        };
        kbest.build(d.edge, rank, &mut t);
        if !distinct || seen_outputs.insert(t.words.clone()) {
            out.push(t);
        }
        if let Some(score) = kbest.score(d.edge, rank + 1) {
            frontier.push(Derivation {
                edge: d.edge,
                ranks: vec![rank + 1],
                score,
            });
        }
    }
    out
}
