//! Bottom-up chart decoding with cube pruning per cell.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, debug_span, trace};

use crate::settings::SearchOptions;
use crate::source::{Candidate, CandidateSource, Sentence, Span};

use super::coverage::Coverage;
use super::cube::Cube;
use super::hypothesis::{Boundary, DerivationKind, HypothesisArena, HypothesisId, NewHypothesis};
use super::shortlist::RuleShortlist;
use super::stack::HypothesisCollection;
use super::stats::SentenceStats;
use super::{Budget, DecodeError, SearchGraph, SearchHooks};

/// Finished contents of one span.
struct Cell {
    sorted: Vec<(HypothesisId, f32)>,
    scores: Arc<[f32]>,
}

struct Chart {
    len: usize,
    cells: Vec<Option<Cell>>,
}

impl Chart {
    fn new(len: usize) -> Self {
        Self {
            len,
            cells: (0..len * len).map(|_| None).collect(),
        }
    }

    fn idx(&self, span: Span) -> usize {
        span.start * self.len + span.len() - 1
    }

    fn get(&self, span: Span) -> Option<&Cell> {
        if span.is_empty() {
            return None;
        }
        self.cells.get(self.idx(span)).and_then(Option::as_ref)
    }

    fn set(&mut self, span: Span, cell: Cell) {
        let i = self.idx(span);
        self.cells[i] = Some(cell);
    }
}

/// Child spans must be non-empty, inside `span`, in source order and
/// non-overlapping. A single child covering the whole span is rejected too.
fn check_children(cand: &Candidate, span: Span) -> Result<(), DecodeError> {
    let mut pos = span.start;
    for child in &cand.children {
        if child.is_empty() || child.start < pos || child.end > span.end {
            return Err(DecodeError::MalformedCandidate(format!(
                "rule '{}' at {span} has child {child} out of order or outside the span",
                cand.phrase
            )));
        }
        pos = child.end;
    }
    if cand.children.len() == 1 && cand.children[0] == span {
        return Err(DecodeError::MalformedCandidate(format!(
            "rule '{}' at {span} rewrites the span to itself",
            cand.phrase
        )));
    }
    Ok(())
}

/// Run chart search and return the resulting graph.
///
/// With `nbest_size > 1` recombined losers are kept for n-best extraction.
pub fn search_chart(
    source: &dyn CandidateSource,
    sentence: &Sentence,
    opts: &SearchOptions,
    hooks: &SearchHooks,
    nbest_size: usize,
) -> Result<SearchGraph, DecodeError> {
    let keep_alternates = nbest_size > 1;
    let n = sentence.len();
    let _span = debug_span!("search_chart", words = n).entered();
    let budget = Budget::start(&hooks.cancel, opts.timeout_ms);
    budget.check()?;

    let mut arena = HypothesisArena::new();
    let mut chart = Chart::new(n);
    let mut stats = SentenceStats::default();
    let mut alternates = FxHashMap::default();
    let pop_limit = if opts.chart_pop_limit == 0 {
        usize::MAX
    } else {
        opts.chart_pop_limit
    };

    for width in 1..=n {
        for start in 0..=n - width {
            budget.check()?;
            let span = Span::new(start, start + width);

            let mut shortlist = RuleShortlist::new(opts.rule_limit, opts.rule_beam_threshold);
            for cand in source.candidates(sentence, span) {
                check_children(&cand, span)?;
                let mut estimate = hooks.scorer.option_score(&cand.phrase);
                let own = estimate;
                let mut starved = false;
                for child in &cand.children {
                    match chart.get(*child).and_then(|c| c.scores.first()) {
                        Some(best) => estimate += best,
                        None => {
                            starved = true;
                            break;
                        }
                    }
                }
                if starved {
                    trace!(%span, rule = %cand.phrase, "starved rule skipped");
                    continue;
                }
                shortlist.add(cand.phrase, cand.children, own, estimate, true);
            }
            shortlist.sort();
            let rules = shortlist.create_chart_rules(opts.rule_limit)?;

            let mut cube = Cube::new();
            for rule in rules {
                let dims = rule
                    .children()
                    .iter()
                    .map(|c| {
                        chart
                            .get(*c)
                            .map(|cell| Arc::clone(&cell.scores))
                            .unwrap_or_else(|| Arc::from([]))
                    })
                    .collect();
                cube.add_edge(rule.own_score(), dims);
            }

            let mut coll = HypothesisCollection::new(
                opts.chart_stack_size,
                opts.chart_beam_width,
                keep_alternates,
            );
            while cube.popped() < pop_limit {
                let Some(entry) = cube.pop() else { break };
                let rule = &rules[entry.edge];
                let mut children = Vec::with_capacity(rule.children().len());
                let mut inside = rule.own_score();
                for (child_span, &cursor) in rule.children().iter().zip(&entry.cursors) {
                    if let Some(cell) = chart.get(*child_span) {
                        let (id, _) = cell.sorted[cursor];
                        inside += arena[id].inside();
                        children.push(id);
                    }
                }
                let boundary = {
                    let bounds: Vec<&Boundary> =
                        children.iter().map(|id| arena[*id].boundary()).collect();
                    Boundary::substitute(rule.phrase(), &bounds, opts.context_words)
                };
                let id = arena.alloc(
                    NewHypothesis {
                        kind: DerivationKind::Chart,
                        inside,
                        estimate: 0.0,
                        predecessors: children,
                        span,
                        coverage: Coverage::of_span(n, span),
                        phrase: Arc::clone(rule.phrase()),
                        boundary,
                    },
                    hooks.recombination.as_ref(),
                );
                stats.created += 1;
                coll.add_prune(&arena[id]);
            }
            stats.popped += cube.popped();
            trace!(%span, popped = cube.popped(), left = cube.frontier_len(), "cube drained");

            coll.prune_to_size(opts.chart_stack_size);
            coll.cleanup_alternates(nbest_size, opts.distinct_nbest);
            stats += coll.stats();
            alternates.extend(coll.alternates());
            let sorted = coll.sorted();
            trace!(%span, rules = rules.len(), size = sorted.len(), "cell finished");
            let scores = sorted.iter().map(|(_, s)| *s).collect();
            chart.set(span, Cell { sorted, scores });
        }
        debug!(width, "chart row finished");
    }

    let finals = chart
        .get(Span::new(0, n))
        .map(|c| c.sorted.clone())
        .unwrap_or_default();
    if finals.is_empty() {
        debug!("top cell empty");
        return Err(DecodeError::NoTranslation);
    }
    stats.log("chart");
    Ok(SearchGraph::new(arena, finals, alternates, stats))
}
