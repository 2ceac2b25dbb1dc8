//! Phrase-based stack decoding.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, debug_span, trace};

use crate::settings::{SearchAlgorithm, SearchOptions};
use crate::source::{CandidateSource, Sentence, Span, TargetPhrase};

use super::coverage::Coverage;
use super::cube::Cube;
use super::future::FutureScores;
use super::hypothesis::{Boundary, DerivationKind, HypothesisArena, HypothesisId, NewHypothesis};
use super::shortlist::{RuleOption, RuleShortlist};
use super::stack::HypothesisCollection;
use super::stats::SentenceStats;
use super::{Budget, DecodeError, SearchGraph, SearchHooks};

/// Sorted, capped options for every span up to the maximum phrase length.
struct OptionTable {
    max_len: usize,
    lists: Vec<Vec<RuleOption>>,
}

impl OptionTable {
    fn build(
        source: &dyn CandidateSource,
        sentence: &Sentence,
        opts: &SearchOptions,
        hooks: &SearchHooks,
    ) -> Result<Self, DecodeError> {
        let n = sentence.len();
        let max_len = opts.max_phrase_length.max(1);
        let mut lists = Vec::with_capacity(n * max_len);
        for start in 0..n {
            for len in 1..=max_len {
                let end = start + len;
                if end > n {
                    lists.push(Vec::new());
                    continue;
                }
                let span = Span::new(start, end);
                let mut shortlist = RuleShortlist::new(opts.option_limit, opts.rule_beam_threshold);
                for cand in source.candidates(sentence, span) {
                    if !cand.children.is_empty() {
                        trace!(%span, phrase = %cand.phrase, "hierarchical candidate skipped");
                        continue;
                    }
                    let own = hooks.scorer.option_score(&cand.phrase);
                    shortlist.add(cand.phrase, Vec::new(), own, own, true);
                }
                shortlist.sort();
                lists.push(shortlist.create_chart_rules(opts.option_limit)?.to_vec());
            }
        }
        Ok(Self { max_len, lists })
    }

    fn get(&self, span: Span) -> &[RuleOption] {
        if span.is_empty() || span.len() > self.max_len {
            return &[];
        }
        self.lists
            .get(span.start * self.max_len + span.len() - 1)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Reordering constraint for placing `span` after a phrase ending at `last_end`.
///
/// Filling the first gap is always allowed. Otherwise both the jump from the
/// previous phrase and the jump back to the first gap must stay within `max`.
pub(crate) fn distortion_ok(
    coverage: &Coverage,
    last_end: usize,
    span: Span,
    max: Option<usize>,
) -> bool {
    let Some(max) = max else {
        return true;
    };
    let first_gap = coverage.first_gap();
    if span.start == first_gap {
        return true;
    }
    last_end.abs_diff(span.start) <= max && span.end.abs_diff(first_gap) <= max
}

/// Spans free in `coverage`, no longer than `max_len`.
fn free_spans(coverage: &Coverage, max_len: usize) -> impl Iterator<Item = Span> + '_ {
    coverage.gaps().into_iter().flat_map(move |gap| {
        (gap.start..gap.end).flat_map(move |start| {
            (start + 1..=gap.end.min(start + max_len)).map(move |end| Span::new(start, end))
        })
    })
}

struct PhraseSearch<'a> {
    sentence_len: usize,
    opts: &'a SearchOptions,
    hooks: &'a SearchHooks,
    options: OptionTable,
    future: FutureScores,
    arena: HypothesisArena,
    stacks: Vec<HypothesisCollection>,
    created: usize,
    popped: usize,
}

impl PhraseSearch<'_> {
    /// Allocate `parent` extended by `option` over `span` and offer it to
    /// the stack matching its coverage.
    fn extend(&mut self, parent: HypothesisId, span: Span, option: &RuleOption) {
        let p = &self.arena[parent];
        let coverage = p.coverage().with(span);
        let mut inside = p.inside()
            + option.own_score()
            + self.hooks.scorer.transition_score(p.span().end, span);
        if coverage.is_complete() {
            inside += self.hooks.scorer.completion_score(span.end, self.sentence_len);
        }
        let new = NewHypothesis {
            kind: DerivationKind::Phrase,
            inside,
            estimate: self.future.estimate(&coverage),
            predecessors: vec![parent],
            span,
            boundary: p.boundary().extend(option.phrase(), self.opts.context_words),
            coverage,
            phrase: Arc::clone(option.phrase()),
        };
        let target = new.coverage.covered();
        let id = self.arena.alloc(new, self.hooks.recombination.as_ref());
        self.created += 1;
        self.stacks[target].add_prune(&self.arena[id]);
    }

    /// Expand every hypothesis of stack `i` with every admissible option.
    fn expand_normal(&mut self, i: usize) {
        for (id, _) in self.stacks[i].sorted() {
            let h = &self.arena[id];
            let coverage = h.coverage().clone();
            let last_end = h.span().end;
            for span in free_spans(&coverage, self.options.max_len).collect::<Vec<_>>() {
                if !distortion_ok(&coverage, last_end, span, self.opts.max_distortion) {
                    continue;
                }
                let options = self.options.get(span).to_vec();
                for option in &options {
                    self.extend(id, span, option);
                }
            }
        }
    }

    /// Fill stack `j` by popping combinations of (hypothesis, option) from
    /// every earlier stack, at most `pop_limit` of them.
    fn fill_cube(&mut self, j: usize, groups: &[Vec<CoverageGroup>]) {
        let mut cube = Cube::new();
        let mut edges: Vec<(Vec<HypothesisId>, Span)> = Vec::new();
        for (i, stack_groups) in groups.iter().enumerate().take(j) {
            let width = j - i;
            if width > self.options.max_len {
                continue;
            }
            for group in stack_groups {
                for span in free_spans(&group.coverage, width) {
                    if span.len() != width {
                        continue;
                    }
                    let options = self.options.get(span);
                    if options.is_empty() {
                        continue;
                    }
                    let hyps: Vec<(HypothesisId, f32)> = group
                        .hyps
                        .iter()
                        .copied()
                        .filter(|(id, _)| {
                            distortion_ok(
                                &group.coverage,
                                self.arena[*id].span().end,
                                span,
                                self.opts.max_distortion,
                            )
                        })
                        .collect();
                    if hyps.is_empty() {
                        continue;
                    }
                    let hyp_scores: Arc<[f32]> = hyps.iter().map(|(_, s)| *s).collect();
                    let option_scores: Arc<[f32]> = options.iter().map(|o| o.own_score()).collect();
                    cube.add_edge(0.0, vec![hyp_scores, option_scores]);
                    edges.push((hyps.into_iter().map(|(id, _)| id).collect(), span));
                }
            }
        }

        let limit = if self.opts.pop_limit == 0 {
            usize::MAX
        } else {
            self.opts.pop_limit
        };
        while cube.popped() < limit {
            let Some(entry) = cube.pop() else { break };
            let (hyps, span) = &edges[entry.edge];
            let parent = hyps[entry.cursors[0]];
            let span = *span;
            let option = self.options.get(span)[entry.cursors[1]].clone();
            self.extend(parent, span, &option);
        }
        self.popped += cube.popped();
        trace!(
            stack = j,
            edges = edges.len(),
            popped = cube.popped(),
            left = cube.frontier_len(),
            "cube filled"
        );
    }
}

/// Hypotheses of one stack sharing a coverage, best first.
struct CoverageGroup {
    coverage: Coverage,
    hyps: Vec<(HypothesisId, f32)>,
}

fn group_by_coverage(arena: &HypothesisArena, stack: &HypothesisCollection) -> Vec<CoverageGroup> {
    let mut index: FxHashMap<Coverage, usize> = FxHashMap::default();
    let mut groups: Vec<CoverageGroup> = Vec::new();
    for (id, score) in stack.sorted() {
        let coverage = arena[id].coverage();
        let slot = *index.entry(coverage.clone()).or_insert_with(|| {
            groups.push(CoverageGroup {
                coverage: coverage.clone(),
                hyps: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].hyps.push((id, score));
    }
    groups
}

/// Run phrase-based search and return the resulting graph.
///
/// With `nbest_size > 1` recombined losers are kept for n-best extraction.
pub fn search_phrase(
    source: &dyn CandidateSource,
    sentence: &Sentence,
    opts: &SearchOptions,
    hooks: &SearchHooks,
    nbest_size: usize,
) -> Result<SearchGraph, DecodeError> {
    let keep_alternates = nbest_size > 1;
    let n = sentence.len();
    let _span = debug_span!("search_phrase", words = n, algorithm = ?opts.algorithm).entered();
    let budget = Budget::start(&hooks.cancel, opts.timeout_ms);
    budget.check()?;

    let options = OptionTable::build(source, sentence, opts, hooks)?;
    let future = FutureScores::new(n, |span| options.get(span).first().map(|o| o.own_score()));
    let stacks = (0..=n)
        .map(|_| HypothesisCollection::new(opts.stack_size, opts.beam_width, keep_alternates))
        .collect();
    let mut search = PhraseSearch {
        sentence_len: n,
        opts,
        hooks,
        options,
        future,
        arena: HypothesisArena::new(),
        stacks,
        created: 0,
        popped: 0,
    };

    let empty = Coverage::new(n);
    let root = search.arena.alloc(
        NewHypothesis {
            kind: DerivationKind::Phrase,
            inside: 0.0,
            estimate: search.future.estimate(&empty),
            predecessors: Vec::new(),
            span: Span::new(0, 0),
            coverage: empty,
            phrase: Arc::new(TargetPhrase::empty()),
            boundary: Boundary::default(),
        },
        hooks.recombination.as_ref(),
    );
    search.created += 1;
    search.stacks[0].add(&search.arena[root]);

    match opts.algorithm {
        SearchAlgorithm::Normal => {
            for i in 0..n {
                budget.check()?;
                search.stacks[i].prune_to_size(opts.stack_size);
                debug!(stack = i, size = search.stacks[i].len(), "expanding stack");
                search.expand_normal(i);
                search.stacks[i].cleanup_alternates(nbest_size, opts.distinct_nbest);
            }
        }
        SearchAlgorithm::CubePruning => {
            let mut groups = vec![group_by_coverage(&search.arena, &search.stacks[0])];
            for j in 1..=n {
                budget.check()?;
                search.fill_cube(j, &groups);
                search.stacks[j].prune_to_size(opts.stack_size);
                search.stacks[j].cleanup_alternates(nbest_size, opts.distinct_nbest);
                debug!(stack = j, size = search.stacks[j].len(), "stack filled");
                groups.push(group_by_coverage(&search.arena, &search.stacks[j]));
            }
        }
    }

    let last = &mut search.stacks[n];
    last.prune_to_size(opts.stack_size);
    last.cleanup_alternates(nbest_size, opts.distinct_nbest);
    let finals = last.sorted();
    if finals.is_empty() {
        debug!("final stack empty");
        return Err(DecodeError::NoTranslation);
    }

    let mut stats = SentenceStats {
        created: search.created,
        popped: search.popped,
        ..Default::default()
    };
    let mut alternates = FxHashMap::default();
    for stack in &search.stacks {
        stats += stack.stats();
        alternates.extend(stack.alternates());
    }
    stats.log("phrase");

    Ok(SearchGraph::new(search.arena, finals, alternates, stats))
}
