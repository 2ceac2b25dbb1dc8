use std::cmp::Ordering;
use std::sync::Arc;

use tracing::trace;

use crate::source::{Span, Symbol, TargetPhrase};

use super::DecodeError;

/// One scored rule application waiting for its children.
#[derive(Debug, Clone)]
pub struct RuleOption {
    phrase: Arc<TargetPhrase>,
    children: Vec<Span>,
    own_score: f32,
    estimate: f32,
    seq: u32,
}

impl RuleOption {
    pub fn phrase(&self) -> &Arc<TargetPhrase> {
        &self.phrase
    }

    /// Source spans of the non-terminal children, in source order.
    pub fn children(&self) -> &[Span] {
        &self.children
    }

    /// Score of the rule alone.
    pub fn own_score(&self) -> f32 {
        self.own_score
    }

    /// Own score plus the best score of each child; the ranking key.
    pub fn estimate(&self) -> f32 {
        self.estimate
    }
}

/// Higher estimate first, then earlier insertion.
fn option_order(a: &RuleOption, b: &RuleOption) -> Ordering {
    b.estimate.total_cmp(&a.estimate).then(a.seq.cmp(&b.seq))
}

/// Bounded, threshold-pruned list of rule applications for one span.
#[derive(Debug, Clone)]
pub struct RuleShortlist {
    options: Vec<RuleOption>,
    rule_limit: usize,
    beam_threshold: f32,
    score_threshold: f32,
    next_seq: u32,
}

impl RuleShortlist {
    pub fn new(rule_limit: usize, beam_threshold: f32) -> Self {
        Self {
            options: Vec::new(),
            rule_limit,
            beam_threshold,
            score_threshold: f32::INFINITY,
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Current admission bar once the list is full.
    pub fn score_threshold(&self) -> f32 {
        self.score_threshold
    }

    pub fn options(&self) -> &[RuleOption] {
        &self.options
    }

    /// Offer one rule application. With `adhere_to_limit` unset every offer
    /// is kept and no size maintenance happens.
    pub fn add(
        &mut self,
        phrase: Arc<TargetPhrase>,
        children: Vec<Span>,
        own_score: f32,
        estimate: f32,
        adhere_to_limit: bool,
    ) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let option = RuleOption {
            phrase,
            children,
            own_score,
            estimate,
            seq,
        };

        if !adhere_to_limit || self.rule_limit == 0 {
            self.options.push(option);
            return;
        }
        if self.options.len() < self.rule_limit {
            if estimate < self.score_threshold {
                self.score_threshold = estimate;
            }
            self.options.push(option);
        } else if estimate > self.score_threshold {
            self.options.push(option);
            if self.options.len() > 2 * self.rule_limit {
                self.shrink_to_limit();
            }
        } else {
            trace!(estimate, threshold = self.score_threshold, "rule below shortlist threshold");
        }
    }

    fn shrink_to_limit(&mut self) {
        let limit = self.rule_limit;
        let (_, first_dropped, _) = self.options.select_nth_unstable_by(limit, option_order);
        self.score_threshold = first_dropped.estimate;
        self.options.truncate(limit);
    }

    /// Drop everything outside the beam of the best estimate, then order the
    /// rest best first. Calling it twice yields the same order.
    pub fn sort(&mut self) {
        let Some(best) = self
            .options
            .iter()
            .map(|o| o.estimate)
            .max_by(f32::total_cmp)
        else {
            return;
        };
        let threshold = best + self.beam_threshold;
        self.options.retain(|o| o.estimate >= threshold);
        self.options.sort_by(option_order);
    }

    /// Final hard cap at `rule_limit` (0 means no cap). Every surviving rule
    /// must carry exactly one child span per target non-terminal.
    pub fn create_chart_rules(&mut self, rule_limit: usize) -> Result<&[RuleOption], DecodeError> {
        if rule_limit > 0 && self.options.len() > rule_limit {
            self.options.select_nth_unstable_by(rule_limit, option_order);
            self.options.truncate(rule_limit);
            self.options.sort_by(option_order);
        }
        for o in &self.options {
            let children = o.children.len();
            let resolved = o.phrase.arity() == children
                && o.phrase.nt_positions().iter().all(|&p| {
                    matches!(o.phrase.symbols()[p], Symbol::NonTerminal(k) if k < children)
                });
            if !resolved {
                return Err(DecodeError::MalformedCandidate(format!(
                    "rule '{}' does not match its {} child spans",
                    o.phrase, children
                )));
            }
        }
        Ok(&self.options)
    }
}
