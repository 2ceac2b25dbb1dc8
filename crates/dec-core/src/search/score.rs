use crate::source::{Span, TargetPhrase};

/// Supplies the numbers the phrase-based search adds up. Higher is better.
///
/// The search never looks inside these values; it only sums and compares
/// them, so any model combination can sit behind this trait.
pub trait ScoreFunction: Send + Sync {
    fn option_score(&self, phrase: &TargetPhrase) -> f32;
    /// Score for jumping from the end of the previous phrase to `next`.
    fn transition_score(&self, last_end: usize, next: Span) -> f32;
    /// Score added once the whole input is covered.
    fn completion_score(&self, last_end: usize, input_len: usize) -> f32;
}

/// Phrase scores as given, plus a linear distortion penalty.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultScoreFunction {
    distortion_weight: f32,
}

impl DefaultScoreFunction {
    pub fn new(distortion_weight: f32) -> Self {
        Self { distortion_weight }
    }
}

impl ScoreFunction for DefaultScoreFunction {
    fn option_score(&self, phrase: &TargetPhrase) -> f32 {
        phrase.score()
    }

    fn transition_score(&self, last_end: usize, next: Span) -> f32 {
        -self.distortion_weight * last_end.abs_diff(next.start) as f32
    }

    fn completion_score(&self, last_end: usize, input_len: usize) -> f32 {
        -self.distortion_weight * last_end.abs_diff(input_len) as f32
    }
}
