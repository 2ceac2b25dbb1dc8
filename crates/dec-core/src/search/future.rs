use crate::source::Span;

use super::coverage::Coverage;

/// Optimistic score for translating any span of the input, used to rank
/// hypotheses that cover different parts of the sentence.
#[derive(Debug, Clone)]
pub struct FutureScores {
    len: usize,
    table: Vec<f32>,
}

impl FutureScores {
    /// `direct(span)` is the best single option score for `span`, if any.
    /// Longer spans also consider every split into two cheaper halves.
    pub fn new<F>(len: usize, mut direct: F) -> Self
    where
        F: FnMut(Span) -> Option<f32>,
    {
        let mut fs = Self {
            len,
            table: vec![f32::NEG_INFINITY; (len + 1) * (len + 1)],
        };
        for width in 1..=len {
            for start in 0..=len - width {
                let end = start + width;
                let mut best = direct(Span::new(start, end)).unwrap_or(f32::NEG_INFINITY);
                for mid in start + 1..end {
                    let split = fs.table[fs.idx(start, mid)] + fs.table[fs.idx(mid, end)];
                    if split > best {
                        best = split;
                    }
                }
                let i = fs.idx(start, end);
                fs.table[i] = best;
            }
        }
        fs
    }

    fn idx(&self, start: usize, end: usize) -> usize {
        start * (self.len + 1) + end
    }

    pub fn span(&self, span: Span) -> f32 {
        if span.is_empty() {
            0.0
        } else {
            self.table[self.idx(span.start, span.end)]
        }
    }

    /// Sum of the span estimates of every uncovered run.
    pub fn estimate(&self, coverage: &Coverage) -> f32 {
        coverage.gaps().into_iter().map(|g| self.span(g)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_beat_poor_direct_options() {
        // single words -1 each; the two-word span has a direct option of -5
        let fs = FutureScores::new(3, |s| match s.len() {
            1 => Some(-1.0),
            2 if s.start == 0 => Some(-5.0),
            3 => Some(-2.5),
            _ => None,
        });
        assert_eq!(fs.span(Span::new(0, 2)), -2.0);
        assert_eq!(fs.span(Span::new(1, 3)), -2.0);
        assert_eq!(fs.span(Span::new(0, 3)), -2.5);
    }

    #[test]
    fn estimate_sums_gaps() {
        let fs = FutureScores::new(4, |s| (s.len() == 1).then_some(-1.0));
        let c = Coverage::new(4).with(Span::new(1, 2));
        assert_eq!(fs.estimate(&c), -3.0);
        assert_eq!(fs.estimate(&Coverage::of_span(4, Span::new(0, 4))), 0.0);
    }

    #[test]
    fn untranslatable_span_is_negative_infinity() {
        let fs = FutureScores::new(2, |_| None);
        assert_eq!(fs.span(Span::new(0, 2)), f32::NEG_INFINITY);
    }
}
