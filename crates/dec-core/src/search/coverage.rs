use std::fmt;

use crate::source::Span;

/// Fixed-length bitset of source positions already translated.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Coverage {
    blocks: Vec<u64>,
    len: usize,
    covered: usize,
}

impl Coverage {
    pub fn new(len: usize) -> Self {
        Self {
            blocks: vec![0; len.div_ceil(64)],
            len,
            covered: 0,
        }
    }

    /// Coverage with exactly `span` set.
    pub fn of_span(len: usize, span: Span) -> Self {
        let mut c = Self::new(len);
        c.set(span);
        c
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn covered(&self) -> usize {
        self.covered
    }

    pub fn is_complete(&self) -> bool {
        self.covered == self.len
    }

    pub fn get(&self, pos: usize) -> bool {
        self.blocks[pos / 64] & (1 << (pos % 64)) != 0
    }

    /// True when no position of `span` is covered yet.
    pub fn is_free(&self, span: Span) -> bool {
        (span.start..span.end).all(|p| !self.get(p))
    }

    /// Union with `span`. Every position in `span` must be free.
    pub fn with(&self, span: Span) -> Self {
        let mut c = self.clone();
        c.set(span);
        c
    }

    fn set(&mut self, span: Span) {
        for p in span.start..span.end {
            debug_assert!(!self.get(p), "position {p} already covered");
            self.blocks[p / 64] |= 1 << (p % 64);
        }
        self.covered += span.len();
    }

    /// First uncovered position, or `len` when complete.
    pub fn first_gap(&self) -> usize {
        (0..self.len).find(|&p| !self.get(p)).unwrap_or(self.len)
    }

    /// Maximal runs of uncovered positions, left to right.
    pub fn gaps(&self) -> Vec<Span> {
        let mut gaps = Vec::new();
        let mut start = None;
        for p in 0..self.len {
            match (self.get(p), start) {
                (false, None) => start = Some(p),
                (true, Some(s)) => {
                    gaps.push(Span::new(s, p));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            gaps.push(Span::new(s, self.len));
        }
        gaps
    }
}

impl fmt::Debug for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in 0..self.len {
            f.write_str(if self.get(p) { "1" } else { "0" })?;
        }
        Ok(())
    }
}
