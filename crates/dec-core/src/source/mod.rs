//! Candidate sources: where translation options come from.
//!
//! The search consumes a [`CandidateSource`] and nothing else about the
//! translation model. `PhraseTable` serves contiguous phrases for
//! phrase-based decoding; `Grammar` serves synchronous CFG rules with
//! non-terminal child spans for chart decoding.

mod grammar;
mod phrase_table;
mod phrase_table_io;

pub use grammar::Grammar;
pub use phrase_table::PhraseTable;

use std::fmt;
use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Half-open range of source positions `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} past end {end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A tokenized input sentence.
#[derive(Debug, Clone, Default)]
pub struct Sentence {
    pub words: Vec<Arc<str>>,
}

impl Sentence {
    /// Whitespace tokenization.
    pub fn parse(line: &str) -> Self {
        Self {
            words: line.split_whitespace().map(Arc::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn slice(&self, span: Span) -> &[Arc<str>] {
        &self.words[span.start..span.end]
    }
}

/// One symbol on the target side of a phrase or rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Symbol {
    Word(Arc<str>),
    /// Placeholder for the k-th child (0-based, source order).
    NonTerminal(usize),
}

/// Target side of a translation option with its own model score.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPhrase {
    symbols: Vec<Symbol>,
    score: f32,
    /// Positions in `symbols` holding non-terminals, built once per phrase.
    nt_positions: Vec<usize>,
}

impl TargetPhrase {
    pub fn new(symbols: Vec<Symbol>, score: f32) -> Self {
        let nt_positions = symbols
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Symbol::NonTerminal(_)))
            .map(|(i, _)| i)
            .collect();
        Self {
            symbols,
            score,
            nt_positions,
        }
    }

    /// A phrase made only of target words.
    pub fn from_words<I, S>(words: I, score: f32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self::new(
            words.into_iter().map(|w| Symbol::Word(w.into())).collect(),
            score,
        )
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 0.0)
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn nt_positions(&self) -> &[usize] {
        &self.nt_positions
    }

    pub fn arity(&self) -> usize {
        self.nt_positions.len()
    }

    /// Terminal words in order, skipping non-terminals.
    pub fn words(&self) -> impl Iterator<Item = &Arc<str>> {
        self.symbols.iter().filter_map(|s| match s {
            Symbol::Word(w) => Some(w),
            Symbol::NonTerminal(_) => None,
        })
    }
}

impl fmt::Display for TargetPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, sym) in self.symbols.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match sym {
                Symbol::Word(w) => f.write_str(w)?,
                Symbol::NonTerminal(k) => write!(f, "[X,{}]", k + 1)?,
            }
        }
        Ok(())
    }
}

/// A translation option for one span: target side plus the source spans of
/// its non-terminal children (empty for plain phrases).
#[derive(Debug, Clone)]
pub struct Candidate {
    pub phrase: Arc<TargetPhrase>,
    pub children: Vec<Span>,
}

impl Candidate {
    pub fn phrase(phrase: Arc<TargetPhrase>) -> Self {
        Self {
            phrase,
            children: Vec::new(),
        }
    }
}

/// Provider of translation options. Must be idempotent for a given span.
pub trait CandidateSource: Send + Sync {
    fn candidates(&self, sentence: &Sentence, span: Span) -> Vec<Candidate>;
}

/// Errors from loading or saving phrase tables and grammars.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("invalid header (too short)")]
    InvalidHeader,

    #[error("invalid magic bytes (expected DCPT)")]
    InvalidMagic,

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("checksum mismatch: expected {expected:08x}, found {actual:08x}")]
    Checksum { expected: u32, actual: u32 },

    #[error("serialization error: {0}")]
    Serialize(bincode::Error),

    #[error("deserialization error: {0}")]
    Deserialize(bincode::Error),
}

/// Split a `source ||| target ||| score` line into its three fields.
pub(crate) fn split_entry(line: &str, line_no: usize) -> Result<(&str, &str, f32), TableError> {
    let fields: Vec<&str> = line.split("|||").map(str::trim).collect();
    if fields.len() != 3 {
        return Err(TableError::Parse {
            line: line_no,
            reason: format!("expected 3 fields separated by |||, found {}", fields.len()),
        });
    }
    let score: f32 = fields[2].parse().map_err(|_| TableError::Parse {
        line: line_no,
        reason: format!("invalid score {:?}", fields[2]),
    })?;
    if !score.is_finite() {
        return Err(TableError::Parse {
            line: line_no,
            reason: "score must be finite".to_string(),
        });
    }
    if fields[0].is_empty() {
        return Err(TableError::Parse {
            line: line_no,
            reason: "empty source side".to_string(),
        });
    }
    Ok((fields[0], fields[1], score))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nt_positions_built_once() {
        let phrase = TargetPhrase::new(
            vec![
                Symbol::NonTerminal(1),
                Symbol::Word("of".into()),
                Symbol::NonTerminal(0),
            ],
            -1.0,
        );
        assert_eq!(phrase.nt_positions(), &[0, 2]);
        assert_eq!(phrase.arity(), 2);
        assert_eq!(phrase.words().count(), 1);
        assert_eq!(phrase.to_string(), "[X,2] of [X,1]");
    }

    #[test]
    fn split_entry_fields() {
        let (src, tgt, score) = split_entry("das haus ||| the house ||| -1.5", 1).unwrap();
        assert_eq!(src, "das haus");
        assert_eq!(tgt, "the house");
        assert!((score + 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn split_entry_errors() {
        let err = split_entry("das haus ||| the house", 7).unwrap_err();
        assert!(err.to_string().starts_with("line 7"));
        let err = split_entry("a ||| b ||| nope", 2).unwrap_err();
        assert!(err.to_string().contains("invalid score"));
        let err = split_entry(" ||| b ||| 0", 3).unwrap_err();
        assert!(err.to_string().contains("empty source"));
    }

    #[test]
    fn sentence_parse() {
        let s = Sentence::parse("  das  ist ein haus ");
        assert_eq!(s.len(), 4);
        assert_eq!(&*s.slice(Span::new(1, 3))[1], "ein");
    }
}
