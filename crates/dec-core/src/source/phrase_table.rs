use std::fs;
use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use super::{split_entry, Candidate, CandidateSource, Sentence, Span, TableError, TargetPhrase};

/// In-memory phrase table keyed by the space-joined source phrase.
///
/// Single words with no entry get a pass-through option scored with
/// `unknown_word_score`, so every sentence has at least one monotone
/// segmentation.
#[derive(Debug, Clone)]
pub struct PhraseTable {
    pub(super) entries: FxHashMap<String, Vec<Arc<TargetPhrase>>>,
    pub(super) max_source_len: usize,
    pub(super) unknown_word_score: f32,
}

impl PhraseTable {
    pub fn new(unknown_word_score: f32) -> Self {
        Self {
            entries: FxHashMap::default(),
            max_source_len: 0,
            unknown_word_score,
        }
    }

    /// Build from `(source, [(target, score)])` pairs.
    pub fn from_entries<I>(entries: I, unknown_word_score: f32) -> Self
    where
        I: IntoIterator<Item = (String, Vec<(String, f32)>)>,
    {
        let mut table = Self::new(unknown_word_score);
        for (source, targets) in entries {
            for (target, score) in targets {
                table.insert(&source, &target, score);
            }
        }
        table
    }

    pub fn insert(&mut self, source: &str, target: &str, score: f32) {
        let key = normalize(source);
        let len = key.split(' ').count();
        self.max_source_len = self.max_source_len.max(len);
        let phrase = TargetPhrase::from_words(target.split_whitespace(), score);
        self.entries.entry(key).or_default().push(Arc::new(phrase));
    }

    /// Parse `source ||| target ||| score` lines. Blank lines and `#`
    /// comments are skipped.
    pub fn parse(text: &str, unknown_word_score: f32) -> Result<Self, TableError> {
        let mut table = Self::new(unknown_word_score);
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (source, target, score) = split_entry(line, i + 1)?;
            table.insert(source, target, score);
        }
        debug!(
            sources = table.entries.len(),
            max_source_len = table.max_source_len,
            "phrase table parsed"
        );
        Ok(table)
    }

    /// Load a text table from disk.
    pub fn load_text(path: &Path, unknown_word_score: f32) -> Result<Self, TableError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, unknown_word_score)
    }

    /// Number of distinct source phrases.
    pub fn source_count(&self) -> usize {
        self.entries.len()
    }

    /// Total number of (source, target) entries.
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn max_source_len(&self) -> usize {
        self.max_source_len
    }

    pub fn lookup(&self, source: &str) -> &[Arc<TargetPhrase>] {
        self.entries
            .get(&normalize(source))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn normalize(source: &str) -> String {
    source.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl CandidateSource for PhraseTable {
    fn candidates(&self, sentence: &Sentence, span: Span) -> Vec<Candidate> {
        if span.is_empty() || span.len() > self.max_source_len.max(1) {
            return Vec::new();
        }
        let key = sentence
            .slice(span)
            .iter()
            .map(|w| w.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        match self.entries.get(&key) {
            Some(phrases) => phrases.iter().cloned().map(Candidate::phrase).collect(),
            None if span.len() == 1 => {
                let word = Arc::clone(&sentence.words[span.start]);
                vec![Candidate::phrase(Arc::new(TargetPhrase::from_words(
                    [word],
                    self.unknown_word_score,
                )))]
            }
            None => Vec::new(),
        }
    }
}
