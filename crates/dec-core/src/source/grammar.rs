use std::fs;
use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use super::{split_entry, Candidate, CandidateSource, Sentence, Span, Symbol, TableError, TargetPhrase};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SourceSymbol {
    Word(Arc<str>),
    Gap,
}

#[derive(Debug, Clone)]
struct GrammarRule {
    source: Vec<SourceSymbol>,
    target: Arc<TargetPhrase>,
}

impl GrammarRule {
    fn is_lexical(&self) -> bool {
        self.source.iter().all(|s| matches!(s, SourceSymbol::Word(_)))
    }
}

/// Synchronous CFG with a single non-terminal label, written `[X,k]`.
///
/// ```text
/// ne [X,1] pas ||| not [X,1] ||| -0.7
/// [X,1] de [X,2] ||| [X,2] of [X,1] ||| -1.2
/// ```
///
/// Source-side non-terminals are numbered left to right starting at 1; the
/// target side may reorder them but must use each exactly once.
#[derive(Debug, Clone)]
pub struct Grammar {
    rules: Vec<GrammarRule>,
    by_first_word: FxHashMap<Arc<str>, Vec<usize>>,
    gap_initial: Vec<usize>,
    glue: Option<Arc<TargetPhrase>>,
    unknown_word_score: f32,
}

impl Grammar {
    pub fn new(unknown_word_score: f32) -> Self {
        Self {
            rules: Vec::new(),
            by_first_word: FxHashMap::default(),
            gap_initial: Vec::new(),
            glue: None,
            unknown_word_score,
        }
    }

    /// Enable the monotone glue rule `X -> X1 X2` with the given score.
    pub fn with_glue(mut self, glue_score: f32) -> Self {
        self.glue = Some(Arc::new(TargetPhrase::new(
            vec![Symbol::NonTerminal(0), Symbol::NonTerminal(1)],
            glue_score,
        )));
        self
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn parse(text: &str, unknown_word_score: f32) -> Result<Self, TableError> {
        let mut grammar = Self::new(unknown_word_score);
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (source, target, score) = split_entry(line, i + 1)?;
            grammar.add_rule(source, target, score, i + 1)?;
        }
        debug!(rules = grammar.rules.len(), "grammar parsed");
        Ok(grammar)
    }

    pub fn load_text(path: &Path, unknown_word_score: f32) -> Result<Self, TableError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, unknown_word_score)
    }

    fn add_rule(
        &mut self,
        source: &str,
        target: &str,
        score: f32,
        line: usize,
    ) -> Result<(), TableError> {
        let parse_err = |reason: String| TableError::Parse { line, reason };

        let mut pattern = Vec::new();
        let mut arity = 0;
        for token in source.split_whitespace() {
            match nonterminal_index(token) {
                Some(k) => {
                    if k != arity + 1 {
                        return Err(parse_err(format!(
                            "source non-terminals must be numbered in order, found [X,{k}] after {arity}"
                        )));
                    }
                    arity += 1;
                    pattern.push(SourceSymbol::Gap);
                }
                None => pattern.push(SourceSymbol::Word(Arc::from(token))),
            }
        }
        if pattern.len() == 1 && pattern[0] == SourceSymbol::Gap {
            return Err(parse_err("unary non-terminal rules are not supported".into()));
        }

        let mut symbols = Vec::new();
        let mut used = vec![false; arity];
        for token in target.split_whitespace() {
            match nonterminal_index(token) {
                Some(k) if (1..=arity).contains(&k) => {
                    if used[k - 1] {
                        return Err(parse_err(format!("[X,{k}] used twice on target side")));
                    }
                    used[k - 1] = true;
                    symbols.push(Symbol::NonTerminal(k - 1));
                }
                Some(k) => {
                    return Err(parse_err(format!(
                        "target references [X,{k}] but source has {arity} non-terminals"
                    )));
                }
                None => symbols.push(Symbol::Word(Arc::from(token))),
            }
        }
        if let Some(k) = used.iter().position(|u| !u) {
            return Err(parse_err(format!("[X,{}] missing on target side", k + 1)));
        }

        let idx = self.rules.len();
        match &pattern[0] {
            SourceSymbol::Word(w) => self.by_first_word.entry(Arc::clone(w)).or_default().push(idx),
            SourceSymbol::Gap => self.gap_initial.push(idx),
        }
        self.rules.push(GrammarRule {
            source: pattern,
            target: Arc::new(TargetPhrase::new(symbols, score)),
        });
        Ok(())
    }
}

/// `[X,3]` -> `Some(3)`
fn nonterminal_index(token: &str) -> Option<usize> {
    token
        .strip_prefix("[X,")
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|k| k.parse().ok())
}

/// Enumerate every way `pattern` covers `words[pos..end]`, each gap taking at
/// least one word. Completed child-span lists are pushed to `out`.
fn match_pattern(
    pattern: &[SourceSymbol],
    words: &[Arc<str>],
    pos: usize,
    end: usize,
    children: &mut Vec<Span>,
    out: &mut Vec<Vec<Span>>,
) {
    let Some((first, rest)) = pattern.split_first() else {
        if pos == end {
            out.push(children.clone());
        }
        return;
    };
    // each remaining symbol needs at least one word
    if end - pos < pattern.len() {
        return;
    }
    match first {
        SourceSymbol::Word(w) => {
            if words[pos] == *w {
                match_pattern(rest, words, pos + 1, end, children, out);
            }
        }
        SourceSymbol::Gap => {
            for gap_end in pos + 1..=end - rest.len() {
                children.push(Span::new(pos, gap_end));
                match_pattern(rest, words, gap_end, end, children, out);
                children.pop();
            }
        }
    }
}

impl CandidateSource for Grammar {
    fn candidates(&self, sentence: &Sentence, span: Span) -> Vec<Candidate> {
        if span.is_empty() {
            return Vec::new();
        }
        let mut result = Vec::new();
        let mut has_lexical = false;

        let first = &sentence.words[span.start];
        let bucket = self.by_first_word.get(first).map(Vec::as_slice).unwrap_or(&[]);
        for &idx in bucket.iter().chain(self.gap_initial.iter()) {
            let rule = &self.rules[idx];
            let mut matches = Vec::new();
            match_pattern(
                &rule.source,
                &sentence.words,
                span.start,
                span.end,
                &mut Vec::new(),
                &mut matches,
            );
            if !matches.is_empty() && rule.is_lexical() {
                has_lexical = true;
            }
            for children in matches {
                result.push(Candidate {
                    phrase: Arc::clone(&rule.target),
                    children,
                });
            }
        }

        if span.len() == 1 && !has_lexical {
            result.push(Candidate::phrase(Arc::new(TargetPhrase::from_words(
                [Arc::clone(first)],
                self.unknown_word_score,
            ))));
        }

        if let Some(glue) = &self.glue {
            for split in span.start + 1..span.end {
                result.push(Candidate {
                    phrase: Arc::clone(glue),
                    children: vec![Span::new(span.start, split), Span::new(split, span.end)],
                });
            }
        }
        result
    }
}
