//! Derivation nodes and the per-decode arena that owns them.
//!
//! Nodes are immutable once allocated. Back-pointers are [`HypothesisId`]s
//! into the arena, so clearing a stack never leaves a dangling parent.

use std::cmp::Ordering;
use std::ops::Index;
use std::sync::Arc;

use crate::source::{Span, Symbol, TargetPhrase};

use super::coverage::Coverage;

/// Index into a [`HypothesisArena`]; ids grow in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HypothesisId(u32);

impl HypothesisId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a node was built, which decides how its output is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationKind {
    /// Parent output followed by this node's phrase.
    Phrase,
    /// Rule target with non-terminals replaced by the children's outputs.
    Chart,
}

/// Leading and trailing target words of a node's output, at most `k` each.
///
/// While the output is shorter than `k` words, `left == right == output`
/// and `complete` is false.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Boundary {
    left: Vec<Arc<str>>,
    right: Vec<Arc<str>>,
    complete: bool,
}

impl Boundary {
    pub fn left(&self) -> &[Arc<str>] {
        &self.left
    }

    pub fn right(&self) -> &[Arc<str>] {
        &self.right
    }

    fn push_word(&mut self, word: &Arc<str>, k: usize) {
        if k == 0 {
            return;
        }
        if self.complete {
            self.right.push(Arc::clone(word));
            if self.right.len() > k {
                self.right.remove(0);
            }
        } else {
            self.left.push(Arc::clone(word));
            self.right.push(Arc::clone(word));
            if self.left.len() >= k {
                self.complete = true;
            }
        }
    }

    fn push_boundary(&mut self, other: &Boundary, k: usize) {
        for w in &other.left {
            self.push_word(w, k);
        }
        if other.complete {
            self.right = other.right.clone();
        }
    }

    /// Boundary after appending `phrase`'s words to `self`'s output.
    pub fn extend(&self, phrase: &TargetPhrase, k: usize) -> Self {
        let mut b = self.clone();
        for w in phrase.words() {
            b.push_word(w, k);
        }
        b
    }

    /// Boundary of `phrase` with each non-terminal replaced by the matching child.
    pub fn substitute(phrase: &TargetPhrase, children: &[&Boundary], k: usize) -> Self {
        let mut b = Boundary::default();
        for sym in phrase.symbols() {
            match sym {
                Symbol::Word(w) => b.push_word(w, k),
                Symbol::NonTerminal(i) => b.push_boundary(children[*i], k),
            }
        }
        b
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum StateAtom {
    Coverage(Coverage),
    Position(usize),
    Word(Arc<str>),
    Separator,
}

/// Recombination key: two nodes with equal signatures are interchangeable
/// for every future search decision. Only equality and hashing are defined;
/// ordering of nodes is always by score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Signature(Vec<StateAtom>);

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coverage(mut self, coverage: &Coverage) -> Self {
        self.0.push(StateAtom::Coverage(coverage.clone()));
        self
    }

    pub fn position(mut self, pos: usize) -> Self {
        self.0.push(StateAtom::Position(pos));
        self
    }

    /// Append a word sequence, delimited so that adjacent sequences can't alias.
    pub fn words(mut self, words: &[Arc<str>]) -> Self {
        self.0
            .extend(words.iter().map(|w| StateAtom::Word(Arc::clone(w))));
        self.0.push(StateAtom::Separator);
        self
    }
}

/// Extracts the recombination signature of a node.
pub trait Recombination: Send + Sync {
    fn signature(&self, hypo: &Hypothesis) -> Signature;
}

/// Signature from coverage, the last translated position, and target
/// context words: trailing words for phrase nodes, both ends for chart nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryRecombination;

impl Recombination for BoundaryRecombination {
    fn signature(&self, hypo: &Hypothesis) -> Signature {
        match hypo.kind {
            DerivationKind::Phrase => Signature::new()
                .coverage(&hypo.coverage)
                .position(hypo.span.end)
                .words(hypo.boundary.right()),
            DerivationKind::Chart => Signature::new()
                .position(hypo.span.start)
                .position(hypo.span.end)
                .words(hypo.boundary.left())
                .words(hypo.boundary.right()),
        }
    }
}

/// One partial or complete translation.
#[derive(Debug, Clone)]
pub struct Hypothesis {
    id: HypothesisId,
    kind: DerivationKind,
    inside: f32,
    estimate: f32,
    predecessors: Vec<HypothesisId>,
    span: Span,
    coverage: Coverage,
    phrase: Arc<TargetPhrase>,
    boundary: Boundary,
    signature: Signature,
}

impl Hypothesis {
    pub fn id(&self) -> HypothesisId {
        self.id
    }

    pub fn kind(&self) -> DerivationKind {
        self.kind
    }

    /// Accumulated score of the derivation so far.
    pub fn inside(&self) -> f32 {
        self.inside
    }

    /// Estimated score of the input still to translate (0 in chart mode).
    pub fn estimate(&self) -> f32 {
        self.estimate
    }

    /// Ranking score: `inside + estimate`.
    pub fn score(&self) -> f32 {
        self.inside + self.estimate
    }

    /// Parent (phrase mode) or children in source order (chart mode).
    pub fn predecessors(&self) -> &[HypothesisId] {
        &self.predecessors
    }

    /// Span of the last applied phrase (phrase mode) or of the cell (chart mode).
    pub fn span(&self) -> Span {
        self.span
    }

    pub fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    pub fn phrase(&self) -> &Arc<TargetPhrase> {
        &self.phrase
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

/// Fields of a node about to be allocated.
pub(crate) struct NewHypothesis {
    pub kind: DerivationKind,
    pub inside: f32,
    pub estimate: f32,
    pub predecessors: Vec<HypothesisId>,
    pub span: Span,
    pub coverage: Coverage,
    pub phrase: Arc<TargetPhrase>,
    pub boundary: Boundary,
}

/// Owns every node created during one decode.
#[derive(Debug, Default)]
pub struct HypothesisArena {
    nodes: Vec<Hypothesis>,
}

impl HypothesisArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: HypothesisId) -> &Hypothesis {
        &self.nodes[id.index()]
    }

    pub(crate) fn alloc(
        &mut self,
        new: NewHypothesis,
        recombination: &dyn Recombination,
    ) -> HypothesisId {
        let id = HypothesisId(
            u32::try_from(self.nodes.len()).expect("more than u32::MAX hypotheses in one decode"),
        );
        let mut hypo = Hypothesis {
            id,
            kind: new.kind,
            inside: new.inside,
            estimate: new.estimate,
            predecessors: new.predecessors,
            span: new.span,
            coverage: new.coverage,
            phrase: new.phrase,
            boundary: new.boundary,
            signature: Signature::default(),
        };
        hypo.signature = recombination.signature(&hypo);
        self.nodes.push(hypo);
        id
    }
}

impl Index<HypothesisId> for HypothesisArena {
    type Output = Hypothesis;

    fn index(&self, id: HypothesisId) -> &Hypothesis {
        self.get(id)
    }
}

/// Total order used for every ranking: higher score first, then older id.
pub fn rank_order(a: (HypothesisId, f32), b: (HypothesisId, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}
