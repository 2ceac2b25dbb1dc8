//! Lazy best-first enumeration of combinations (cube pruning).
//!
//! Each edge is one rule with a score of its own and one descending score
//! list per child slot. A [`QueueEntry`] picks one position in every list.
//! Popping an entry pushes its neighbours, each advancing a single cursor,
//! so the best unseen combination is always on the frontier.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use rustc_hash::FxHashSet;

#[derive(Debug, Clone)]
struct CubeEdge {
    own_score: f32,
    dims: Vec<Arc<[f32]>>,
}

/// A position in one edge's cross product.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub edge: usize,
    pub cursors: Vec<usize>,
    /// Edge score plus the score at every cursor.
    pub estimate: f32,
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    /// Greater is better: higher estimate, then lower edge, then smaller cursors.
    fn cmp(&self, other: &Self) -> Ordering {
        self.estimate
            .total_cmp(&other.estimate)
            .then_with(|| other.edge.cmp(&self.edge))
            .then_with(|| other.cursors.cmp(&self.cursors))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Combination frontier shared by all edges of one chart cell or stack.
#[derive(Debug, Default)]
pub struct Cube {
    edges: Vec<CubeEdge>,
    frontier: BinaryHeap<QueueEntry>,
    seen: FxHashSet<(usize, Vec<usize>)>,
    popped: usize,
}

impl Cube {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an edge and seed its best corner. `dims` must each be sorted
    /// best first. An edge with an empty dimension is starved and never seeded.
    pub fn add_edge(&mut self, own_score: f32, dims: Vec<Arc<[f32]>>) -> usize {
        let edge = self.edges.len();
        let starved = dims.iter().any(|d| d.is_empty());
        self.edges.push(CubeEdge { own_score, dims });
        if !starved {
            self.push(edge, vec![0; self.edges[edge].dims.len()]);
        }
        edge
    }

    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Entries waiting on the frontier.
    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    /// Entries returned by `pop` so far.
    pub fn popped(&self) -> usize {
        self.popped
    }

    fn push(&mut self, edge: usize, cursors: Vec<usize>) {
        if !self.seen.insert((edge, cursors.clone())) {
            return;
        }
        let e = &self.edges[edge];
        let estimate = e.own_score
            + e.dims
                .iter()
                .zip(&cursors)
                .map(|(d, &c)| d[c])
                .sum::<f32>();
        self.frontier.push(QueueEntry {
            edge,
            cursors,
            estimate,
        });
    }

    /// Remove the best entry and queue its one-step successors.
    pub fn pop(&mut self) -> Option<QueueEntry> {
        let entry = self.frontier.pop()?;
        self.popped += 1;
        for slot in 0..entry.cursors.len() {
            if entry.cursors[slot] + 1 < self.edges[entry.edge].dims[slot].len() {
                let mut next = entry.cursors.clone();
                next[slot] += 1;
                self.push(entry.edge, next);
            }
        }
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dim(scores: &[f32]) -> Arc<[f32]> {
        Arc::from(scores)
    }

    #[test]
    fn two_child_top_three() {
        let mut cube = Cube::new();
        cube.add_edge(0.0, vec![dim(&[10.0, 7.0, 2.0]), dim(&[9.0, 1.0])]);
        let got: Vec<_> = std::iter::from_fn(|| cube.pop()).take(3).collect();
        let scores: Vec<_> = got.iter().map(|e| e.estimate).collect();
        assert_eq!(scores, vec![19.0, 16.0, 11.0]);
        assert_eq!(got[2].cursors, vec![0, 1]);
    }

    #[test]
    fn full_enumeration_without_repeats() {
        let mut cube = Cube::new();
        cube.add_edge(-1.0, vec![dim(&[3.0, 2.0, 1.0]), dim(&[5.0, 0.0])]);
        cube.add_edge(0.0, vec![dim(&[4.0])]);
        let mut seen = FxHashSet::default();
        let mut last = f32::INFINITY;
        while let Some(e) = cube.pop() {
            assert!(e.estimate <= last);
            last = e.estimate;
            assert!(seen.insert((e.edge, e.cursors)));
        }
        assert_eq!(seen.len(), 7);
        assert_eq!(cube.popped(), 7);
    }

    #[test]
    fn frontier_grows_by_successors_only() {
        let mut cube = Cube::new();
        cube.add_edge(0.0, vec![dim(&[3.0, 2.5, 1.0]), dim(&[2.0, 1.0])]);
        assert_eq!(cube.frontier_len(), 1);
        // [0,0] queues [1,0] and [0,1]
        cube.pop();
        assert_eq!(cube.frontier_len(), 2);
        // [1,0] queues [2,0] and [1,1]
        cube.pop();
        assert_eq!(cube.frontier_len(), 3);
        while cube.pop().is_some() {
            assert!(cube.frontier_len() <= cube.popped() + 1);
        }
        assert_eq!(cube.popped(), 6);
        assert!(cube.is_empty());
    }

    #[test]
    fn starved_edge_never_pops() {
        let mut cube = Cube::new();
        cube.add_edge(5.0, vec![dim(&[1.0]), dim(&[])]);
        assert!(cube.is_empty());
        assert_eq!(cube.pop(), None);
    }

    #[test]
    fn lexical_edge_pops_once() {
        let mut cube = Cube::new();
        cube.add_edge(-2.0, Vec::new());
        let e = cube.pop().unwrap();
        assert_eq!(e.estimate, -2.0);
        assert!(e.cursors.is_empty());
        assert!(cube.pop().is_none());
    }

    #[test]
    fn ties_prefer_lower_edge_then_smaller_cursor() {
        let mut cube = Cube::new();
        cube.add_edge(0.0, vec![dim(&[1.0, 1.0])]);
        cube.add_edge(0.0, vec![dim(&[1.0])]);
        let order: Vec<_> = std::iter::from_fn(|| cube.pop())
            .map(|e| (e.edge, e.cursors))
            .collect();
        assert_eq!(order, vec![(0, vec![0]), (0, vec![1]), (1, vec![0])]);
    }
}
