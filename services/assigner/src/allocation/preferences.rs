//! "Prefers to serve with" relation between candidates.
//!
//! Edges are unordered pairs. A preference stored as (A, B) is visible from
//! both A and B; the graph keeps one canonical copy per pair rather than two
//! directed facts, so the two directions cannot drift apart.

use std::collections::{BTreeMap, BTreeSet};

use roster_id::CandidateId;

/// Symmetric preference graph. Only ever boosts scores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceGraph {
    adjacency: BTreeMap<CandidateId, BTreeSet<CandidateId>>,
}

impl PreferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from raw edges. Self-loops and duplicate edges (in
    /// either direction) are dropped.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (CandidateId, CandidateId)>,
    {
        let mut graph = Self::new();
        for (a, b) in edges {
            graph.insert(a, b);
        }
        graph
    }

    /// Records a mutual preference. Returns false if it was already known.
    pub fn insert(&mut self, a: CandidateId, b: CandidateId) -> bool {
        if a == b {
            return false;
        }
        let added = self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
        added
    }

    /// Partners of `candidate`, in ascending id order.
    pub fn partners(&self, candidate: &CandidateId) -> impl Iterator<Item = &CandidateId> {
        self.adjacency.get(candidate).into_iter().flatten()
    }

    /// Number of distinct unordered pairs.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }
}
