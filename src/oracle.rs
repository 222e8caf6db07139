//! All-pairs shortest paths over the adjacency graph.
//!
//! Only used for diagnostics once a plan exists (path queries between two
//! nodes, hop counts between consecutive tour nodes). Nothing here feeds back
//! into tour construction.

use crate::graph::{AdjacencyGraph, UNREACHABLE};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// `distances[i][j]` = minimal edge-weight sum from i to j, [`UNREACHABLE`] if none
pub type DistanceMatrix = Vec<Vec<u32>>;

/// Shortest distances plus the predecessor table needed to rebuild paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllPairsPaths {
    distances: DistanceMatrix,
    /// `predecessors[i][j]` = node preceding j on a shortest path from i
    predecessors: Vec<Vec<Option<usize>>>,
}

impl AllPairsPaths {
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    pub fn distances(&self) -> &DistanceMatrix {
        &self.distances
    }

    /// Shortest distance, `None` when `to` cannot be reached from `from`
    pub fn distance(&self, from: usize, to: usize) -> Option<u32> {
        let d = self.distances[from][to];
        (d != UNREACHABLE).then_some(d)
    }

    /// One shortest route from `from` to `to`, both ends included.
    /// Empty when unreachable.
    pub fn reconstruct_path(&self, from: usize, to: usize) -> Vec<usize> {
        if self.distance(from, to).is_none() {
            return Vec::new();
        }

        let mut path = vec![to];
        let mut current = to;
        while current != from {
            match self.predecessors[from][current] {
                Some(prev) if path.len() <= self.len() => {
                    path.push(prev);
                    current = prev;
                }
                _ => return Vec::new(),
            }
        }
        path.reverse();
        path
    }

    /// Distance and route between two nodes in one record
    pub fn query(&self, from: usize, to: usize) -> PathQuery {
        PathQuery {
            from,
            to,
            distance: self.distance(from, to),
            path: self.reconstruct_path(from, to),
        }
    }
}

/// Answer to a diagnostic path query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathQuery {
    pub from: usize,
    pub to: usize,
    pub distance: Option<u32>,
    pub path: Vec<usize>,
}

impl std::fmt::Display for PathQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.distance {
            Some(d) => {
                let nodes: Vec<String> = self.path.iter().map(|n| n.to_string()).collect();
                write!(
                    f,
                    "The path from {} to {} is long {} and goes through: {}",
                    self.from,
                    self.to,
                    d,
                    nodes.join(" ")
                )
            }
            None => write!(f, "No path from {} to {}", self.from, self.to),
        }
    }
}

pub trait ShortestPathOracle {
    fn compute_all_pairs(&self, graph: &AdjacencyGraph) -> AllPairsPaths;
    fn name(&self) -> &str;
}

/// Classic O(N^3) Floyd-Warshall
#[derive(Debug, Clone, Copy, Default)]
pub struct FloydWarshall;

impl ShortestPathOracle for FloydWarshall {
    fn compute_all_pairs(&self, graph: &AdjacencyGraph) -> AllPairsPaths {
        let n = graph.len();
        let mut dist: DistanceMatrix = graph.weights().to_vec();
        let mut pred: Vec<Vec<Option<usize>>> = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| (i != j && dist[i][j] != UNREACHABLE).then_some(i))
                    .collect()
            })
            .collect();

        for k in 0..n {
            for i in 0..n {
                let d_ik = dist[i][k];
                if d_ik == UNREACHABLE {
                    continue;
                }
                for j in 0..n {
                    let d_kj = dist[k][j];
                    if d_kj == UNREACHABLE {
                        continue;
                    }
                    let through = d_ik.saturating_add(d_kj);
                    if through < dist[i][j] {
                        dist[i][j] = through;
                        let p = pred[k][j];
                        pred[i][j] = p;
                    }
                }
            }
        }

        AllPairsPaths {
            distances: dist,
            predecessors: pred,
        }
    }

    fn name(&self) -> &str {
        "FloydWarshall"
    }
}

/// One breadth-first search per source, sources processed in parallel.
/// Exact on this crate's graphs, whose edges all weigh 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct BreadthFirst;

impl BreadthFirst {
    fn search(graph: &AdjacencyGraph, source: usize) -> (Vec<u32>, Vec<Option<usize>>) {
        let n = graph.len();
        let mut dist = vec![UNREACHABLE; n];
        let mut pred = vec![None; n];
        let mut queue = VecDeque::new();

        dist[source] = 0;
        queue.push_back(source);
        while let Some(u) = queue.pop_front() {
            for v in graph.neighbors(u) {
                if dist[v] == UNREACHABLE {
                    dist[v] = dist[u] + graph.weight(u, v);
                    pred[v] = Some(u);
                    queue.push_back(v);
                }
            }
        }

        (dist, pred)
    }
}

impl ShortestPathOracle for BreadthFirst {
    fn compute_all_pairs(&self, graph: &AdjacencyGraph) -> AllPairsPaths {
        let (distances, predecessors): (Vec<_>, Vec<_>) = (0..graph.len())
            .into_par_iter()
            .map(|source| Self::search(graph, source))
            .unzip();

        AllPairsPaths {
            distances,
            predecessors,
        }
    }

    fn name(&self) -> &str {
        "BreadthFirst"
    }
}
