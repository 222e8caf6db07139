//! Tours, fleets and route plans.
//!
//! A [`Tour`] is a closed sequence of node indices starting and ending at the
//! anchor. A [`Fleet`] holds one tour per agent and a [`RoutePlan`] is the
//! evaluated, serializable result handed to callers.

use crate::graph::CoverageGraph;
use crate::oracle::AllPairsPaths;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Closed route of a single agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tour {
    nodes: Vec<usize>,
}

impl Tour {
    /// Trivial tour `[anchor, anchor]`
    pub fn new(anchor: usize) -> Self {
        Tour {
            nodes: vec![anchor, anchor],
        }
    }

    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn anchor(&self) -> usize {
        self.nodes[0]
    }

    /// Visited nodes between the two anchor occurrences
    pub fn interior(&self) -> &[usize] {
        &self.nodes[1..self.nodes.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tour always holds at least the two anchor occurrences
    pub fn is_empty(&self) -> bool {
        false
    }

    /// True while only the anchor is visited
    pub fn is_trivial(&self) -> bool {
        self.nodes.len() == 2
    }

    pub fn is_closed(&self) -> bool {
        self.nodes.len() >= 2 && self.nodes.first() == self.nodes.last()
    }

    /// Sum of Euclidean distances along the tour, closing edge included
    pub fn length(&self, graph: &CoverageGraph) -> f64 {
        self.nodes
            .windows(2)
            .map(|pair| graph.distance(pair[0], pair[1]))
            .sum()
    }

    /// Insert `node` before the element currently at `position`.
    /// Only interior positions are valid (1..len), which keeps the tour closed.
    pub(crate) fn insert(&mut self, position: usize, node: usize) {
        debug_assert!(position >= 1 && position < self.nodes.len());
        self.nodes.insert(position, node);
    }

    /// Largest shortest-path hop count between consecutive nodes, or `None`
    /// when two consecutive nodes are not connected in the graph.
    pub fn max_graph_hops(&self, paths: &AllPairsPaths) -> Option<u32> {
        let mut max_hops = 0;
        for pair in self.nodes.windows(2) {
            let hops = paths.distance(pair[0], pair[1])?;
            max_hops = max_hops.max(hops);
        }
        Some(max_hops)
    }
}

/// Fixed-size set of tours, one per agent, sharing the same anchor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fleet {
    anchor: usize,
    tours: Vec<Tour>,
}

impl Fleet {
    pub fn new(anchor: usize, agents: usize) -> Self {
        Fleet {
            anchor,
            tours: (0..agents).map(|_| Tour::new(anchor)).collect(),
        }
    }

    pub fn anchor(&self) -> usize {
        self.anchor
    }

    pub fn num_agents(&self) -> usize {
        self.tours.len()
    }

    pub fn tours(&self) -> &[Tour] {
        &self.tours
    }

    pub fn tour(&self, agent: usize) -> &Tour {
        &self.tours[agent]
    }

    pub(crate) fn insert(&mut self, agent: usize, position: usize, node: usize) {
        self.tours[agent].insert(position, node);
    }

    pub fn lengths(&self, graph: &CoverageGraph) -> Vec<f64> {
        self.tours.iter().map(|t| t.length(graph)).collect()
    }

    /// Length of the longest tour: the min-max objective
    pub fn max_length(&self, graph: &CoverageGraph) -> f64 {
        self.lengths(graph).into_iter().fold(0.0, f64::max)
    }

    pub fn total_length(&self, graph: &CoverageGraph) -> f64 {
        self.lengths(graph).into_iter().sum()
    }

    /// Index of the longest tour (last one on ties)
    pub fn longest_tour(&self, graph: &CoverageGraph) -> Option<usize> {
        self.lengths(graph)
            .into_iter()
            .enumerate()
            .max_by_key(|&(_, l)| OrderedFloat(l))
            .map(|(i, _)| i)
    }

    /// Number of nodes assigned over all tours
    pub fn assigned_count(&self) -> usize {
        self.tours.iter().map(|t| t.interior().len()).sum()
    }

    /// Compare the tour interiors against the free-node set of the graph
    pub fn coverage(&self, graph: &CoverageGraph) -> CoverageReport {
        let mut visits = vec![0usize; graph.len()];
        let mut foreign = Vec::new();
        let mut open_tours = Vec::new();

        for (agent, tour) in self.tours.iter().enumerate() {
            if !tour.is_closed() || tour.anchor() != self.anchor {
                open_tours.push(agent);
            }
            for &node in tour.interior() {
                if node >= graph.len() || graph.nodes[node].occupied {
                    foreign.push(node);
                } else {
                    visits[node] += 1;
                }
            }
        }

        let free = graph.free_nodes();
        CoverageReport {
            missing: free.iter().copied().filter(|&n| visits[n] == 0).collect(),
            duplicated: free.iter().copied().filter(|&n| visits[n] > 1).collect(),
            foreign,
            open_tours,
        }
    }
}

/// Result of checking a fleet against the free-node set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Free nodes not visited by any tour
    pub missing: Vec<usize>,
    /// Free nodes visited more than once
    pub duplicated: Vec<usize>,
    /// Occupied nodes (or the anchor) found inside a tour
    pub foreign: Vec<usize>,
    /// Agents whose tour does not start and end at the anchor
    pub open_tours: Vec<usize>,
}

impl CoverageReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
            && self.duplicated.is_empty()
            && self.foreign.is_empty()
            && self.open_tours.is_empty()
    }
}

/// Evaluated route assignment for the whole fleet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePlan {
    /// One closed tour per agent
    pub fleet: Fleet,
    /// Length of every tour, in fleet order
    pub tour_lengths: Vec<f64>,
    /// Length of the longest tour
    pub max_length: f64,
    /// Sum of all tour lengths
    pub total_length: f64,
    /// Whether every free node is visited exactly once
    pub complete: bool,
    /// Algorithm that generated this plan
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
    /// Number of balancing iterations
    pub iterations: usize,
    /// Creation time (RFC 3339)
    pub created_at: String,
}

impl RoutePlan {
    pub fn from_fleet(graph: &CoverageGraph, fleet: Fleet, algorithm: &str) -> Self {
        let tour_lengths = fleet.lengths(graph);
        let max_length = tour_lengths.iter().cloned().fold(0.0, f64::max);
        let total_length = tour_lengths.iter().sum();
        let complete = fleet.coverage(graph).is_complete();

        RoutePlan {
            fleet,
            tour_lengths,
            max_length,
            total_length,
            complete,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
            iterations: 0,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Ratio of the longest tour to the mean tour length (1.0 = perfect balance)
    pub fn imbalance(&self) -> f64 {
        if self.tour_lengths.is_empty() || self.total_length <= 0.0 {
            return 1.0;
        }
        let mean = self.total_length / self.tour_lengths.len() as f64;
        self.max_length / mean
    }
}

impl std::fmt::Display for RoutePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Route plan ({})", self.algorithm)?;
        writeln!(f, "  Agents: {}", self.fleet.num_agents())?;
        writeln!(f, "  Max tour length: {:.2}", self.max_length)?;
        writeln!(f, "  Total length: {:.2}", self.total_length)?;
        writeln!(f, "  Imbalance: {:.3}", self.imbalance())?;
        writeln!(f, "  Complete: {}", self.complete)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        for (agent, tour) in self.fleet.tours().iter().enumerate() {
            writeln!(
                f,
                "  #{} ({:.2}): {:?}",
                agent, self.tour_lengths[agent], tour.nodes()
            )?;
        }
        Ok(())
    }
}
