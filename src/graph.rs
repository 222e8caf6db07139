//! Graph construction from an occupancy grid.
//!
//! Every grid cell becomes a node placed on a regular lattice (`x = row * step`,
//! `y = col * step`, `z = 0`). Free cells are linked to their free orthogonal
//! neighbours by unit-weight edges; occupied cells stay isolated. Once the
//! graph is built the anchor node is marked occupied so it never enters the
//! pool of nodes to visit, while every tour still starts and ends there.

use crate::error::InputError;
use crate::grid::OccupancyGrid;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Weight of a missing edge
pub const UNREACHABLE: u32 = u32::MAX;

/// A node of the coverage graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Row-major index of the grid cell
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Copied from the grid; the anchor is always flagged occupied
    pub occupied: bool,
}

impl Node {
    pub fn new(id: usize, x: f64, y: f64, occupied: bool) -> Self {
        Node { id, x, y, z: 0.0, occupied }
    }

    /// Euclidean distance to another node
    #[inline]
    pub fn distance(&self, other: &Node) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Dense N x N edge-weight matrix over all grid cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjacencyGraph {
    weights: Vec<Vec<u32>>,
}

impl AdjacencyGraph {
    /// Graph with `n` nodes, no edges and zero self weights
    pub fn empty(n: usize) -> Self {
        let mut weights = vec![vec![UNREACHABLE; n]; n];
        for (i, row) in weights.iter_mut().enumerate() {
            row[i] = 0;
        }
        AdjacencyGraph { weights }
    }

    /// Build the 4-connected adjacency of the free cells of a grid.
    pub fn from_grid(grid: &OccupancyGrid) -> Self {
        let mut graph = Self::empty(grid.len());
        let rows = grid.height() as isize;
        let cols = grid.width() as isize;

        for i in 0..grid.len() {
            if !grid.is_free(i) {
                continue;
            }
            let (row, col) = grid.row_col(i);

            for row_shift in -1isize..=1 {
                for col_shift in -1isize..=1 {
                    // Same cell or diagonal move
                    if row_shift * col_shift != 0 || (row_shift == 0 && col_shift == 0) {
                        continue;
                    }
                    let nb_row = row as isize + row_shift;
                    let nb_col = col as isize + col_shift;
                    if nb_row < 0 || nb_row >= rows || nb_col < 0 || nb_col >= cols {
                        continue;
                    }

                    let j = grid.index(nb_row as usize, nb_col as usize);
                    if grid.is_free(j) {
                        graph.set_edge(i, j, 1);
                    }
                }
            }
        }

        graph
    }

    fn set_edge(&mut self, i: usize, j: usize, weight: u32) {
        self.weights[i][j] = weight;
        self.weights[j][i] = weight;
    }

    /// Number of nodes
    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    #[inline]
    pub fn weight(&self, i: usize, j: usize) -> u32 {
        self.weights[i][j]
    }

    pub fn weights(&self) -> &[Vec<u32>] {
        &self.weights
    }

    /// Nodes directly connected to `i`
    pub fn neighbors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.weights[i]
            .iter()
            .enumerate()
            .filter(move |&(j, &w)| j != i && w != UNREACHABLE)
            .map(|(j, _)| j)
    }

    pub fn degree(&self, i: usize) -> usize {
        self.neighbors(i).count()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        (0..self.len()).map(|i| self.degree(i)).sum::<usize>() / 2
    }

    pub fn is_symmetric(&self) -> bool {
        let n = self.len();
        (0..n).all(|i| (i + 1..n).all(|j| self.weights[i][j] == self.weights[j][i]))
    }

    /// Label every node with the index of its connected component.
    /// Components are numbered in order of their smallest node.
    pub fn connected_components(&self) -> Vec<usize> {
        let n = self.len();
        let mut labels = vec![usize::MAX; n];
        let mut next_label = 0;
        let mut stack = Vec::new();

        for start in 0..n {
            if labels[start] != usize::MAX {
                continue;
            }
            labels[start] = next_label;
            stack.push(start);
            while let Some(u) = stack.pop() {
                for v in self.neighbors(u) {
                    if labels[v] == usize::MAX {
                        labels[v] = next_label;
                        stack.push(v);
                    }
                }
            }
            next_label += 1;
        }

        labels
    }
}

/// Parameters of the graph construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Start/end node shared by every tour
    pub anchor: usize,
    /// Distance between two adjacent lattice positions
    pub step: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            anchor: 0,
            step: 2.0,
        }
    }
}

/// Adjacency, node geometry and anchor produced from one grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGraph {
    /// Name of the source grid
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub step: f64,
    pub anchor: usize,
    pub adjacency: AdjacencyGraph,
    pub nodes: Vec<Node>,
}

impl CoverageGraph {
    /// Number of nodes (grid cells)
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Euclidean distance between two nodes
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.nodes[i].distance(&self.nodes[j])
    }

    /// Free nodes in row-major order, anchor excluded
    pub fn free_nodes(&self) -> Vec<usize> {
        self.nodes.iter().filter(|n| !n.occupied).map(|n| n.id).collect()
    }

    /// Distance between the two closest distinct nodes (0 for a single node).
    /// Nodes sit on a regular lattice, so only lattice neighbours are compared.
    pub fn min_node_spacing(&self) -> f64 {
        let mut pairs = Vec::new();
        for i in 0..self.len() {
            let col = i % self.width;
            if col + 1 < self.width {
                pairs.push((i, i + 1));
            }
            if i + self.width < self.len() {
                pairs.push((i, i + self.width));
            }
        }

        pairs
            .into_iter()
            .map(|(i, j)| self.distance(i, j))
            .min_by_key(|&d| OrderedFloat(d))
            .unwrap_or(0.0)
    }

    /// Free nodes without any free orthogonal neighbour
    pub fn isolated_free_nodes(&self) -> Vec<usize> {
        self.free_nodes()
            .into_iter()
            .filter(|&i| self.adjacency.degree(i) == 0)
            .collect()
    }
}

/// Turns an occupancy grid into a [`CoverageGraph`]
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    pub config: GraphConfig,
}

impl GraphBuilder {
    pub fn new(config: GraphConfig) -> Self {
        GraphBuilder { config }
    }

    pub fn build(&self, grid: &OccupancyGrid) -> Result<CoverageGraph, InputError> {
        let n = grid.len();
        let anchor = self.config.anchor;
        let step = self.config.step;

        if !step.is_finite() || step <= 0.0 {
            return Err(InputError::InvalidStep(step));
        }
        if anchor >= n {
            return Err(InputError::AnchorOutOfBounds { anchor, nodes: n });
        }
        if !grid.is_free(anchor) {
            log::warn!("Anchor node {} lies on an occupied cell", anchor);
        }

        let adjacency = AdjacencyGraph::from_grid(grid);

        let nodes: Vec<Node> = (0..n)
            .map(|i| {
                let (row, col) = grid.row_col(i);
                let occupied = i == anchor || !grid.is_free(i);
                Node::new(i, row as f64 * step, col as f64 * step, occupied)
            })
            .collect();

        log::debug!(
            "Built graph for '{}': {} nodes, {} edges, anchor {}",
            grid.name,
            n,
            adjacency.edge_count(),
            anchor
        );

        Ok(CoverageGraph {
            name: grid.name.clone(),
            width: grid.width(),
            height: grid.height(),
            step,
            anchor,
            adjacency,
            nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(text: &str, anchor: usize) -> CoverageGraph {
        let grid: OccupancyGrid = text.parse().unwrap();
        GraphBuilder::new(GraphConfig { anchor, step: 2.0 })
            .build(&grid)
            .unwrap()
    }

    #[test]
    fn test_orthogonal_edges_only() {
        let graph = build("0 0\n0 0\n", 0);
        let adj = &graph.adjacency;

        assert_eq!(adj.weight(0, 1), 1);
        assert_eq!(adj.weight(0, 2), 1);
        assert_eq!(adj.weight(0, 3), UNREACHABLE);
        assert_eq!(adj.weight(1, 2), UNREACHABLE);
        assert_eq!(adj.weight(3, 3), 0);
        assert_eq!(adj.edge_count(), 4);
    }

    #[test]
    fn test_occupied_cells_are_isolated() {
        let graph = build("0 1 0\n0 0 0\n", 0);
        let adj = &graph.adjacency;

        assert_eq!(adj.degree(1), 0);
        assert_eq!(adj.weight(0, 1), UNREACHABLE);
        assert_eq!(adj.weight(2, 5), 1);
        assert!(adj.is_symmetric());
    }

    #[test]
    fn test_anchor_excluded_from_free_nodes() {
        let graph = build("0 0 0\n0 0 0\n", 1);

        assert!(graph.nodes[1].occupied);
        assert_eq!(graph.free_nodes(), vec![0, 2, 3, 4, 5]);
        // Edges of the anchor survive the forced occupancy
        assert_eq!(graph.adjacency.weight(0, 1), 1);
    }

    #[test]
    fn test_node_positions() {
        let graph = build("0 0 0\n0 0 0\n", 0);
        assert_eq!((graph.nodes[5].x, graph.nodes[5].y, graph.nodes[5].z), (2.0, 4.0, 0.0));
        assert!((graph.distance(0, 4) - 8.0f64.sqrt()).abs() < 1e-12);
        assert!((graph.min_node_spacing() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_anchor_and_step() {
        let grid: OccupancyGrid = "0 0\n".parse().unwrap();

        let err = GraphBuilder::new(GraphConfig { anchor: 2, step: 2.0 }).build(&grid).unwrap_err();
        assert!(matches!(err, InputError::AnchorOutOfBounds { anchor: 2, nodes: 2 }));

        let err = GraphBuilder::new(GraphConfig { anchor: 0, step: 0.0 }).build(&grid).unwrap_err();
        assert!(matches!(err, InputError::InvalidStep(_)));
    }

    #[test]
    fn test_build_is_idempotent() {
        let grid: OccupancyGrid = "0 1 0\n0 0 1\n1 0 0\n".parse().unwrap();
        let builder = GraphBuilder::new(GraphConfig { anchor: 4, step: 1.5 });
        assert_eq!(builder.build(&grid).unwrap(), builder.build(&grid).unwrap());
    }

    #[test]
    fn test_connected_components() {
        let graph = build("0 1 0\n0 1 0\n", 0);
        let labels = graph.adjacency.connected_components();

        assert_eq!(labels[0], labels[3]);
        assert_eq!(labels[2], labels[5]);
        assert_ne!(labels[0], labels[2]);
        assert_ne!(labels[1], labels[4]);
    }

    #[test]
    fn test_isolated_free_nodes() {
        let graph = build("0 0 1 0\n", 0);
        assert_eq!(graph.isolated_free_nodes(), vec![3]);
    }
}
