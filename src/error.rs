//! Error types for grid loading, graph construction and route planning.

use crate::fleet::Fleet;
use thiserror::Error;

/// Errors raised before any solving starts: bad grid files, bad
/// configuration values or an anchor that does not fit the grid.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("cannot read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("grid contains no cells")]
    EmptyGrid,

    #[error("invalid cell value '{token}' on row {row} (expected 0 or 1)")]
    InvalidCell { row: usize, token: String },

    #[error("grid of {width}x{height} cells is too large")]
    GridTooLarge { width: usize, height: usize },

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("anchor node {anchor} is outside the grid ({nodes} nodes)")]
    AnchorOutOfBounds { anchor: usize, nodes: usize },

    #[error("grid step must be a positive finite number, got {0}")]
    InvalidStep(f64),

    #[error("at least one agent is required")]
    NoAgents,

    #[error("field-of-view margin must be a non-negative finite number, got {0}")]
    InvalidFovMargin(f64),

    #[error("node {node} is outside the graph ({nodes} nodes)")]
    NodeOutOfBounds { node: usize, nodes: usize },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// State of the fleet at the moment the balancing loop gave up.
#[derive(Debug, Clone)]
pub struct PartialSolve {
    /// Tours built so far (all still closed at the anchor)
    pub fleet: Fleet,
    /// Free nodes that could not be placed, in pool order
    pub unvisited: Vec<usize>,
    /// Balancing iterations completed before the failure
    pub iterations: usize,
}

/// Errors raised by the greedy insertion solver.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error(
        "no insertion satisfies the locality threshold {threshold:.4}; {} node(s) left unvisited",
        .partial.unvisited.len()
    )]
    InfeasibleInsertion {
        threshold: f64,
        partial: Box<PartialSolve>,
    },

    #[error(
        "node(s) {nodes:?} have no free neighbour and cannot be reached within threshold {threshold:.4}"
    )]
    DisconnectedNode {
        nodes: Vec<usize>,
        threshold: f64,
        partial: Box<PartialSolve>,
    },
}

impl SolveError {
    /// Partial result carried by every solve failure.
    pub fn partial(&self) -> &PartialSolve {
        match self {
            SolveError::InfeasibleInsertion { partial, .. } => partial,
            SolveError::DisconnectedNode { partial, .. } => partial,
        }
    }

    /// Locality threshold in force when the solve failed.
    pub fn threshold(&self) -> f64 {
        match self {
            SolveError::InfeasibleInsertion { threshold, .. } => *threshold,
            SolveError::DisconnectedNode { threshold, .. } => *threshold,
        }
    }
}

/// Crate-level error combining input and solve failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Solve(#[from] SolveError),
}
