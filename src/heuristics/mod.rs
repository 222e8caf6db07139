//! Heuristics module for multi-agent coverage planning.
//!
//! This module exports the fleet construction heuristics.

pub mod greedy;

pub use greedy::*;

use crate::error::SolveError;
use crate::fleet::RoutePlan;
use crate::graph::CoverageGraph;

/// Builds a complete route plan for a coverage graph
pub trait FleetConstruction {
    fn construct(&self, graph: &CoverageGraph) -> Result<RoutePlan, SolveError>;
    fn name(&self) -> &str;
}
