//! Coverage VRP Solver Library
//!
//! Plans coverage routes for a fleet of agents on a 2D occupancy grid. Each
//! agent receives one closed tour through a shared anchor cell, every free
//! cell is visited exactly once, and the longest tour is kept as short as
//! possible (min-max vehicle routing).
//!
//! # Features
//!
//! - Occupancy grid parsing and seeded random grid generation
//! - 4-connected graph construction with a configurable anchor and lattice step
//! - Greedy min-max insertion heuristic with a locality (field-of-view) filter,
//!   optionally evaluated in parallel
//! - All-pairs shortest paths (Floyd-Warshall, breadth-first) for diagnostics
//! - Benchmarking and SVG visualization tools
//!
//! # Example
//!
//! ```no_run
//! use coverage_vrp_solver::config::PlannerConfig;
//! use coverage_vrp_solver::grid::OccupancyGrid;
//! use coverage_vrp_solver::planner::Planner;
//!
//! // Load grid
//! let grid = OccupancyGrid::from_file("grids/two_rooms.txt").unwrap();
//!
//! // Plan routes for three agents starting at cell 5
//! let mut config = PlannerConfig::default();
//! config.graph.anchor = 5;
//! config.solver.agents = 3;
//! let (_graph, plan) = Planner::new(config).unwrap().plan(&grid).unwrap();
//!
//! println!("Longest tour: {:.2}", plan.max_length);
//! ```

pub mod benchmark;
pub mod config;
pub mod error;
pub mod fleet;
pub mod graph;
pub mod grid;
pub mod heuristics;
pub mod oracle;
pub mod planner;
pub mod visualization;

pub use error::{Error, InputError, SolveError};
pub use fleet::{Fleet, RoutePlan, Tour};
pub use graph::{CoverageGraph, GraphBuilder};
pub use grid::OccupancyGrid;
