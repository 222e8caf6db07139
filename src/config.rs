//! Planner configuration, loadable from JSON.
//!
//! ```json
//! {
//!   "graph": { "anchor": 5, "step": 2.0 },
//!   "solver": { "agents": 3, "fov_margin": 2.0, "parallel": false }
//! }
//! ```
//!
//! Missing fields fall back to their defaults.

use crate::error::InputError;
use crate::graph::GraphConfig;
use crate::heuristics::SolverConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub graph: GraphConfig,
    pub solver: SolverConfig,
}

impl PlannerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, InputError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, InputError> {
        let config: PlannerConfig = serde_json::from_str(text)?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, InputError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
