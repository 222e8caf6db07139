//! One-call entry point: grid and configuration in, graph and plan out.

use crate::config::PlannerConfig;
use crate::error::Error;
use crate::fleet::RoutePlan;
use crate::graph::{CoverageGraph, GraphBuilder};
use crate::grid::OccupancyGrid;
use crate::heuristics::GreedyInsertionSolver;
use indicatif::ProgressBar;

pub struct Planner {
    builder: GraphBuilder,
    solver: GreedyInsertionSolver,
}

impl Planner {
    /// Validate the configuration up front so that bad values never reach
    /// graph construction.
    pub fn new(config: PlannerConfig) -> Result<Self, Error> {
        let solver = GreedyInsertionSolver::new(config.solver)?;
        Ok(Planner {
            builder: GraphBuilder::new(config.graph),
            solver,
        })
    }

    pub fn solver(&self) -> &GreedyInsertionSolver {
        &self.solver
    }

    pub fn build_graph(&self, grid: &OccupancyGrid) -> Result<CoverageGraph, Error> {
        Ok(self.builder.build(grid)?)
    }

    pub fn plan(&self, grid: &OccupancyGrid) -> Result<(CoverageGraph, RoutePlan), Error> {
        self.plan_with_progress(grid, &ProgressBar::hidden())
    }

    pub fn plan_with_progress(
        &self,
        grid: &OccupancyGrid,
        progress: &ProgressBar,
    ) -> Result<(CoverageGraph, RoutePlan), Error> {
        let graph = self.build_graph(grid)?;
        let plan = self.solver.solve_with_progress(&graph, progress)?;
        Ok((graph, plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InputError;

    #[test]
    fn test_plan_open_grid() {
        let grid: OccupancyGrid = "0 0 0\n0 0 0\n0 0 0\n".parse().unwrap();
        let mut config = PlannerConfig::default();
        config.graph.anchor = 4;
        config.solver.agents = 2;

        let (graph, plan) = Planner::new(config).unwrap().plan(&grid).unwrap();
        assert_eq!(graph.anchor, 4);
        assert_eq!(plan.fleet.num_agents(), 2);
        assert!(plan.complete);
        assert_eq!(plan.fleet.assigned_count(), 8);
    }

    #[test]
    fn test_bad_anchor_rejected_before_solving() {
        let grid: OccupancyGrid = "0 0\n".parse().unwrap();
        let mut config = PlannerConfig::default();
        config.graph.anchor = 9;

        let err = Planner::new(config).unwrap().plan(&grid).unwrap_err();
        assert!(matches!(err, Error::Input(InputError::AnchorOutOfBounds { .. })));
    }

    #[test]
    fn test_zero_agents_rejected() {
        let mut config = PlannerConfig::default();
        config.solver.agents = 0;
        assert!(matches!(Planner::new(config), Err(Error::Input(InputError::NoAgents))));
    }
}
