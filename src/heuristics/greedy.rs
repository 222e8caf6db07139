use crate::error::{InputError, PartialSolve, SolveError};
use crate::fleet::{Fleet, RoutePlan, Tour};
use crate::graph::CoverageGraph;
use crate::heuristics::FleetConstruction;
use indicatif::ProgressBar;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// sqrt(2) rounded up so that diagonal neighbours still pass the `<=`
/// locality check after floating-point rounding.
pub const SQRT2_CEIL: f64 = 1.4143;

/// Configuration of the greedy insertion solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Number of agents (tours)
    pub agents: usize,
    /// Extra distance added to the minimal lattice distance when filtering
    /// insertion positions by locality
    pub fov_margin: f64,
    /// Evaluate candidate nodes in parallel
    pub parallel: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            agents: 3,
            fov_margin: 2.0,
            parallel: false,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), InputError> {
        if self.agents == 0 {
            return Err(InputError::NoAgents);
        }
        if !self.fov_margin.is_finite() || self.fov_margin < 0.0 {
            return Err(InputError::InvalidFovMargin(self.fov_margin));
        }
        Ok(())
    }
}

/// Best candidate found so far during one greedy step
#[derive(Debug, Clone, Copy, PartialEq)]
struct Choice {
    /// Position of the node in the unvisited pool
    slot: usize,
    node: usize,
    tour: usize,
    /// Insertion index in the tour (1..len)
    position: usize,
    /// Length of the tour after insertion
    length: f64,
    /// `length - current max`: change of the min-max objective
    score: f64,
}

impl Choice {
    /// Strict improvement keeps the first candidate on ties
    fn improves_on(&self, best: &Option<Choice>) -> bool {
        best.as_ref().map_or(true, |b| self.score < b.score)
    }
}

/// Greedy Min-Max Insertion Heuristic
///
/// Gives every agent one starting node (bootstrap), then repeatedly inserts
/// the unvisited node whose cheapest local insertion grows the longest tour
/// the least. Insertions are restricted to tour segments whose both ends lie
/// within the locality threshold of the candidate node.
#[derive(Debug, Clone)]
pub struct GreedyInsertionSolver {
    config: SolverConfig,
}

impl GreedyInsertionSolver {
    pub fn new(config: SolverConfig) -> Result<Self, InputError> {
        config.validate()?;
        Ok(GreedyInsertionSolver { config })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Maximum distance between a candidate node and both ends of the
    /// segment it is inserted into
    pub fn locality_threshold(&self, graph: &CoverageGraph) -> f64 {
        graph.min_node_spacing() * SQRT2_CEIL + self.config.fov_margin
    }

    pub fn solve(&self, graph: &CoverageGraph) -> Result<RoutePlan, SolveError> {
        self.solve_with_progress(graph, &ProgressBar::hidden())
    }

    /// Run the solver, advancing `progress` once per placed node.
    pub fn solve_with_progress(
        &self,
        graph: &CoverageGraph,
        progress: &ProgressBar,
    ) -> Result<RoutePlan, SolveError> {
        let start = std::time::Instant::now();
        let threshold = self.locality_threshold(graph);

        let mut fleet = Fleet::new(graph.anchor, self.config.agents);
        let mut unvisited = graph.free_nodes();

        log::info!(
            "Planning {} free nodes for {} agents (anchor {}, threshold {:.4})",
            unvisited.len(),
            self.config.agents,
            graph.anchor,
            threshold
        );
        progress.set_length(unvisited.len() as u64);

        self.bootstrap(graph, &mut fleet, &mut unvisited, progress);

        let mut iterations = 0;
        while !unvisited.is_empty() {
            let current_max = fleet.max_length(graph);

            let choice = match self.best_choice(graph, &fleet, &unvisited, current_max, threshold) {
                Some(choice) => choice,
                None => {
                    progress.abandon();
                    return Err(self.infeasible(graph, fleet, unvisited, iterations, threshold));
                }
            };

            fleet.insert(choice.tour, choice.position, choice.node);
            unvisited.remove(choice.slot);
            iterations += 1;
            progress.inc(1);

            log::debug!(
                "Inserted node {} into tour {} at {} (length {:.3}, score {:.3}), {} left",
                choice.node,
                choice.tour,
                choice.position,
                choice.length,
                choice.score,
                unvisited.len()
            );
        }
        progress.finish_and_clear();

        let mut plan = RoutePlan::from_fleet(graph, fleet, self.name());
        plan.iterations = iterations;
        plan.computation_time = start.elapsed().as_secs_f64();

        log::info!(
            "Plan ready: max tour {:.2}, total {:.2}, {} iterations in {:.4}s",
            plan.max_length,
            plan.total_length,
            iterations,
            plan.computation_time
        );
        Ok(plan)
    }

    /// Give every agent, in fleet order, the unvisited node closest to the
    /// anchor as its first stop. The node goes between the two anchor
    /// occurrences so the tour stays a cycle.
    fn bootstrap(
        &self,
        graph: &CoverageGraph,
        fleet: &mut Fleet,
        unvisited: &mut Vec<usize>,
        progress: &ProgressBar,
    ) {
        for agent in 0..fleet.num_agents() {
            let tour = fleet.tour(agent);
            let best = unvisited
                .iter()
                .enumerate()
                .map(|(slot, &node)| (slot, node, insertion_length(graph, tour, 1, node)))
                .min_by_key(|&(_, _, length)| OrderedFloat(length));

            let Some((slot, node, length)) = best else {
                log::debug!("No free node left for agent {}", agent);
                break;
            };

            fleet.insert(agent, 1, node);
            unvisited.remove(slot);
            progress.inc(1);
            log::debug!("Agent {} starts with node {} (length {:.3})", agent, node, length);
        }
    }

    /// Global best (node, tour, position) for one balancing iteration
    fn best_choice(
        &self,
        graph: &CoverageGraph,
        fleet: &Fleet,
        unvisited: &[usize],
        current_max: f64,
        threshold: f64,
    ) -> Option<Choice> {
        let evaluate = |(slot, &node): (usize, &usize)| {
            self.best_for_node(graph, fleet, slot, node, current_max, threshold)
        };

        // Parallel evaluation collects per-node results in pool order, so the
        // reduction below sees exactly the sequential candidate order.
        let candidates: Vec<Option<Choice>> = if self.config.parallel {
            unvisited.par_iter().enumerate().map(evaluate).collect()
        } else {
            unvisited.iter().enumerate().map(evaluate).collect()
        };

        candidates.into_iter().flatten().fold(None, |best, choice| {
            if choice.improves_on(&best) {
                Some(choice)
            } else {
                best
            }
        })
    }

    /// Best insertion of one node over all tours.
    ///
    /// Within a tour only positions that shorten the tour's best length so far
    /// are scored, and each of them competes with the running best as soon as
    /// it is found.
    fn best_for_node(
        &self,
        graph: &CoverageGraph,
        fleet: &Fleet,
        slot: usize,
        node: usize,
        current_max: f64,
        threshold: f64,
    ) -> Option<Choice> {
        let mut best: Option<Choice> = None;

        for (agent, tour) in fleet.tours().iter().enumerate() {
            let mut tour_best = f64::INFINITY;
            for position in local_positions(graph, tour, node, threshold) {
                let length = insertion_length(graph, tour, position, node);
                if length >= tour_best {
                    continue;
                }
                tour_best = length;

                let choice = Choice {
                    slot,
                    node,
                    tour: agent,
                    position,
                    length,
                    score: length - current_max,
                };
                if choice.improves_on(&best) {
                    best = Some(choice);
                }
            }
        }

        best
    }

    fn infeasible(
        &self,
        graph: &CoverageGraph,
        fleet: Fleet,
        unvisited: Vec<usize>,
        iterations: usize,
        threshold: f64,
    ) -> SolveError {
        let disconnected: Vec<usize> = unvisited
            .iter()
            .copied()
            .filter(|&n| graph.adjacency.degree(n) == 0)
            .collect();

        log::warn!(
            "No feasible insertion after {} iterations: {} node(s) left, threshold {:.4}",
            iterations,
            unvisited.len(),
            threshold
        );

        let partial = Box::new(PartialSolve {
            fleet,
            unvisited,
            iterations,
        });

        if disconnected.is_empty() {
            SolveError::InfeasibleInsertion { threshold, partial }
        } else {
            SolveError::DisconnectedNode {
                nodes: disconnected,
                threshold,
                partial,
            }
        }
    }
}

impl FleetConstruction for GreedyInsertionSolver {
    fn construct(&self, graph: &CoverageGraph) -> Result<RoutePlan, SolveError> {
        self.solve(graph)
    }

    fn name(&self) -> &str {
        if self.config.parallel {
            "GreedyMinMaxInsertion-Parallel"
        } else {
            "GreedyMinMaxInsertion"
        }
    }
}

/// Length of `tour` with `node` inserted before index `position`, summed
/// edge by edge from the anchor without building the new tour.
fn insertion_length(graph: &CoverageGraph, tour: &Tour, position: usize, node: usize) -> f64 {
    let (head, tail) = tour.nodes().split_at(position);
    let mut nodes = head.iter().chain(std::iter::once(&node)).chain(tail);

    let Some(&first) = nodes.next() else {
        return 0.0;
    };
    let mut length = 0.0;
    let mut prev = first;
    for &next in nodes {
        length += graph.distance(prev, next);
        prev = next;
    }
    length
}

/// Insertion positions of `node` in `tour` whose both segment ends lie
/// within `threshold` of the node
fn local_positions<'a>(
    graph: &'a CoverageGraph,
    tour: &'a Tour,
    node: usize,
    threshold: f64,
) -> impl Iterator<Item = usize> + 'a {
    (1..tour.len()).filter(move |&position| {
        let prev = tour.nodes()[position - 1];
        let next = tour.nodes()[position];
        graph.distance(prev, node) <= threshold && graph.distance(node, next) <= threshold
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, GraphConfig};
    use crate::grid::OccupancyGrid;

    fn build(text: &str, anchor: usize) -> CoverageGraph {
        let grid: OccupancyGrid = text.parse().unwrap();
        GraphBuilder::new(GraphConfig { anchor, step: 2.0 })
            .build(&grid)
            .unwrap()
    }

    fn solver(agents: usize) -> GreedyInsertionSolver {
        GreedyInsertionSolver::new(SolverConfig {
            agents,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(matches!(
            GreedyInsertionSolver::new(SolverConfig { agents: 0, ..Default::default() }),
            Err(InputError::NoAgents)
        ));
        assert!(matches!(
            GreedyInsertionSolver::new(SolverConfig { fov_margin: -1.0, ..Default::default() }),
            Err(InputError::InvalidFovMargin(_))
        ));
        assert!(matches!(
            GreedyInsertionSolver::new(SolverConfig { fov_margin: f64::NAN, ..Default::default() }),
            Err(InputError::InvalidFovMargin(_))
        ));
    }

    #[test]
    fn test_locality_threshold() {
        let graph = build("0 0\n0 0\n", 0);
        let threshold = solver(1).locality_threshold(&graph);
        assert!((threshold - (2.0 * SQRT2_CEIL + 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_bootstrap_picks_nearest_node() {
        let graph = build("0 0 0\n0 0 0\n", 0);
        let plan = solver(1).solve(&graph).unwrap();

        // Nodes 1 and 3 are both at distance 2; the first one wins
        let mut fleet = Fleet::new(0, 1);
        let mut unvisited = graph.free_nodes();
        solver(1).bootstrap(&graph, &mut fleet, &mut unvisited, &ProgressBar::hidden());
        assert_eq!(fleet.tour(0).nodes()[1], 1);
        assert_eq!(unvisited, vec![2, 3, 4, 5]);

        assert_eq!(plan.fleet.tour(0).nodes(), &[0, 3, 4, 5, 2, 1, 0]);
        assert!(plan.complete);
        assert_eq!(plan.iterations, 4);
    }

    #[test]
    fn test_single_agent_covers_everything() {
        let graph = build("0 0 0\n0 0 0\n", 0);
        let plan = solver(1).solve(&graph).unwrap();
        let tour = plan.fleet.tour(0);

        assert_eq!(tour.len(), 7);
        assert!(tour.is_closed());
        let mut interior = tour.interior().to_vec();
        interior.sort();
        assert_eq!(interior, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_more_agents_than_free_nodes() {
        let graph = build("0 0 1\n1 1 1\n", 0);
        let plan = solver(3).solve(&graph).unwrap();

        assert_eq!(plan.fleet.tour(0).nodes(), &[0, 1, 0]);
        assert!(plan.fleet.tour(1).is_trivial());
        assert!(plan.fleet.tour(2).is_trivial());
        assert!(plan.complete);
    }

    #[test]
    fn test_fully_occupied_grid() {
        let graph = build("1 1\n1 1\n", 0);
        let plan = solver(2).solve(&graph).unwrap();

        assert!(plan.fleet.tours().iter().all(|t| t.nodes() == [0, 0]));
        assert_eq!(plan.max_length, 0.0);
        assert!(plan.complete);
    }

    #[test]
    fn test_infeasible_insertion_reports_partial_fleet() {
        let graph = build("0 0 0 0 0 0 0\n", 0);
        let strict = GreedyInsertionSolver::new(SolverConfig {
            agents: 1,
            fov_margin: 0.0,
            parallel: false,
        })
        .unwrap();

        let err = strict.solve(&graph).unwrap_err();
        match &err {
            SolveError::InfeasibleInsertion { partial, .. } => {
                assert_eq!(partial.fleet.tour(0).nodes(), &[0, 1, 0]);
                assert_eq!(partial.unvisited, vec![2, 3, 4, 5, 6]);
                assert_eq!(partial.iterations, 0);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!((err.threshold() - 2.0 * SQRT2_CEIL).abs() < 1e-12);
    }

    #[test]
    fn test_disconnected_node_is_reported() {
        let graph = build("0 0 1 1 0\n", 0);
        let err = solver(1).solve(&graph).unwrap_err();

        match err {
            SolveError::DisconnectedNode { nodes, partial, .. } => {
                assert_eq!(nodes, vec![4]);
                assert_eq!(partial.unvisited, vec![4]);
                assert!(partial.fleet.tour(0).is_closed());
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let grid = OccupancyGrid::random(7, 6, 0.15, 3).unwrap();
        let anchor = (0..grid.len()).find(|&i| grid.is_free(i)).unwrap();
        let graph = GraphBuilder::new(GraphConfig { anchor, step: 2.0 })
            .build(&grid)
            .unwrap();

        let config = SolverConfig {
            agents: 3,
            fov_margin: 100.0,
            parallel: false,
        };
        let sequential = GreedyInsertionSolver::new(config.clone()).unwrap().solve(&graph).unwrap();
        let parallel = GreedyInsertionSolver::new(SolverConfig { parallel: true, ..config })
            .unwrap()
            .solve(&graph)
            .unwrap();

        assert_eq!(sequential.fleet, parallel.fleet);
        assert!(sequential.complete);
    }

    #[test]
    fn test_local_positions_respect_threshold() {
        let graph = build("0 0 0 0 0\n", 0);
        let mut tour = Tour::new(0);
        tour.insert(1, 1);

        // Node 4 sits 8 away from the anchor and 6 from node 1
        assert_eq!(local_positions(&graph, &tour, 4, 5.0).count(), 0);

        let positions: Vec<usize> = local_positions(&graph, &tour, 2, 5.0).collect();
        assert_eq!(positions, vec![1, 2]);
        assert_eq!(insertion_length(&graph, &tour, 1, 2), 8.0);
        assert_eq!(insertion_length(&graph, &tour, 2, 2), 8.0);
    }

    #[test]
    fn test_insertion_length_matches_built_tour() {
        let graph = build("0 0 0 0 0\n0 0 0 0 0\n0 0 0 0 0\n", 0);
        let mut tour = Tour::new(0);
        for (position, node) in [(1, 7), (2, 8), (3, 1)] {
            tour.insert(position, node);
        }

        for position in 1..tour.len() {
            let mut built = tour.clone();
            built.insert(position, 13);
            assert_eq!(insertion_length(&graph, &tour, position, 13), built.length(&graph));
        }
    }

    #[test]
    fn test_equal_lengths_keep_first_candidate() {
        let graph = build("0 0 0 0 0\n0 0 0 0 0\n0 0 0 0 0\n", 0);

        // Node 13 costs exactly the same in tour 0 and in tour 2
        let mut first = Tour::new(0);
        for (position, node) in [(1, 7), (2, 8), (3, 1)] {
            first.insert(position, node);
        }
        let mut third = Tour::new(0);
        for (position, node) in [(1, 11), (2, 12), (3, 6)] {
            third.insert(position, node);
        }
        assert_eq!(
            insertion_length(&graph, &first, 2, 13),
            insertion_length(&graph, &third, 3, 13)
        );

        let plan = GreedyInsertionSolver::new(SolverConfig {
            agents: 4,
            fov_margin: 100.0,
            parallel: false,
        })
        .unwrap()
        .solve(&graph)
        .unwrap();

        let tours: Vec<&[usize]> = plan.fleet.tours().iter().map(|t| t.nodes()).collect();
        assert_eq!(
            tours,
            vec![
                &[0, 7, 13, 14, 8, 1, 0][..],
                &[0, 10, 5, 0][..],
                &[0, 11, 12, 6, 0][..],
                &[0, 9, 4, 3, 2, 0][..],
            ]
        );
    }

    #[test]
    fn test_each_step_takes_the_smallest_growth() {
        let graph = build("0 0 0\n0 0 0\n", 0);
        let solver = solver(1);
        let threshold = solver.locality_threshold(&graph);

        let mut fleet = Fleet::new(0, 1);
        let mut unvisited = graph.free_nodes();
        solver.bootstrap(&graph, &mut fleet, &mut unvisited, &ProgressBar::hidden());
        assert_eq!(fleet.tour(0).nodes(), &[0, 1, 0]);

        while !unvisited.is_empty() {
            let tour = fleet.tour(0);
            let current = tour.length(&graph);
            let choice = solver
                .best_choice(&graph, &fleet, &unvisited, current, threshold)
                .unwrap();

            for &node in &unvisited {
                for position in local_positions(&graph, tour, node, threshold) {
                    let growth = insertion_length(&graph, tour, position, node) - current;
                    assert!(
                        choice.length - current <= growth,
                        "node {} chosen over node {} at {}",
                        choice.node,
                        node,
                        position
                    );
                }
            }

            fleet.insert(choice.tour, choice.position, choice.node);
            unvisited.remove(choice.slot);
        }

        assert_eq!(fleet.tour(0).nodes(), &[0, 3, 4, 5, 2, 1, 0]);
    }
}
