use coverage_vrp_solver::config::PlannerConfig;
use coverage_vrp_solver::graph::{GraphBuilder, GraphConfig};
use coverage_vrp_solver::grid::OccupancyGrid;
use coverage_vrp_solver::heuristics::{FleetConstruction, GreedyInsertionSolver, SolverConfig};
use coverage_vrp_solver::oracle::{BreadthFirst, FloydWarshall, ShortestPathOracle};
use coverage_vrp_solver::planner::Planner;
use std::path::PathBuf;

fn grid_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("grids").join(name)
}

fn planner(anchor: usize, agents: usize, fov_margin: f64) -> Planner {
    let mut config = PlannerConfig::default();
    config.graph.anchor = anchor;
    config.solver.agents = agents;
    config.solver.fov_margin = fov_margin;
    Planner::new(config).unwrap()
}

fn sorted(nodes: &[usize]) -> Vec<usize> {
    let mut nodes = nodes.to_vec();
    nodes.sort_unstable();
    nodes
}

#[test]
fn single_agent_covers_small_room() {
    let grid: OccupancyGrid = "0 0 0\n0 0 0\n".parse().unwrap();
    let (graph, plan) = planner(0, 1, 2.0).plan(&grid).unwrap();

    let tour = plan.fleet.tour(0);
    assert!(tour.is_closed());
    assert_eq!(sorted(tour.interior()), vec![1, 2, 3, 4, 5]);
    assert!(plan.fleet.coverage(&graph).is_complete());
    assert!((plan.max_length - tour.length(&graph)).abs() < 1e-9);
}

#[test]
fn agents_split_around_single_obstacle() {
    // One blocked cell under the anchor; the two 2x2 halves only meet at the anchor cell
    let grid: OccupancyGrid = "0 0 0 0 0\n0 0 1 0 0\n".parse().unwrap();
    let (graph, plan) = planner(2, 2, 2.0).plan(&grid).unwrap();

    assert!(plan.complete);
    assert_eq!(sorted(plan.fleet.tour(0).interior()), vec![0, 1, 5, 6]);
    assert_eq!(sorted(plan.fleet.tour(1).interior()), vec![3, 4, 8, 9]);

    // Every step of every tour stays within two grid moves
    let paths = BreadthFirst.compute_all_pairs(&graph.adjacency);
    for tour in plan.fleet.tours() {
        let hops = tour.max_graph_hops(&paths).unwrap();
        assert!(hops <= 2, "tour {:?} has a {}-hop step", tour.nodes(), hops);
    }
}

#[test]
fn plans_are_deterministic() {
    let grid = OccupancyGrid::from_file(grid_path("open_4x4.txt")).unwrap();
    let planner = planner(0, 3, 100.0);

    let (_, first) = planner.plan(&grid).unwrap();
    let (_, second) = planner.plan(&grid).unwrap();
    assert_eq!(first.fleet, second.fleet);
    assert_eq!(first.tour_lengths, second.tour_lengths);
}

#[test]
fn parallel_evaluation_gives_the_same_plan() {
    let grid = OccupancyGrid::from_file(grid_path("open_4x4.txt")).unwrap();
    let graph = GraphBuilder::new(GraphConfig { anchor: 5, step: 2.0 })
        .build(&grid)
        .unwrap();

    let sequential = GreedyInsertionSolver::new(SolverConfig {
        agents: 2,
        fov_margin: 100.0,
        ..Default::default()
    })
    .unwrap();
    let parallel = GreedyInsertionSolver::new(SolverConfig {
        agents: 2,
        fov_margin: 100.0,
        parallel: true,
    })
    .unwrap();

    let a = sequential.construct(&graph).unwrap();
    let b = parallel.construct(&graph).unwrap();
    assert_eq!(a.fleet, b.fleet);
    assert_ne!(sequential.name(), parallel.name());
}

#[test]
fn two_rooms_from_config_file() {
    let config = PlannerConfig::from_file(grid_path("planner.json")).unwrap();
    assert_eq!(config.graph.anchor, 5);
    assert_eq!(config.solver.agents, 3);

    let grid = OccupancyGrid::from_file(grid_path("two_rooms.txt")).unwrap();
    assert_eq!((grid.width(), grid.height()), (8, 6));

    // A wide margin makes every segment admissible
    let mut relaxed = config.clone();
    relaxed.solver.fov_margin = 100.0;
    let (graph, plan) = Planner::new(relaxed).unwrap().plan(&grid).unwrap();

    assert!(graph.adjacency.is_symmetric());
    assert_eq!(plan.fleet.num_agents(), 3);
    assert_eq!(plan.fleet.assigned_count(), grid.free_count() - 1);

    let report = plan.fleet.coverage(&graph);
    assert!(report.is_complete(), "{:?}", report);
    assert!(plan.tour_lengths.iter().all(|&l| l <= plan.max_length));
}

#[test]
fn oracles_agree_on_two_rooms() {
    let grid = OccupancyGrid::from_file(grid_path("two_rooms.txt")).unwrap();
    let graph = GraphBuilder::new(GraphConfig { anchor: 5, step: 2.0 })
        .build(&grid)
        .unwrap();

    let fw = FloydWarshall.compute_all_pairs(&graph.adjacency);
    let bfs = BreadthFirst.compute_all_pairs(&graph.adjacency);
    assert_eq!(fw.distances(), bfs.distances());

    // Around the wall: (0,3) -> (2,4) -> (0,5)
    assert_eq!(fw.distance(3, 5), Some(6));
    let path = fw.reconstruct_path(3, 5);
    assert_eq!(path.first(), Some(&3));
    assert_eq!(path.last(), Some(&5));
    assert_eq!(path.len(), 7);
}

#[test]
fn fully_occupied_grid_gives_trivial_tours() {
    let grid: OccupancyGrid = "1 1\n1 1\n".parse().unwrap();
    let (_, plan) = planner(0, 2, 2.0).plan(&grid).unwrap();

    assert!(plan.complete);
    assert!(plan.fleet.tours().iter().all(|t| t.is_trivial()));
    assert_eq!(plan.total_length, 0.0);
}
