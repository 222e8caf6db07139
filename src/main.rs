//! Coverage VRP Solver - Command Line Interface
//!
//! Plans min-max coverage tours for a fleet of agents on occupancy grids.

use clap::{Parser, Subcommand, ValueEnum};
use coverage_vrp_solver::benchmark::{load_grids_from_dir, random_grids, Benchmark, BenchmarkConfig};
use coverage_vrp_solver::config::PlannerConfig;
use coverage_vrp_solver::error::{InputError, SolveError};
use coverage_vrp_solver::fleet::RoutePlan;
use coverage_vrp_solver::graph::{CoverageGraph, GraphBuilder};
use coverage_vrp_solver::grid::OccupancyGrid;
use coverage_vrp_solver::heuristics::{FleetConstruction, GreedyInsertionSolver};
use coverage_vrp_solver::oracle::{AllPairsPaths, BreadthFirst, FloydWarshall, ShortestPathOracle};
use coverage_vrp_solver::visualization::Visualizer;

use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "coverage-vrp-solver")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Min-max multi-agent coverage planning on occupancy grids")]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan coverage tours for a grid
    Solve {
        /// Path to the grid file
        #[arg(short, long)]
        grid: PathBuf,

        /// JSON planner configuration; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of agents
        #[arg(short, long)]
        agents: Option<usize>,

        /// Anchor node index (row * width + col)
        #[arg(long)]
        anchor: Option<usize>,

        /// Lattice step between neighbouring cells
        #[arg(long)]
        step: Option<f64>,

        /// Locality margin added to the neighbour distance
        #[arg(long)]
        fov_margin: Option<f64>,

        /// Evaluate candidate nodes in parallel
        #[arg(long)]
        parallel: bool,

        /// Retry a failed solve this many times with a larger margin
        #[arg(long, default_value = "0")]
        relax_retries: usize,

        /// Margin increase per retry
        #[arg(long, default_value = "1.0")]
        relax_step: f64,

        /// Output plan to JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Generate SVG visualization
        #[arg(long)]
        visualize: bool,

        /// Also render the visualization to PNG
        #[arg(long)]
        png: bool,

        /// Shortest path queries to print, as FROM:TO
        #[arg(long = "path", value_name = "FROM:TO")]
        paths: Vec<String>,

        /// All-pairs shortest path algorithm for diagnostics
        #[arg(long, value_enum, default_value = "floyd-warshall")]
        oracle: Oracle,
    },

    /// Print statistics of a grid and its coverage graph
    Analyze {
        /// Path to the grid file
        #[arg(short, long)]
        grid: PathBuf,

        /// Anchor node index
        #[arg(long, default_value = "0")]
        anchor: usize,

        /// Lattice step between neighbouring cells
        #[arg(long, default_value = "2.0")]
        step: f64,
    },

    /// Shortest path between two cells of a grid
    Path {
        /// Path to the grid file
        #[arg(short, long)]
        grid: PathBuf,

        #[arg(long)]
        from: usize,

        #[arg(long)]
        to: usize,

        #[arg(long, value_enum, default_value = "breadth-first")]
        oracle: Oracle,
    },

    /// Run benchmarks on grid files and/or random grids
    Benchmark {
        /// Directory containing grid files (.txt or .grid)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Number of random grids to generate
        #[arg(long, default_value = "0")]
        random: usize,

        /// Width of random grids
        #[arg(long, default_value = "20")]
        width: usize,

        /// Height of random grids
        #[arg(long, default_value = "20")]
        height: usize,

        /// Obstacle probability of random grids
        #[arg(long, default_value = "0.2")]
        obstacles: f64,

        /// Seed of the first random grid
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Agent counts to try
        #[arg(short, long, value_delimiter = ',', default_value = "1,2,3,4")]
        agents: Vec<usize>,

        /// Anchor node index; first free cell of each grid by default
        #[arg(long)]
        anchor: Option<usize>,

        #[arg(long, default_value = "2.0")]
        step: f64,

        #[arg(long, default_value = "2.0")]
        fov_margin: f64,

        /// Run jobs one after another
        #[arg(long)]
        sequential: bool,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Oracle {
    /// Floyd-Warshall, O(N^3)
    FloydWarshall,
    /// One breadth-first search per node, in parallel
    BreadthFirst,
}

impl Oracle {
    fn build(self) -> Box<dyn ShortestPathOracle> {
        match self {
            Oracle::FloydWarshall => Box::new(FloydWarshall),
            Oracle::BreadthFirst => Box::new(BreadthFirst),
        }
    }
}

struct SolveOptions {
    config: Option<PathBuf>,
    agents: Option<usize>,
    anchor: Option<usize>,
    step: Option<f64>,
    fov_margin: Option<f64>,
    parallel: bool,
    relax_retries: usize,
    relax_step: f64,
    output: Option<PathBuf>,
    visualize: bool,
    png: bool,
    paths: Vec<String>,
    oracle: Oracle,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Solve {
            grid,
            config,
            agents,
            anchor,
            step,
            fov_margin,
            parallel,
            relax_retries,
            relax_step,
            output,
            visualize,
            png,
            paths,
            oracle,
        } => {
            let options = SolveOptions {
                config,
                agents,
                anchor,
                step,
                fov_margin,
                parallel,
                relax_retries,
                relax_step,
                output,
                visualize,
                png,
                paths,
                oracle,
            };
            solve_grid(&grid, options, cli.verbose);
        }

        Commands::Analyze { grid, anchor, step } => {
            analyze_grid(&grid, anchor, step);
        }

        Commands::Path { grid, from, to, oracle } => {
            shortest_path(&grid, from, to, oracle);
        }

        Commands::Benchmark {
            dir,
            random,
            width,
            height,
            obstacles,
            seed,
            agents,
            anchor,
            step,
            fov_margin,
            sequential,
            output,
        } => {
            let config = BenchmarkConfig {
                agent_counts: agents,
                anchor,
                step,
                fov_margin,
                parallel: !sequential,
                show_progress: true,
                output_dir: output.to_string_lossy().to_string(),
            };
            run_benchmark(dir.as_deref(), random, (width, height, obstacles, seed), config);
        }
    }
}

fn load_grid(path: &Path) -> OccupancyGrid {
    match OccupancyGrid::from_file(path) {
        Ok(grid) => grid,
        Err(e) => {
            eprintln!("Error loading grid: {}", e);
            std::process::exit(1);
        }
    }
}

fn build_graph(grid: &OccupancyGrid, config: &PlannerConfig) -> CoverageGraph {
    match GraphBuilder::new(config.graph.clone()).build(grid) {
        Ok(graph) => graph,
        Err(e) => {
            eprintln!("Error building graph: {}", e);
            std::process::exit(1);
        }
    }
}

fn solve_grid(path: &Path, options: SolveOptions, verbose: bool) {
    println!("Loading grid from {:?}...", path);
    let grid = load_grid(path);

    let mut config = match &options.config {
        Some(config_path) => match PlannerConfig::from_file(config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading configuration: {}", e);
                std::process::exit(1);
            }
        },
        None => PlannerConfig::default(),
    };
    if let Some(agents) = options.agents {
        config.solver.agents = agents;
    }
    if let Some(anchor) = options.anchor {
        config.graph.anchor = anchor;
    }
    if let Some(step) = options.step {
        config.graph.step = step;
    }
    if let Some(margin) = options.fov_margin {
        config.solver.fov_margin = margin;
    }
    config.solver.parallel |= options.parallel;

    if verbose {
        println!("{}", grid.statistics());
    }

    let graph = build_graph(&grid, &config);

    let mut attempt = 0;
    let plan = loop {
        let solver = match GreedyInsertionSolver::new(config.solver.clone()) {
            Ok(solver) => solver,
            Err(e) => {
                eprintln!("Invalid solver configuration: {}", e);
                std::process::exit(1);
            }
        };

        println!(
            "Solving with {} ({} agents, margin {})...",
            solver.name(),
            config.solver.agents,
            config.solver.fov_margin
        );

        let progress = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} nodes placed") {
            progress.set_style(style);
        }

        match solver.solve_with_progress(&graph, &progress) {
            Ok(plan) => break plan,
            Err(e) => {
                report_failure(&graph, &e);
                if attempt >= options.relax_retries {
                    std::process::exit(1);
                }
                attempt += 1;
                config.solver.fov_margin += options.relax_step;
                log::warn!(
                    "Retrying with margin {} (attempt {}/{})",
                    config.solver.fov_margin,
                    attempt,
                    options.relax_retries
                );
            }
        }
    };

    println!("\n{}", plan);

    let needs_paths = verbose || !options.paths.is_empty();
    if needs_paths {
        let start = Instant::now();
        let oracle = options.oracle.build();
        let paths = oracle.compute_all_pairs(&graph.adjacency);
        log::debug!(
            "{} all-pairs shortest paths in {:.4}s",
            oracle.name(),
            start.elapsed().as_secs_f64()
        );

        for query in &options.paths {
            match parse_query(query) {
                Some((from, to)) if from < paths.len() && to < paths.len() => {
                    println!("{}", paths.query(from, to));
                }
                _ => eprintln!("Ignoring malformed path query '{}'", query),
            }
        }

        if verbose {
            print_hop_report(&plan, &paths);
        }
    }

    if let Some(output_path) = options.output {
        match serde_json::to_string_pretty(&plan) {
            Ok(json) => match std::fs::write(&output_path, json) {
                Ok(()) => println!("Plan saved to {:?}", output_path),
                Err(e) => eprintln!("Failed to write plan: {}", e),
            },
            Err(e) => eprintln!("Failed to serialize plan: {}", e),
        }
    }

    if options.visualize {
        let viz = Visualizer::new();
        let svg = viz.generate_svg(&graph, &plan);
        let svg_path = path.with_extension("svg");
        if let Err(e) = viz.save_svg(&svg, &svg_path) {
            eprintln!("Failed to save SVG: {}", e);
        } else {
            println!("Visualization saved to {:?}", svg_path);
        }

        let lengths_svg = viz.generate_lengths_svg(&plan);
        let lengths_path = path.with_extension("lengths.svg");
        if let Err(e) = viz.save_svg(&lengths_svg, &lengths_path) {
            eprintln!("Failed to save tour length chart: {}", e);
        }

        if options.png {
            let png_path = path.with_extension("png");
            match viz.save_png(&svg, &png_path) {
                Ok(()) => println!("PNG saved to {:?}", png_path),
                Err(e) => eprintln!("Failed to save PNG: {}", e),
            }
        }
    }
}

fn report_failure(graph: &CoverageGraph, error: &SolveError) {
    eprintln!("Solve failed: {}", error);
    let partial = error.partial();
    eprintln!(
        "  Partial fleet: {} node(s) placed, longest tour {:.2}, {} iteration(s)",
        partial.fleet.assigned_count(),
        partial.fleet.max_length(graph),
        partial.iterations
    );
    eprintln!("  Unvisited: {:?}", partial.unvisited);
}

fn print_hop_report(plan: &RoutePlan, paths: &AllPairsPaths) {
    println!("Graph hops per tour (largest consecutive gap):");
    for (agent, tour) in plan.fleet.tours().iter().enumerate() {
        match tour.max_graph_hops(paths) {
            Some(hops) => println!("  #{}: {} hop(s)", agent, hops),
            None => println!("  #{}: contains an unreachable step", agent),
        }
    }
}

fn parse_query(query: &str) -> Option<(usize, usize)> {
    let (from, to) = query.split_once(':')?;
    Some((from.trim().parse().ok()?, to.trim().parse().ok()?))
}

fn analyze_grid(path: &Path, anchor: usize, step: f64) {
    let grid = load_grid(path);
    println!("{}", grid.statistics());

    let mut config = PlannerConfig::default();
    config.graph.anchor = anchor;
    config.graph.step = step;
    let graph = build_graph(&grid, &config);

    let labels = graph.adjacency.connected_components();
    let free = graph.free_nodes();
    let mut free_components: Vec<usize> = free.iter().map(|&i| labels[i]).collect();
    free_components.sort_unstable();
    free_components.dedup();

    println!("Coverage graph:");
    println!("  Anchor: {}", graph.anchor);
    println!("  Nodes to cover: {}", free.len());
    println!("  Edges: {}", graph.adjacency.edge_count());
    println!("  Symmetric: {}", graph.adjacency.is_symmetric());
    println!("  Components among free cells: {}", free_components.len());
    println!("  Isolated free cells: {:?}", graph.isolated_free_nodes());
    println!("  Minimum node spacing: {:.4}", graph.min_node_spacing());

    if let Ok(solver) = GreedyInsertionSolver::new(config.solver) {
        println!("  Locality threshold (default margin): {:.4}", solver.locality_threshold(&graph));
    }
}

fn shortest_path(path: &Path, from: usize, to: usize, oracle: Oracle) {
    let grid = load_grid(path);
    if from >= grid.len() || to >= grid.len() {
        let node = from.max(to);
        eprintln!("Error: {}", InputError::NodeOutOfBounds { node, nodes: grid.len() });
        std::process::exit(1);
    }

    let mut config = PlannerConfig::default();
    config.graph.anchor = from;
    let graph = build_graph(&grid, &config);

    let oracle = oracle.build();
    let start = Instant::now();
    let paths = oracle.compute_all_pairs(&graph.adjacency);
    println!("{}", paths.query(from, to));
    println!("({} in {:.4}s)", oracle.name(), start.elapsed().as_secs_f64());
}

fn run_benchmark(
    dir: Option<&Path>,
    random: usize,
    random_shape: (usize, usize, f64, u64),
    config: BenchmarkConfig,
) {
    let mut grids = Vec::new();

    if let Some(dir) = dir {
        println!("Loading grids from {:?}...", dir);
        grids.extend(load_grids_from_dir(dir));
    }

    if random > 0 {
        let (width, height, obstacles, seed) = random_shape;
        match random_grids(random, width, height, obstacles, seed) {
            Ok(generated) => grids.extend(generated),
            Err(e) => {
                eprintln!("Error generating grids: {}", e);
                std::process::exit(1);
            }
        }
    }

    if grids.is_empty() {
        eprintln!("No grids to benchmark (use --dir and/or --random)");
        std::process::exit(1);
    }

    println!("Benchmarking {} grids with agent counts {:?}", grids.len(), config.agent_counts);

    let output_dir = PathBuf::from(&config.output_dir);
    if let Err(e) = std::fs::create_dir_all(&output_dir) {
        eprintln!("Cannot create output directory {:?}: {}", output_dir, e);
        std::process::exit(1);
    }

    let mut benchmark = Benchmark::new(config);
    let start = Instant::now();
    benchmark.run_on_grids(&grids);
    println!("Benchmark finished in {:.2}s", start.elapsed().as_secs_f64());

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let results_path = output_dir.join(format!("results_{}.csv", timestamp));
    let stats_path = output_dir.join(format!("statistics_{}.csv", timestamp));
    let report_path = output_dir.join(format!("report_{}.txt", timestamp));

    if let Err(e) = benchmark.export_to_csv(&results_path) {
        eprintln!("Failed to export results: {}", e);
    }
    if let Err(e) = benchmark.export_statistics_csv(&stats_path) {
        eprintln!("Failed to export statistics: {}", e);
    }

    let report = benchmark.generate_report();
    println!("\n{}", report);
    if let Err(e) = std::fs::write(&report_path, &report) {
        eprintln!("Failed to write report: {}", e);
    }

    println!("Results written to {:?}", output_dir);
}
