//! Benchmarking and experimentation module for coverage planning.
//!
//! Runs the planner over sets of grids and agent counts, collects
//! statistics and exports them for comparison.

use crate::config::PlannerConfig;
use crate::error::{Error, SolveError};
use crate::graph::GraphConfig;
use crate::grid::OccupancyGrid;
use crate::heuristics::SolverConfig;
use crate::planner::Planner;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// Result of planning one grid with one agent count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Grid name
    pub grid: String,
    pub width: usize,
    pub height: usize,
    /// Free cells (anchor excluded)
    pub free_cells: usize,
    /// Number of agents
    pub agents: usize,
    pub anchor: usize,
    /// Longest tour length (of the partial fleet when the solve failed)
    pub max_length: f64,
    /// Sum of all tour lengths
    pub total_length: f64,
    /// Longest tour over mean tour length
    pub imbalance: f64,
    /// Computation time in seconds
    pub time: f64,
    /// Balancing iterations
    pub iterations: usize,
    /// Whether every free cell was covered
    pub complete: bool,
    /// complete, infeasible, disconnected or input-error
    pub status: String,
}

/// Aggregated statistics for one agent count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatistics {
    pub agents: usize,
    /// Number of grids planned
    pub num_grids: usize,
    /// Number of complete plans
    pub num_complete: usize,
    pub avg_max_length: f64,
    pub std_max_length: f64,
    pub best_max_length: f64,
    pub worst_max_length: f64,
    pub avg_imbalance: f64,
    pub avg_time: f64,
    pub total_time: f64,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Agent counts to try on every grid
    pub agent_counts: Vec<usize>,
    /// Anchor cell; the first free cell of each grid when `None`
    pub anchor: Option<usize>,
    /// Lattice step
    pub step: f64,
    /// Locality margin of the solver
    pub fov_margin: f64,
    /// Run grid/agent combinations in parallel
    pub parallel: bool,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
    /// Output directory
    pub output_dir: String,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            agent_counts: vec![1, 2, 3, 4],
            anchor: None,
            step: 2.0,
            fov_margin: 2.0,
            parallel: true,
            show_progress: false,
            output_dir: "results".to_string(),
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<BenchmarkResult>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
        }
    }

    /// Run every configured agent count on every grid
    pub fn run_on_grids(&mut self, grids: &[OccupancyGrid]) {
        let jobs: Vec<(&OccupancyGrid, usize)> = grids
            .iter()
            .flat_map(|grid| self.config.agent_counts.iter().map(move |&agents| (grid, agents)))
            .collect();

        log::info!("Running {} benchmark jobs on {} grids", jobs.len(), grids.len());

        let progress = if self.config.show_progress {
            let bar = ProgressBar::new(jobs.len() as u64);
            if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}") {
                bar.set_style(style);
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        let config = &self.config;
        let run = |&(grid, agents): &(&OccupancyGrid, usize)| {
            let result = run_single(config, grid, agents);
            progress.set_message(format!("{} / {} agents", grid.name, agents));
            progress.inc(1);
            result
        };

        let results: Vec<BenchmarkResult> = if config.parallel {
            jobs.par_iter().map(run).collect()
        } else {
            jobs.iter().map(run).collect()
        };
        progress.finish_and_clear();

        self.results.extend(results);
    }

    /// Run every configured agent count on a single grid
    pub fn run_grid(&mut self, grid: &OccupancyGrid) {
        self.run_on_grids(std::slice::from_ref(grid));
    }

    /// Compute statistics for each agent count
    pub fn compute_statistics(&self) -> Vec<AgentStatistics> {
        let mut by_agents: BTreeMap<usize, Vec<&BenchmarkResult>> = BTreeMap::new();
        for result in &self.results {
            by_agents.entry(result.agents).or_default().push(result);
        }

        let mut statistics = Vec::new();
        for (agents, results) in by_agents {
            let complete: Vec<&&BenchmarkResult> = results.iter().filter(|r| r.complete).collect();
            if complete.is_empty() {
                continue;
            }

            let maxes: Vec<f64> = complete.iter().map(|r| r.max_length).collect();
            let imbalances: Vec<f64> = complete.iter().map(|r| r.imbalance).collect();
            let times: Vec<f64> = complete.iter().map(|r| r.time).collect();

            let std_max_length = if maxes.len() > 1 { maxes.iter().std_dev() } else { 0.0 };

            statistics.push(AgentStatistics {
                agents,
                num_grids: results.len(),
                num_complete: complete.len(),
                avg_max_length: maxes.iter().mean(),
                std_max_length,
                best_max_length: maxes.iter().cloned().fold(f64::INFINITY, f64::min),
                worst_max_length: maxes.iter().cloned().fold(0.0, f64::max),
                avg_imbalance: imbalances.iter().mean(),
                avg_time: times.iter().mean(),
                total_time: times.iter().sum(),
            });
        }

        statistics
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for result in &self.results {
            writer.serialize(result)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("     Coverage Planning Benchmark Report\n");
        report.push_str("========================================\n");
        report.push_str(&format!(
            "Generated: {}\n\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));

        report.push_str("Performance per agent count:\n");
        report.push_str("-".repeat(86).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<8} {:>10} {:>12} {:>10} {:>12} {:>12} {:>10}\n",
            "Agents", "Complete", "Avg Max", "Std", "Best Max", "Imbalance", "Avg Time"
        ));
        report.push_str("-".repeat(86).as_str());
        report.push('\n');

        for stat in self.compute_statistics() {
            report.push_str(&format!(
                "{:<8} {:>10} {:>12.2} {:>10.2} {:>12.2} {:>12.3} {:>10.4}\n",
                stat.agents,
                format!("{}/{}", stat.num_complete, stat.num_grids),
                stat.avg_max_length,
                stat.std_max_length,
                stat.best_max_length,
                stat.avg_imbalance,
                stat.avg_time
            ));
        }

        report.push_str("-".repeat(86).as_str());
        report.push('\n');

        let failures: Vec<&BenchmarkResult> = self.results.iter().filter(|r| !r.complete).collect();
        if !failures.is_empty() {
            report.push_str("\nIncomplete plans:\n");
            for result in failures {
                report.push_str(&format!(
                    "  {} with {} agents: {} (max tour {:.2})\n",
                    result.grid, result.agents, result.status, result.max_length
                ));
            }
        }

        report
    }

    /// Get all results
    pub fn results(&self) -> &[BenchmarkResult] {
        &self.results
    }
}

/// Plan one grid with one agent count and record the outcome
fn run_single(config: &BenchmarkConfig, grid: &OccupancyGrid, agents: usize) -> BenchmarkResult {
    let anchor = config
        .anchor
        .or_else(|| first_free_cell(grid))
        .unwrap_or(0);

    let mut result = BenchmarkResult {
        grid: grid.name.clone(),
        width: grid.width(),
        height: grid.height(),
        free_cells: 0,
        agents,
        anchor,
        max_length: 0.0,
        total_length: 0.0,
        imbalance: 1.0,
        time: 0.0,
        iterations: 0,
        complete: false,
        status: "input-error".to_string(),
    };

    let planner_config = PlannerConfig {
        graph: GraphConfig {
            anchor,
            step: config.step,
        },
        solver: SolverConfig {
            agents,
            fov_margin: config.fov_margin,
            parallel: false,
        },
    };

    let prepared = Planner::new(planner_config).and_then(|p| p.build_graph(grid).map(|g| (p, g)));
    let (planner, graph) = match prepared {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("Cannot plan {} with {} agents: {}", grid.name, agents, e);
            return result;
        }
    };
    result.free_cells = graph.free_nodes().len();

    let start = std::time::Instant::now();
    match planner.solver().solve(&graph) {
        Ok(plan) => {
            result.max_length = plan.max_length;
            result.total_length = plan.total_length;
            result.imbalance = plan.imbalance();
            result.iterations = plan.iterations;
            result.complete = plan.complete;
            result.status = "complete".to_string();
        }
        Err(e) => {
            log::warn!("{} with {} agents: {}", grid.name, agents, e);
            let partial = e.partial();
            result.max_length = partial.fleet.max_length(&graph);
            result.total_length = partial.fleet.total_length(&graph);
            result.iterations = partial.iterations;
            result.status = match e {
                SolveError::InfeasibleInsertion { .. } => "infeasible".to_string(),
                SolveError::DisconnectedNode { .. } => "disconnected".to_string(),
            };
        }
    }
    result.time = start.elapsed().as_secs_f64();

    result
}

/// First free cell of a grid in row-major order
pub fn first_free_cell(grid: &OccupancyGrid) -> Option<usize> {
    (0..grid.len()).find(|&i| grid.is_free(i))
}

/// Seeded random grids for benchmarking
pub fn random_grids(
    count: usize,
    width: usize,
    height: usize,
    obstacle_ratio: f64,
    seed: u64,
) -> Result<Vec<OccupancyGrid>, Error> {
    (0..count as u64)
        .map(|i| Ok(OccupancyGrid::random(width, height, obstacle_ratio, seed.wrapping_add(i))?))
        .collect()
}

/// Helper function to load grids from a directory
pub fn load_grids_from_dir<P: AsRef<Path>>(dir: P) -> Vec<OccupancyGrid> {
    let mut grids = Vec::new();

    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let is_grid = path
                .extension()
                .map(|e| e == "txt" || e == "grid")
                .unwrap_or(false);
            if !is_grid {
                continue;
            }
            match OccupancyGrid::from_file(&path) {
                Ok(grid) => grids.push(grid),
                Err(e) => log::warn!("Skipping {:?}: {}", path, e),
            }
        }
    }

    // Sort by size, then name
    grids.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.name.cmp(&b.name)));

    grids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benchmark_config() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.agent_counts, vec![1, 2, 3, 4]);
        assert!(config.anchor.is_none());
    }

    #[test]
    fn test_benchmark_statistics() {
        let grids = random_grids(3, 5, 4, 0.0, 1).unwrap();
        let mut benchmark = Benchmark::new(BenchmarkConfig {
            agent_counts: vec![1, 2],
            fov_margin: 50.0,
            ..Default::default()
        });
        benchmark.run_on_grids(&grids);

        assert_eq!(benchmark.results().len(), 6);
        assert!(benchmark.results().iter().all(|r| r.complete));

        let stats = benchmark.compute_statistics();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].agents, 1);
        assert_eq!(stats[0].num_complete, 3);
        // Obstacle-free grids of the same size give identical plans
        assert!(stats[0].std_max_length.abs() < 1e-9);
        assert!(stats[1].avg_max_length <= stats[0].avg_max_length);

        let report = benchmark.generate_report();
        assert!(report.contains("Agents"));
    }

    #[test]
    fn test_random_grid_seeds_wrap_around() {
        let grids = random_grids(2, 3, 3, 0.2, u64::MAX).unwrap();
        assert_eq!(grids.len(), 2);
        assert_eq!(grids[1], OccupancyGrid::random(3, 3, 0.2, 0).unwrap());
    }

    #[test]
    fn test_failed_solve_is_recorded() {
        let grid: OccupancyGrid = "0 0 1 1 0\n".parse().unwrap();
        let mut benchmark = Benchmark::new(BenchmarkConfig {
            agent_counts: vec![1],
            parallel: false,
            ..Default::default()
        });
        benchmark.run_grid(&grid);

        let result = &benchmark.results()[0];
        assert!(!result.complete);
        assert_eq!(result.status, "disconnected");
        assert!(benchmark.generate_report().contains("Incomplete plans"));
    }
}
