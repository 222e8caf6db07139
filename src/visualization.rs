//! Visualization utilities for coverage plans.
//!
//! Generates SVG drawings of the grid with one colored tour per agent, a bar
//! chart of tour lengths, and plain-text exports for plotting.

use crate::fleet::RoutePlan;
use crate::graph::CoverageGraph;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::Command;
#[cfg(feature = "resvg")]
use resvg::render;
#[cfg(feature = "resvg")]
use resvg::tiny_skia::{Pixmap, Transform};
#[cfg(feature = "resvg")]
use resvg::usvg;
#[cfg(feature = "resvg")]
use resvg::usvg::TreeParsing;
#[cfg(feature = "resvg")]
use resvg::FitTo;

/// Tour colors, cycled when there are more agents than entries
const AGENT_COLORS: [&str; 8] = [
    "#e74c3c", "#3498db", "#2ecc71", "#9b59b6", "#f39c12", "#1abc9c", "#d35400", "#34495e",
];

/// Height reserved above the grid for the title
const TITLE_BAND: f64 = 30.0;

pub fn agent_color(agent: usize) -> &'static str {
    AGENT_COLORS[agent % AGENT_COLORS.len()]
}

/// SVG visualization generator
pub struct Visualizer {
    /// Side of one grid cell in pixels
    pub cell_size: f64,
    /// Margin
    pub margin: f64,
    /// Radius of the dots drawn on visited cells
    pub node_radius: f64,
    /// Print node ids inside free cells
    pub show_labels: bool,
}

impl Default for Visualizer {
    fn default() -> Self {
        Visualizer {
            cell_size: 24.0,
            margin: 40.0,
            node_radius: 3.0,
            show_labels: false,
        }
    }
}

impl Visualizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canvas size for a graph
    pub fn canvas_size(&self, graph: &CoverageGraph) -> (f64, f64) {
        (
            graph.width as f64 * self.cell_size + 2.0 * self.margin,
            graph.height as f64 * self.cell_size + 2.0 * self.margin + TITLE_BAND,
        )
    }

    /// Pixel center of a node's cell
    fn cell_center(&self, graph: &CoverageGraph, node: usize) -> (f64, f64) {
        let row = node / graph.width.max(1);
        let col = node % graph.width.max(1);
        (
            self.margin + (col as f64 + 0.5) * self.cell_size,
            self.margin + TITLE_BAND + (row as f64 + 0.5) * self.cell_size,
        )
    }

    /// Generate SVG visualization of a route plan
    pub fn generate_svg(&self, graph: &CoverageGraph, plan: &RoutePlan) -> String {
        let mut svg = String::new();
        let (width, height) = self.canvas_size(graph);

        svg.push_str(&format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .free {{ fill: #ffffff; stroke: #bdc3c7; stroke-width: 0.5; }}
    .occupied {{ fill: #2c3e50; stroke: #2c3e50; stroke-width: 0.5; }}
    .tour {{ stroke-width: 3; fill: none; stroke-linejoin: round; stroke-opacity: 0.85; }}
    .anchor {{ fill: #f1c40f; stroke: #7f6000; stroke-width: 2; }}
    .label {{ font-family: Arial; font-size: 8px; fill: #7f8c8d; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
"##,
            width, height, width, height
        ));

        svg.push_str(&format!(
            r##"<text x="{}" y="25" class="title">Grid: {} | Agents: {} | Max: {:.2} | Total: {:.2} | Complete: {}</text>
"##,
            self.margin,
            graph.name,
            plan.fleet.num_agents(),
            plan.max_length,
            plan.total_length,
            plan.complete
        ));

        for node in &graph.nodes {
            let (cx, cy) = self.cell_center(graph, node.id);
            let half = self.cell_size / 2.0;
            // The anchor is marked occupied in the graph but drawn as a free cell
            let class = if node.occupied && node.id != graph.anchor {
                "occupied"
            } else {
                "free"
            };
            svg.push_str(&format!(
                r##"<rect x="{:.2}" y="{:.2}" width="{}" height="{}" class="{}"/>
"##,
                cx - half,
                cy - half,
                self.cell_size,
                self.cell_size,
                class
            ));

            if self.show_labels && !node.occupied {
                svg.push_str(&format!(
                    r##"<text x="{:.2}" y="{:.2}" class="label" text-anchor="middle">{}</text>
"##,
                    cx,
                    cy - self.node_radius - 2.0,
                    node.id
                ));
            }
        }

        for (agent, tour) in plan.fleet.tours().iter().enumerate() {
            let color = agent_color(agent);
            let points: Vec<String> = tour
                .nodes()
                .iter()
                .map(|&n| {
                    let (x, y) = self.cell_center(graph, n);
                    format!("{:.2},{:.2}", x, y)
                })
                .collect();

            svg.push_str(&format!(
                r##"<polyline points="{}" class="tour" stroke="{}"/>
"##,
                points.join(" "),
                color
            ));

            for &n in tour.interior() {
                let (x, y) = self.cell_center(graph, n);
                svg.push_str(&format!(
                    r##"<circle cx="{:.2}" cy="{:.2}" r="{}" fill="{}"/>
"##,
                    x, y, self.node_radius, color
                ));
            }
        }

        let (ax, ay) = self.cell_center(graph, graph.anchor);
        svg.push_str(&format!(
            r##"<circle cx="{:.2}" cy="{:.2}" r="{}" class="anchor"/>
"##,
            ax,
            ay,
            self.cell_size / 3.0
        ));

        svg.push_str("</svg>");

        svg
    }

    /// Generate a bar chart of tour lengths, one bar per agent
    pub fn generate_lengths_svg(&self, plan: &RoutePlan) -> String {
        let mut svg = String::new();

        let width = 600.0;
        let height = 300.0;
        let margin = 50.0;

        svg.push_str(&format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .axis {{ stroke: #2c3e50; stroke-width: 1; }}
    .max {{ stroke: #e74c3c; stroke-width: 1; stroke-dasharray: 5,5; }}
    .label {{ font-family: Arial; font-size: 12px; fill: #2c3e50; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
"##,
            width, height, width, height
        ));

        svg.push_str(&format!(
            r#"<text x="{}" y="25" class="title">Tour lengths - Max: {:.2} | Imbalance: {:.3}</text>
"#,
            margin,
            plan.max_length,
            plan.imbalance()
        ));

        let plot_width = width - 2.0 * margin;
        let plot_height = height - 2.0 * margin;
        let baseline = margin + plot_height;

        svg.push_str(&format!(
            r##"<line x1="{}" y1="{}" x2="{}" y2="{}" class="axis"/>
<line x1="{}" y1="{}" x2="{}" y2="{}" class="axis"/>
"##,
            margin, baseline, width - margin, baseline,
            margin, margin, margin, baseline
        ));

        let y_max = if plan.max_length > 0.0 { plan.max_length } else { 1.0 };
        let y_scale = plot_height / y_max;
        let slot = plot_width / plan.tour_lengths.len().max(1) as f64;
        let bar_width = slot * 0.6;

        svg.push_str(&format!(
            r##"<line x1="{}" y1="{:.2}" x2="{}" y2="{:.2}" class="max"/>
"##,
            margin, baseline - plan.max_length * y_scale, width - margin, baseline - plan.max_length * y_scale
        ));

        for (agent, &length) in plan.tour_lengths.iter().enumerate() {
            let x = margin + agent as f64 * slot + (slot - bar_width) / 2.0;
            let bar_height = length * y_scale;
            svg.push_str(&format!(
                r##"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}"/>
<text x="{:.2}" y="{:.2}" class="label" text-anchor="middle">{:.1}</text>
<text x="{:.2}" y="{:.2}" class="label" text-anchor="middle">A{}</text>
"##,
                x,
                baseline - bar_height,
                bar_width,
                bar_height,
                agent_color(agent),
                x + bar_width / 2.0,
                baseline - bar_height - 4.0,
                length,
                x + bar_width / 2.0,
                baseline + 15.0,
                agent
            ));
        }

        svg.push_str("</svg>");

        svg
    }

    /// Save SVG to file
    pub fn save_svg<P: AsRef<Path>>(&self, svg: &str, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(svg.as_bytes())?;
        Ok(())
    }

    /// Save SVG as PNG.
    /// Uses resvg when the feature is enabled, otherwise tries `rsvg-convert`,
    /// then `magick convert`, then `inkscape`.
    pub fn save_png<P: AsRef<Path>>(&self, svg: &str, path: P) -> std::io::Result<()> {
        svg_to_png_file(svg, path.as_ref())
    }

    /// Export data for external plotting (e.g., matplotlib)
    pub fn export_plot_data(&self, graph: &CoverageGraph, plan: &RoutePlan) -> String {
        let mut data = String::new();

        data.push_str("# Coverage Plan Data\n");
        data.push_str(&format!("# Grid: {} ({}x{})\n", graph.name, graph.width, graph.height));
        data.push_str(&format!("# Anchor: {}\n", graph.anchor));
        data.push_str(&format!("# Max length: {:.2}\n", plan.max_length));
        data.push_str(&format!("# Complete: {}\n\n", plan.complete));

        data.push_str("# Nodes: id, x, y, occupied\n");
        for node in &graph.nodes {
            data.push_str(&format!("{},{},{},{}\n", node.id, node.x, node.y, node.occupied as u8));
        }

        data.push_str("\n# Tours: agent, length, sequence of node ids\n");
        for (agent, tour) in plan.fleet.tours().iter().enumerate() {
            let ids: Vec<String> = tour.nodes().iter().map(|n| n.to_string()).collect();
            data.push_str(&format!(
                "{},{:.2},{}\n",
                agent,
                plan.tour_lengths.get(agent).copied().unwrap_or(0.0),
                ids.join(" ")
            ));
        }

        data
    }
}

/// Read the `width`/`height` attributes of the root element
#[cfg_attr(not(feature = "resvg"), allow(dead_code))]
fn svg_dimensions(svg: &str) -> (u32, u32) {
    let attribute = |name: &str| -> Option<u32> {
        let (_, rest) = svg.split_once(&format!(" {}=\"", name))?;
        let (value, _) = rest.split_once('"')?;
        value.parse::<f64>().ok().map(|v| v as u32)
    };
    (
        attribute("width").unwrap_or(800).max(1),
        attribute("height").unwrap_or(800).max(1),
    )
}

/// Render an SVG string directly to PNG file using available renderer.
pub fn svg_to_png_file(svg: &str, out: &Path) -> std::io::Result<()> {
    #[cfg(feature = "resvg")]
    match render_with_resvg(svg, out) {
        Ok(()) => return Ok(()),
        Err(e) => log::warn!("resvg failed, trying external converters: {}", e),
    }

    convert_with_external_tools(svg, out)
}

#[cfg(feature = "resvg")]
fn render_with_resvg(svg: &str, out: &Path) -> std::io::Result<()> {
    let opt = usvg::Options::default();
    let rtree = usvg::Tree::from_str(svg, &opt).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::Other, format!("usvg parse error: {}", e))
    })?;
    let (w, h) = svg_dimensions(svg);
    let mut pixmap = Pixmap::new(w, h)
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "Failed to create pixmap"))?;
    render(&rtree, FitTo::Original, Transform::default(), pixmap.as_mut())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "resvg render failed"))?;
    pixmap.save_png(out).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::Other, format!("save_png failed: {}", e))
    })
}

fn convert_with_external_tools(svg: &str, out: &Path) -> std::io::Result<()> {
    let tmp_svg = out.with_extension("svg.tmp");
    std::fs::write(&tmp_svg, svg)?;

    let tmp = tmp_svg.to_string_lossy().to_string();
    let target = out.to_string_lossy().to_string();
    let attempts: [(&str, Vec<&str>); 3] = [
        ("rsvg-convert", vec!["-o", &target, &tmp]),
        ("magick", vec!["convert", &tmp, &target]),
        ("inkscape", vec![&tmp, "--export-type=png", "--export-filename", &target]),
    ];

    for (program, args) in &attempts {
        match Command::new(program).args(args).status() {
            Ok(status) if status.success() => {
                let _ = std::fs::remove_file(&tmp_svg);
                return Ok(());
            }
            Ok(status) => log::debug!("{} exited with {}", program, status),
            Err(e) => log::debug!("{} unavailable: {}", program, e),
        }
    }

    let _ = std::fs::remove_file(&tmp_svg);
    Err(std::io::Error::new(
        std::io::ErrorKind::Other,
        "No SVG->PNG converter succeeded (tried resvg, rsvg-convert, magick, inkscape)",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::grid::OccupancyGrid;
    use crate::planner::Planner;

    fn create_test_plan() -> (CoverageGraph, RoutePlan) {
        let grid: OccupancyGrid = "0 0 0\n0 1 0\n".parse().unwrap();
        let mut config = PlannerConfig::default();
        config.graph.anchor = 0;
        config.solver.agents = 2;
        Planner::new(config).unwrap().plan(&grid).unwrap()
    }

    #[test]
    fn test_visualizer() {
        let (graph, plan) = create_test_plan();
        let viz = Visualizer::new();
        let svg = viz.generate_svg(&graph, &plan);

        assert!(svg.starts_with("<?xml"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("inline"));
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert_eq!(svg.matches("class=\"occupied\"").count(), 1);
        assert!(svg.contains(agent_color(1)));
    }

    #[test]
    fn test_canvas_size() {
        let (graph, _) = create_test_plan();
        let viz = Visualizer::new();
        let (w, h) = viz.canvas_size(&graph);
        assert_eq!(w, 3.0 * 24.0 + 80.0);
        assert_eq!(h, 2.0 * 24.0 + 80.0 + TITLE_BAND);

        let svg = viz.generate_svg(&graph, &plan_of(&graph));
        assert_eq!(svg_dimensions(&svg), (w as u32, h as u32));
    }

    fn plan_of(graph: &CoverageGraph) -> RoutePlan {
        RoutePlan::from_fleet(graph, crate::fleet::Fleet::new(graph.anchor, 1), "empty")
    }

    #[test]
    fn test_lengths_chart() {
        let (_, plan) = create_test_plan();
        let svg = Visualizer::new().generate_lengths_svg(&plan);
        assert_eq!(svg.matches("<rect x=").count(), 2);
        assert!(svg.contains("A1"));
    }

    #[test]
    fn test_plot_data() {
        let (graph, plan) = create_test_plan();
        let data = Visualizer::new().export_plot_data(&graph, &plan);
        assert!(data.contains("# Anchor: 0"));
        assert_eq!(data.lines().filter(|l| l.starts_with("0,")).count(), 2);
    }
}
