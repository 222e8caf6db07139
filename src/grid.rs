//! Module for parsing and representing occupancy grids.
//!
//! A grid file is a plain-text matrix of integers separated by whitespace,
//! one grid row per line: `0` marks a free cell, `1` an occupied one.
//! The number of non-empty lines gives the grid height and the cell count
//! divided by the height gives its width.

use crate::error::InputError;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// State of a single grid cell
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Free,
    Occupied,
}

impl Cell {
    pub fn is_free(self) -> bool {
        self == Cell::Free
    }
}

/// A rectangular occupancy grid stored in row-major order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyGrid {
    /// Name of the grid (file stem for loaded grids)
    pub name: String,
    /// Number of columns
    width: usize,
    /// Number of rows
    height: usize,
    /// Cell states, `cells[row * width + col]`
    cells: Vec<Cell>,
}

impl OccupancyGrid {
    /// Build a grid from already validated cells.
    pub fn new(name: &str, width: usize, height: usize, cells: Vec<Cell>) -> Result<Self, InputError> {
        if width == 0 || height == 0 || cells.is_empty() {
            return Err(InputError::EmptyGrid);
        }
        let size = cell_count(width, height)?;
        if cells.len() != size {
            return Err(InputError::RaggedRow {
                row: cells.len() / width,
                found: cells.len() % width,
                expected: width,
            });
        }

        Ok(OccupancyGrid {
            name: name.to_string(),
            width,
            height,
            cells,
        })
    }

    /// Load a grid from a text file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, InputError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "grid".to_string());

        let grid = Self::parse(&name, &text)?;
        log::debug!(
            "Loaded grid '{}' ({}x{}) from {:?}",
            grid.name,
            grid.width,
            grid.height,
            path
        );
        Ok(grid)
    }

    /// Parse grid text. Blank lines are ignored; every other line is one row.
    pub fn parse(name: &str, text: &str) -> Result<Self, InputError> {
        let mut cells = Vec::new();
        let mut width: Option<usize> = None;
        let mut height = 0usize;

        for line in text.lines() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }

            let row = height;
            match width {
                None => width = Some(tokens.len()),
                Some(expected) if expected != tokens.len() => {
                    return Err(InputError::RaggedRow {
                        row,
                        found: tokens.len(),
                        expected,
                    });
                }
                Some(_) => {}
            }

            for token in tokens {
                let cell = match token {
                    "0" => Cell::Free,
                    "1" => Cell::Occupied,
                    _ => {
                        return Err(InputError::InvalidCell {
                            row,
                            token: token.to_string(),
                        })
                    }
                };
                cells.push(cell);
            }
            height += 1;
        }

        let width = width.ok_or(InputError::EmptyGrid)?;
        Self::new(name, width, height, cells)
    }

    /// Generate a random grid where each cell is occupied with probability
    /// `obstacle_ratio`. Deterministic via seed.
    pub fn random(width: usize, height: usize, obstacle_ratio: f64, seed: u64) -> Result<Self, InputError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let ratio = if obstacle_ratio.is_finite() {
            obstacle_ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let cells = (0..cell_count(width, height)?)
            .map(|_| {
                if rng.gen_bool(ratio) {
                    Cell::Occupied
                } else {
                    Cell::Free
                }
            })
            .collect();

        let name = format!("random-{}x{}-s{}", width, height, seed);
        Self::new(&name, width, height, cells)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of cells (free and occupied)
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn cell(&self, index: usize) -> Cell {
        self.cells[index]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline]
    pub fn is_free(&self, index: usize) -> bool {
        self.cells[index].is_free()
    }

    /// Row-major index of a cell
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    /// (row, col) of a row-major index
    #[inline]
    pub fn row_col(&self, index: usize) -> (usize, usize) {
        (index / self.width, index % self.width)
    }

    pub fn free_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_free()).count()
    }

    /// Write the grid back in the text format accepted by [`OccupancyGrid::parse`].
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.cells.len() * 2);
        for row in self.cells.chunks(self.width) {
            let line: Vec<&str> = row
                .iter()
                .map(|c| if c.is_free() { "0" } else { "1" })
                .collect();
            text.push_str(&line.join(" "));
            text.push('\n');
        }
        text
    }

    /// Get statistics about the grid
    pub fn statistics(&self) -> GridStatistics {
        let free_cells = self.free_count();
        GridStatistics {
            name: self.name.clone(),
            width: self.width,
            height: self.height,
            cells: self.cells.len(),
            free_cells,
            occupied_cells: self.cells.len() - free_cells,
            free_ratio: free_cells as f64 / self.cells.len() as f64,
        }
    }
}

fn cell_count(width: usize, height: usize) -> Result<usize, InputError> {
    width
        .checked_mul(height)
        .ok_or(InputError::GridTooLarge { width, height })
}

impl FromStr for OccupancyGrid {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse("inline", s)
    }
}

/// Statistics about an occupancy grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridStatistics {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub cells: usize,
    pub free_cells: usize,
    pub occupied_cells: usize,
    pub free_ratio: f64,
}

impl std::fmt::Display for GridStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Grid: {}", self.name)?;
        writeln!(f, "  Size: {} rows x {} columns ({} cells)", self.height, self.width, self.cells)?;
        writeln!(f, "  Free cells: {}", self.free_cells)?;
        writeln!(f, "  Occupied cells: {}", self.occupied_cells)?;
        writeln!(f, "  Free ratio: {:.2}%", self.free_ratio * 100.0)
    }
}
