//! Delimited `x,y,value` tables
//!
//! One unit per line, comma- or whitespace-separated. Blank lines and lines
//! starting with `#` are skipped; a first line whose fields are not numeric
//! is taken as a header.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use geo_types::Coord;
use lisagis_algorithms::weights::{lattice_adjacency, Contiguity};

/// Unit positions and their attribute values, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub points: Vec<Coord<f64>>,
    pub values: Vec<f64>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

pub fn read_table(path: &Path) -> Result<Table> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    parse_table(BufReader::new(file)).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn parse_table<R: BufRead>(reader: R) -> Result<Table> {
    let mut points = Vec::new();
    let mut values = Vec::new();
    let mut seen_data = false;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .collect();

        let parsed: Option<Vec<f64>> = fields.iter().map(|f| f.parse::<f64>().ok()).collect();
        let row = match parsed {
            Some(row) => row,
            None if !seen_data => {
                seen_data = true;
                continue;
            }
            None => bail!("line {}: expected numeric fields, got '{}'", idx + 1, line),
        };
        seen_data = true;

        if row.len() != 3 {
            bail!("line {}: expected 3 fields (x, y, value), got {}", idx + 1, row.len());
        }
        points.push(Coord { x: row[0], y: row[1] });
        values.push(row[2]);
    }

    if values.is_empty() {
        bail!("no data rows");
    }
    Ok(Table { points, values })
}

/// Contiguity adjacency for points sitting on a complete regular grid.
///
/// Distinct x coordinates become columns and distinct y coordinates rows;
/// every grid cell must hold exactly one point. Rows of the result refer to
/// point indices, not cell indices.
pub fn grid_adjacency(points: &[Coord<f64>], rule: Contiguity) -> Result<Vec<Vec<usize>>> {
    let axis = |get: fn(&Coord<f64>) -> f64| {
        let mut v: Vec<f64> = points.iter().map(get).collect();
        v.sort_by(f64::total_cmp);
        v.dedup();
        v
    };
    let xs = axis(|c| c.x);
    let ys = axis(|c| c.y);
    let (rows, cols) = (ys.len(), xs.len());

    if rows * cols != points.len() {
        bail!(
            "{} points do not fill a {} x {} grid; use KNN weights instead",
            points.len(),
            rows,
            cols
        );
    }

    let mut cell_to_point = vec![usize::MAX; rows * cols];
    for (idx, p) in points.iter().enumerate() {
        // Both searches succeed: every coordinate is in its own axis
        let col = xs.binary_search_by(|v| v.total_cmp(&p.x)).unwrap_or_default();
        let row = ys.binary_search_by(|v| v.total_cmp(&p.y)).unwrap_or_default();
        let cell = row * cols + col;
        if cell_to_point[cell] != usize::MAX {
            bail!("points {} and {} share grid cell ({}, {})", cell_to_point[cell], idx, row, col);
        }
        cell_to_point[cell] = idx;
    }

    let lattice = lattice_adjacency(rows, cols, rule);
    let mut adjacency = vec![Vec::new(); points.len()];
    for (cell, neighbors) in lattice.into_iter().enumerate() {
        adjacency[cell_to_point[cell]] = neighbors.into_iter().map(|c| cell_to_point[c]).collect();
    }
    Ok(adjacency)
}
