//! Contiguity adjacency
//!
//! Units are neighbors when their boundaries touch:
//! - **Rook**: they share at least one edge
//! - **Queen**: they share at least one vertex (a superset of Rook)
//!
//! Polygon vertices are matched exactly, so adjoining polygons must be
//! digitized with identical shared vertices.

use std::collections::{BTreeSet, HashMap};

use geo_types::{Coord, Polygon};
use lisagis_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Contiguity criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Contiguity {
    /// Shared edge
    Rook,
    /// Shared vertex
    #[default]
    Queen,
}

type VertexKey = (u64, u64);

#[inline]
fn vertex_key(c: Coord<f64>) -> VertexKey {
    // +0.0 folds -0.0 onto 0.0 so both hash alike
    ((c.x + 0.0).to_bits(), (c.y + 0.0).to_bits())
}

#[inline]
fn edge_key(a: Coord<f64>, b: Coord<f64>) -> (VertexKey, VertexKey) {
    let (ka, kb) = (vertex_key(a), vertex_key(b));
    if ka <= kb {
        (ka, kb)
    } else {
        (kb, ka)
    }
}

/// Raw contiguity adjacency between polygons.
///
/// Rows are sorted by neighbor index. Units without any touching polygon
/// get an empty row; the weights builder turns that into
/// [`Error::IncompleteNeighborhood`].
pub fn polygon_adjacency(polygons: &[Polygon<f64>], rule: Contiguity) -> Result<Vec<Vec<usize>>> {
    let mut shared: HashMap<(VertexKey, VertexKey), Vec<usize>> = HashMap::new();

    for (unit, polygon) in polygons.iter().enumerate() {
        let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
        let mut keys = BTreeSet::new();
        for ring in rings {
            for c in ring.coords() {
                if !c.x.is_finite() || !c.y.is_finite() {
                    let value = if c.x.is_finite() { c.y } else { c.x };
                    return Err(Error::NonFiniteValue { unit, value });
                }
            }
            match rule {
                Contiguity::Queen => {
                    // A vertex is stored as a degenerate edge (v, v)
                    keys.extend(ring.coords().map(|&c| (vertex_key(c), vertex_key(c))));
                }
                Contiguity::Rook => {
                    keys.extend(ring.lines().map(|l| edge_key(l.start, l.end)));
                }
            }
        }
        for key in keys {
            shared.entry(key).or_default().push(unit);
        }
    }

    let mut rows: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); polygons.len()];
    for units in shared.values() {
        for (a, &i) in units.iter().enumerate() {
            for &j in &units[a + 1..] {
                rows[i].insert(j);
                rows[j].insert(i);
            }
        }
    }

    Ok(rows.into_iter().map(|r| r.into_iter().collect()).collect())
}

/// Rook or queen adjacency on a regular `rows x cols` lattice.
///
/// Unit ids are row-major: `id = row * cols + col`.
pub fn lattice_adjacency(rows: usize, cols: usize, rule: Contiguity) -> Vec<Vec<usize>> {
    let offsets: &[(isize, isize)] = match rule {
        Contiguity::Rook => &[(-1, 0), (0, -1), (0, 1), (1, 0)],
        Contiguity::Queen => &[
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, -1),
            (0, 1),
            (1, -1),
            (1, 0),
            (1, 1),
        ],
    };

    let mut adjacency = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let mut neighbors = Vec::with_capacity(offsets.len());
            for &(dr, dc) in offsets {
                let nr = row as isize + dr;
                let nc = col as isize + dc;
                if nr >= 0 && nc >= 0 && (nr as usize) < rows && (nc as usize) < cols {
                    neighbors.push(nr as usize * cols + nc as usize);
                }
            }
            adjacency.push(neighbors);
        }
    }
    adjacency
}

/// Add the reverse of every edge so that `j ∈ adj[i]` iff `i ∈ adj[j]`.
///
/// Rows come back sorted and free of duplicates.
pub fn symmetrize_adjacency(adjacency: &[Vec<usize>]) -> Result<Vec<Vec<usize>>> {
    let n = adjacency.len();
    let mut rows: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    for (i, row) in adjacency.iter().enumerate() {
        for &j in row {
            if j >= n {
                return Err(Error::invalid_parameter(
                    "neighbor",
                    j,
                    format!("unit {i} references a neighbor outside 0..{n}"),
                ));
            }
            rows[i].insert(j);
            rows[j].insert(i);
        }
    }
    Ok(rows.into_iter().map(|r| r.into_iter().collect()).collect())
}
