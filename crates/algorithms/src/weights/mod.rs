//! Spatial weights construction
//!
//! Turns unit positions, polygons, or a caller-supplied adjacency into a
//! row-standardized [`NeighborGraph`]:
//! - **KNN**: the k nearest other units by Euclidean distance
//! - **Contiguity**: units sharing a boundary (rook or queen)
//!
//! Every strategy produces raw binary weights and funnels them through
//! [`row_standardize`], which is where a unit without neighbors becomes an
//! [`Error::IncompleteNeighborhood`].

mod contiguity;
pub mod kdtree;
mod knn;

pub use contiguity::{lattice_adjacency, polygon_adjacency, symmetrize_adjacency, Contiguity};
pub use kdtree::{KdTree, Neighbor};
pub use knn::{knn_brute_force, knn_neighbors};

use geo_types::{Coord, Polygon};
use lisagis_core::{Error, NeighborGraph, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default neighbor count for KNN weights
pub const DEFAULT_K: usize = 5;

/// How neighbors are found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightsStrategy {
    /// k nearest units by Euclidean distance
    Knn,
    /// Units sharing a boundary
    Contiguity(Contiguity),
}

impl Default for WeightsStrategy {
    fn default() -> Self {
        WeightsStrategy::Knn
    }
}

/// Parameters for weights construction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightsParams {
    /// Neighbor count for KNN (2 ≤ k ≤ n−1); ignored by contiguity
    pub k: usize,
    pub strategy: WeightsStrategy,
}

impl Default for WeightsParams {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            strategy: WeightsStrategy::default(),
        }
    }
}

/// Spatial description of the units the weights are built from.
#[derive(Debug, Clone, Copy)]
pub enum WeightsInput<'a> {
    /// One position per unit
    Points(&'a [Coord<f64>]),
    /// One polygon per unit
    Polygons(&'a [Polygon<f64>]),
    /// Precomputed neighbor lists, e.g. from an external topology step
    Adjacency(&'a [Vec<usize>]),
}

impl WeightsInput<'_> {
    /// Number of units described.
    pub fn len(&self) -> usize {
        match self {
            WeightsInput::Points(p) => p.len(),
            WeightsInput::Polygons(p) => p.len(),
            WeightsInput::Adjacency(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build a row-standardized neighbor graph.
///
/// # Arguments
/// * `input` - Unit positions, polygons, or adjacency lists
/// * `params` - Neighbor count and strategy
///
/// # Errors
/// * [`Error::IncompleteNeighborhood`] if a unit has no neighbors, including
///   when `k` exceeds the number of other units
/// * [`Error::InvalidParameter`] for `k < 2` or a strategy that cannot use
///   the given input
pub fn build_weights(input: WeightsInput<'_>, params: &WeightsParams) -> Result<NeighborGraph> {
    let n = input.len();
    let raw = match (params.strategy, input) {
        (WeightsStrategy::Knn, WeightsInput::Points(points)) => {
            if params.k < 2 {
                return Err(Error::invalid_parameter("k", params.k, "must be at least 2"));
            }
            if params.k >= n {
                // No unit can find k other units
                return Err(Error::IncompleteNeighborhood { unit: 0 });
            }
            knn_neighbors(points, params.k)?
        }
        (WeightsStrategy::Contiguity(rule), WeightsInput::Polygons(polygons)) => {
            polygon_adjacency(polygons, rule)?
        }
        (WeightsStrategy::Contiguity(_), WeightsInput::Adjacency(adjacency)) => adjacency.to_vec(),
        (strategy, _) => {
            return Err(Error::invalid_parameter(
                "strategy",
                format!("{strategy:?}"),
                "KNN needs points; contiguity needs polygons or adjacency",
            ));
        }
    };

    let graph = row_standardize(binary_rows(raw))?;
    debug!(
        units = graph.len(),
        strategy = ?params.strategy,
        links = graph.cardinalities().iter().sum::<usize>(),
        "built spatial weights"
    );
    Ok(graph)
}

/// Attach a raw weight of 1 to every listed neighbor.
pub fn binary_rows(adjacency: Vec<Vec<usize>>) -> Vec<Vec<(usize, f64)>> {
    adjacency
        .into_iter()
        .map(|row| row.into_iter().map(|j| (j, 1.0)).collect())
        .collect()
}

/// Divide each row by its sum so every row totals 1.
///
/// A row that is empty or sums to zero fails with
/// [`Error::IncompleteNeighborhood`] instead of becoming a silent zero row.
pub fn row_standardize(raw: Vec<Vec<(usize, f64)>>) -> Result<NeighborGraph> {
    let mut rows = raw;
    for (unit, row) in rows.iter_mut().enumerate() {
        let total: f64 = row.iter().map(|&(_, w)| w).sum();
        if row.is_empty() || total <= 0.0 {
            return Err(Error::IncompleteNeighborhood { unit });
        }
        if !total.is_finite() {
            return Err(Error::invalid_parameter(
                "weight",
                total,
                format!("row {unit} has a non-finite total weight"),
            ));
        }
        for (_, w) in row.iter_mut() {
            *w /= total;
        }
    }
    NeighborGraph::from_weighted_rows(rows)
}
