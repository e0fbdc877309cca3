//! Sparse spatial weights graph
//!
//! Each unit owns a row of `(neighbor, weight)` pairs sorted by neighbor
//! index. The statistic engines only ever walk these rows; a dense matrix
//! is materialized on demand for diagnostics.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Weight sums entering the analytic moments of Moran's I.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightMoments {
    /// S0 = Σ_i Σ_j w_ij
    pub s0: f64,
    /// S1 = ½ Σ_i Σ_j (w_ij + w_ji)²
    pub s1: f64,
    /// S2 = Σ_i (w_i· + w_·i)²
    pub s2: f64,
}

/// Immutable neighbor graph with per-unit weighted adjacency rows.
///
/// Invariants (checked on construction): no self loops, neighbor indices in
/// range and unique within a row, weights finite and non-negative, and every
/// unit has at least one neighbor. Deserialization runs the same checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRows")]
pub struct NeighborGraph {
    rows: Vec<Vec<(usize, f64)>>,
}

/// Unchecked wire form of [`NeighborGraph`]
#[derive(Deserialize)]
struct RawRows {
    rows: Vec<Vec<(usize, f64)>>,
}

impl TryFrom<RawRows> for NeighborGraph {
    type Error = Error;

    fn try_from(raw: RawRows) -> Result<Self> {
        Self::from_weighted_rows(raw.rows)
    }
}

impl NeighborGraph {
    /// Validate and wrap weighted rows.
    ///
    /// Rows are sorted by neighbor index. A unit with an empty row fails
    /// with [`Error::IncompleteNeighborhood`].
    pub fn from_weighted_rows(mut rows: Vec<Vec<(usize, f64)>>) -> Result<Self> {
        let n = rows.len();
        for (unit, row) in rows.iter_mut().enumerate() {
            if row.is_empty() {
                return Err(Error::IncompleteNeighborhood { unit });
            }
            row.sort_by_key(|&(j, _)| j);

            for (pos, &(j, w)) in row.iter().enumerate() {
                if j >= n {
                    return Err(Error::invalid_parameter(
                        "neighbor",
                        j,
                        format!("unit {unit} references a neighbor outside 0..{n}"),
                    ));
                }
                if j == unit {
                    return Err(Error::invalid_parameter(
                        "neighbor",
                        j,
                        format!("unit {unit} lists itself as a neighbor"),
                    ));
                }
                if pos > 0 && row[pos - 1].0 == j {
                    return Err(Error::invalid_parameter(
                        "neighbor",
                        j,
                        format!("unit {unit} lists the same neighbor twice"),
                    ));
                }
                if !w.is_finite() || w < 0.0 {
                    return Err(Error::invalid_parameter(
                        "weight",
                        w,
                        format!("weight of edge {unit} -> {j} must be finite and non-negative"),
                    ));
                }
            }
        }
        Ok(Self { rows })
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Weighted neighbors of `unit`, sorted by neighbor index.
    ///
    /// # Panics
    /// If `unit >= self.len()`.
    pub fn neighbors(&self, unit: usize) -> &[(usize, f64)] {
        &self.rows[unit]
    }

    /// Iterate over all rows in unit order.
    pub fn rows(&self) -> impl Iterator<Item = &[(usize, f64)]> + '_ {
        self.rows.iter().map(|r| r.as_slice())
    }

    /// Weight of the edge `i -> j` (0 when absent).
    pub fn weight(&self, i: usize, j: usize) -> f64 {
        self.rows
            .get(i)
            .and_then(|row| {
                row.binary_search_by_key(&j, |&(k, _)| k)
                    .ok()
                    .map(|pos| row[pos].1)
            })
            .unwrap_or(0.0)
    }

    /// Number of neighbors per unit.
    pub fn cardinalities(&self) -> Vec<usize> {
        self.rows.iter().map(|r| r.len()).collect()
    }

    /// Total weight per row.
    pub fn row_sums(&self) -> Vec<f64> {
        self.rows
            .iter()
            .map(|r| r.iter().map(|&(_, w)| w).sum())
            .collect()
    }

    /// Whether every row sums to 1 within `tolerance`.
    pub fn is_row_standardized(&self, tolerance: f64) -> bool {
        self.row_sums().iter().all(|s| (s - 1.0).abs() <= tolerance)
    }

    /// Whether the neighbor relation is symmetric (ignoring weight values).
    pub fn is_symmetric(&self) -> bool {
        self.rows.iter().enumerate().all(|(i, row)| {
            row.iter().all(|&(j, _)| {
                self.rows[j]
                    .binary_search_by_key(&i, |&(k, _)| k)
                    .is_ok()
            })
        })
    }

    /// Spatial lag of one unit: Σ_j w_ij v_j over its neighbor row.
    ///
    /// `values` must be index-aligned with the graph.
    #[inline]
    pub fn lag_at(&self, unit: usize, values: &[f64]) -> f64 {
        self.rows[unit].iter().map(|&(j, w)| w * values[j]).sum()
    }

    /// Spatial lag of every unit.
    pub fn spatial_lag(&self, values: &[f64]) -> Result<Vec<f64>> {
        self.check_len(values.len())?;
        Ok((0..self.len()).map(|i| self.lag_at(i, values)).collect())
    }

    /// Fail with [`Error::SizeMismatch`] unless `len` equals the unit count.
    pub fn check_len(&self, len: usize) -> Result<()> {
        if len != self.len() {
            return Err(Error::SizeMismatch {
                expected: self.len(),
                actual: len,
            });
        }
        Ok(())
    }

    /// Compute S0, S1 and S2 in one pass over the sparse rows.
    pub fn moments(&self) -> WeightMoments {
        let n = self.len();
        let mut col_sums = vec![0.0; n];
        let mut s0 = 0.0;
        let mut s1_twice = 0.0;

        for (i, row) in self.rows.iter().enumerate() {
            for &(j, w_ij) in row {
                s0 += w_ij;
                col_sums[j] += w_ij;
                match self.rows[j].binary_search_by_key(&i, |&(k, _)| k) {
                    Ok(pos) => {
                        // Stored in both directions (even with weight 0):
                        // row j adds the (j, i) term
                        let w_ji = self.rows[j][pos].1;
                        s1_twice += (w_ij + w_ji) * (w_ij + w_ji);
                    }
                    Err(_) => s1_twice += 2.0 * w_ij * w_ij,
                }
            }
        }

        let s2 = self
            .row_sums()
            .iter()
            .zip(&col_sums)
            .map(|(r, c)| (r + c) * (r + c))
            .sum();

        WeightMoments {
            s0,
            s1: 0.5 * s1_twice,
            s2,
        }
    }

    /// Materialize the dense n×n weights matrix.
    ///
    /// O(n²) memory; intended for inspection of small graphs only.
    pub fn to_dense(&self) -> Array2<f64> {
        let n = self.len();
        let mut dense = Array2::zeros((n, n));
        for (i, row) in self.rows.iter().enumerate() {
            for &(j, w) in row {
                dense[(i, j)] = w;
            }
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Path 0 - 1 - 2 - 3 with binary weights
    fn path4() -> NeighborGraph {
        NeighborGraph::from_weighted_rows(vec![
            vec![(1, 1.0)],
            vec![(2, 1.0), (0, 1.0)],
            vec![(1, 1.0), (3, 1.0)],
            vec![(2, 1.0)],
        ])
        .unwrap()
    }

    #[test]
    fn test_rows_sorted_by_neighbor() {
        let g = path4();
        assert_eq!(g.neighbors(1), &[(0, 1.0), (2, 1.0)]);
        assert_eq!(g.cardinalities(), vec![1, 2, 2, 1]);
    }

    #[test]
    fn test_empty_row_is_incomplete() {
        let err = NeighborGraph::from_weighted_rows(vec![vec![(1, 1.0)], vec![]]).unwrap_err();
        assert_eq!(err, Error::IncompleteNeighborhood { unit: 1 });
    }

    #[test]
    fn test_invalid_rows_rejected() {
        // self loop
        assert!(NeighborGraph::from_weighted_rows(vec![vec![(0, 1.0)], vec![(0, 1.0)]]).is_err());
        // out of range
        assert!(NeighborGraph::from_weighted_rows(vec![vec![(5, 1.0)], vec![(0, 1.0)]]).is_err());
        // duplicate neighbor
        assert!(NeighborGraph::from_weighted_rows(vec![
            vec![(1, 0.5), (1, 0.5)],
            vec![(0, 1.0)]
        ])
        .is_err());
        // negative weight
        assert!(NeighborGraph::from_weighted_rows(vec![vec![(1, -1.0)], vec![(0, 1.0)]]).is_err());
    }

    #[test]
    fn test_weight_lookup() {
        let g = path4();
        assert_eq!(g.weight(1, 2), 1.0);
        assert_eq!(g.weight(0, 3), 0.0);
        assert_eq!(g.weight(99, 0), 0.0);
    }

    #[test]
    fn test_symmetry() {
        assert!(path4().is_symmetric());
        let directed = NeighborGraph::from_weighted_rows(vec![
            vec![(1, 1.0)],
            vec![(2, 1.0)],
            vec![(0, 1.0)],
        ])
        .unwrap();
        assert!(!directed.is_symmetric());
    }

    #[test]
    fn test_moments_binary_path() {
        let m = path4().moments();
        // 3 undirected edges → 6 directed unit weights
        assert!((m.s0 - 6.0).abs() < 1e-12);
        // each directed entry contributes (1+1)², halved
        assert!((m.s1 - 12.0).abs() < 1e-12);
        // degrees 1,2,2,1 → (2d)² = 4 + 16 + 16 + 4
        assert!((m.s2 - 40.0).abs() < 1e-12);
    }

    fn assert_moments_match_dense(g: &NeighborGraph) {
        let d = g.to_dense();
        let n = g.len();

        let mut s1 = 0.0;
        let mut s2 = 0.0;
        for i in 0..n {
            for j in 0..n {
                s1 += (d[(i, j)] + d[(j, i)]).powi(2);
            }
            let r: f64 = d.row(i).sum();
            let c: f64 = d.column(i).sum();
            s2 += (r + c).powi(2);
        }
        let m = g.moments();
        assert!((m.s0 - d.sum()).abs() < 1e-12);
        assert!((m.s1 - 0.5 * s1).abs() < 1e-12);
        assert!((m.s2 - s2).abs() < 1e-12);
    }

    #[test]
    fn test_moments_match_dense_definition() {
        let g = NeighborGraph::from_weighted_rows(vec![
            vec![(1, 0.5), (2, 0.5)],
            vec![(2, 1.0)],
            vec![(0, 0.25), (1, 0.75)],
        ])
        .unwrap();
        assert_moments_match_dense(&g);
    }

    #[test]
    fn test_moments_with_zero_weight_reverse_edge() {
        let g = NeighborGraph::from_weighted_rows(vec![
            vec![(1, 1.0)],
            vec![(0, 0.0), (2, 1.0)],
            vec![(1, 1.0)],
        ])
        .unwrap();
        assert_moments_match_dense(&g);
        assert!((g.moments().s1 - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_deserialize_validates_rows() {
        let json = serde_json::to_string(&path4()).unwrap();
        let back: NeighborGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path4());

        let out_of_range = r#"{"rows":[[[7,1.0]],[[0,1.0]],[[1,1.0]],[[2,1.0]]]}"#;
        assert!(serde_json::from_str::<NeighborGraph>(out_of_range).is_err());
        let empty_row = r#"{"rows":[[[1,1.0]],[]]}"#;
        assert!(serde_json::from_str::<NeighborGraph>(empty_row).is_err());
    }

    #[test]
    fn test_spatial_lag() {
        let g = path4();
        let lag = g.spatial_lag(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(lag, vec![2.0, 4.0, 6.0, 3.0]);
        assert!(matches!(
            g.spatial_lag(&[1.0]),
            Err(Error::SizeMismatch { expected: 4, actual: 1 })
        ));
    }

    #[test]
    fn test_dense_matches_sparse() {
        let g = path4();
        let d = g.to_dense();
        assert_eq!(d.shape(), &[4, 4]);
        assert_eq!(d[(2, 3)], 1.0);
        assert_eq!(d[(0, 2)], 0.0);
        assert_eq!(d.sum(), 6.0);
        assert!(!g.is_row_standardized(1e-9));
    }
}
