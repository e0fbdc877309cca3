//! k-nearest-neighbor adjacency
//!
//! For every unit the k closest other units (Euclidean distance) become its
//! neighbors, distance ties broken by ascending unit index. The relation is
//! left asymmetric, as KNN weights are by definition.

use geo_types::Coord;
use lisagis_core::{Error, Result};
use tracing::{debug, warn};

use super::kdtree::KdTree;

/// Raw KNN adjacency via a k-d tree.
///
/// Rows are in ascending distance order. Coordinates must be finite and
/// `k < points.len()`.
pub fn knn_neighbors(points: &[Coord<f64>], k: usize) -> Result<Vec<Vec<usize>>> {
    if k == 0 {
        return Err(Error::invalid_parameter("k", k, "must be at least 1"));
    }
    validate_points(points)?;
    let tree = KdTree::build(points);

    let mut boundary_ties = 0usize;
    let rows = points
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            // One extra candidate reveals ties at the k-th distance
            let mut found = tree.k_nearest(p, k + 1, Some(i));
            if found.len() > k && found[k].distance_sq == found[k - 1].distance_sq {
                boundary_ties += 1;
            }
            found.truncate(k);
            found.into_iter().map(|n| n.index).collect()
        })
        .collect();

    if boundary_ties > 0 {
        warn!(
            units = boundary_ties,
            k, "k-th nearest distance is tied; ties broken by ascending unit index"
        );
    }
    debug!(units = points.len(), k, "built KNN adjacency");
    Ok(rows)
}

/// Reference O(n² log n) KNN selection, used to cross-check [`knn_neighbors`].
pub fn knn_brute_force(points: &[Coord<f64>], k: usize) -> Result<Vec<Vec<usize>>> {
    validate_points(points)?;
    Ok(points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut dists: Vec<(f64, usize)> = points
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(j, q)| {
                    let dx = p.x - q.x;
                    let dy = p.y - q.y;
                    (dx * dx + dy * dy, j)
                })
                .collect();
            dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            dists.into_iter().take(k).map(|(_, j)| j).collect()
        })
        .collect())
}

fn validate_points(points: &[Coord<f64>]) -> Result<()> {
    for (unit, p) in points.iter().enumerate() {
        for value in [p.x, p.y] {
            if !value.is_finite() {
                return Err(Error::NonFiniteValue { unit, value });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scattered(n: usize) -> Vec<Coord<f64>> {
        (0..n)
            .map(|i| Coord {
                x: ((i * 7 + 13) % 23) as f64,
                y: ((i * 11 + 37) % 19) as f64,
            })
            .collect()
    }

    #[test]
    fn test_tree_matches_brute_force() {
        let pts = scattered(60);
        for k in [2, 3, 5, 8] {
            assert_eq!(knn_neighbors(&pts, k).unwrap(), knn_brute_force(&pts, k).unwrap());
        }
    }

    #[test]
    fn test_rows_exclude_self_and_have_k_entries() {
        let pts = scattered(30);
        let rows = knn_neighbors(&pts, 4).unwrap();
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), 4);
            assert!(!row.contains(&i));
        }
    }

    #[test]
    fn test_line_tie_break() {
        // Points on a line: unit 2 has units 1 and 3 both at distance 1
        let pts: Vec<Coord<f64>> = (0..5).map(|i| Coord { x: i as f64, y: 0.0 }).collect();
        let rows = knn_neighbors(&pts, 2).unwrap();
        assert_eq!(rows[2], vec![1, 3]);
        assert_eq!(rows[0], vec![1, 2]);
        let rows = knn_brute_force(&pts, 2).unwrap();
        assert_eq!(rows[4], vec![3, 2]);
    }

    #[test]
    fn test_non_finite_coordinate() {
        let mut pts = scattered(5);
        pts[3].y = f64::NAN;
        assert!(matches!(
            knn_neighbors(&pts, 2),
            Err(Error::NonFiniteValue { unit: 3, .. })
        ));
    }
}
