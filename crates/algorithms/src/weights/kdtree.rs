//! 2D k-d tree for k-nearest-neighbor weights
//!
//! Provides O(k log n) average k-nearest-neighbor queries over unit
//! positions. Candidates are ranked by the pair `(distance², index)`, so
//! the answer is exactly the brute-force selection with distance ties
//! broken by ascending unit index.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use std::cmp::Ordering;

use geo_types::Coord;

/// A 2D k-d tree over unit positions.
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    points: Vec<Coord<f64>>,
}

#[derive(Debug)]
struct KdNode {
    /// Index into `points`
    point_idx: usize,
    /// Split dimension: 0 = x, 1 = y
    split_dim: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// One neighbor returned by a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance_sq: f64,
}

impl Neighbor {
    /// Ranking used everywhere: nearer first, then lower index.
    #[inline]
    pub fn rank(&self, other: &Neighbor) -> Ordering {
        self.distance_sq
            .total_cmp(&other.distance_sq)
            .then(self.index.cmp(&other.index))
    }
}

impl KdTree {
    /// Build a k-d tree from positions.
    ///
    /// Construction is O(n log² n) using median-of-coordinate splitting.
    /// Coordinates must be finite.
    pub fn build(points: &[Coord<f64>]) -> Self {
        if points.is_empty() {
            return Self {
                nodes: Vec::new(),
                points: Vec::new(),
            };
        }

        let mut indices: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        build_recursive(points, &mut indices, 0, &mut nodes);

        Self {
            nodes,
            points: points.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Find the k nearest points to `query`, skipping `exclude`.
    ///
    /// Returns up to k results sorted by `(distance², index)`.
    pub fn k_nearest(&self, query: Coord<f64>, k: usize, exclude: Option<usize>) -> Vec<Neighbor> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }

        // Sorted ascending by rank; the last element is the current worst
        let mut best: Vec<Neighbor> = Vec::with_capacity(k + 1);
        self.knn_recursive(0, query, k, exclude, &mut best);
        best
    }

    fn knn_recursive(
        &self,
        node_idx: usize,
        query: Coord<f64>,
        k: usize,
        exclude: Option<usize>,
        best: &mut Vec<Neighbor>,
    ) {
        let node = &self.nodes[node_idx];
        let p = self.points[node.point_idx];

        let dx = query.x - p.x;
        let dy = query.y - p.y;

        if exclude != Some(node.point_idx) {
            let candidate = Neighbor {
                index: node.point_idx,
                distance_sq: dx * dx + dy * dy,
            };
            let full = best.len() >= k;
            if !full || candidate.rank(&best[best.len() - 1]) == Ordering::Less {
                let pos = best
                    .binary_search_by(|held| held.rank(&candidate))
                    .unwrap_or_else(|e| e);
                best.insert(pos, candidate);
                if best.len() > k {
                    best.pop();
                }
            }
        }

        let diff = if node.split_dim == 0 { dx } else { dy };
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.knn_recursive(child, query, k, exclude, best);
        }

        let threshold = if best.len() >= k {
            best[best.len() - 1].distance_sq
        } else {
            f64::INFINITY
        };

        // `<=` so that equidistant points with lower indices are still visited
        if diff * diff <= threshold {
            if let Some(child) = second {
                self.knn_recursive(child, query, k, exclude, best);
            }
        }
    }
}

/// Recursively build the k-d tree.
fn build_recursive(
    points: &[Coord<f64>],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    let n = indices.len();
    let split_dim = (depth % 2) as u8;

    indices.sort_by(|&a, &b| {
        let (va, vb) = if split_dim == 0 {
            (points[a].x, points[b].x)
        } else {
            (points[a].y, points[b].y)
        };
        va.total_cmp(&vb)
    });

    let median = n / 2;
    let point_idx = indices[median];

    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx,
        split_dim,
        left: None,
        right: None,
    });

    if median > 0 {
        let left_idx = build_recursive(points, &mut indices[..median], depth + 1, nodes);
        nodes[node_idx].left = Some(left_idx);
    }

    if median + 1 < n {
        let right_idx = build_recursive(points, &mut indices[median + 1..], depth + 1, nodes);
        nodes[node_idx].right = Some(right_idx);
    }

    node_idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_points() -> Vec<Coord<f64>> {
        [
            (2.0, 3.0),
            (5.0, 4.0),
            (9.0, 6.0),
            (4.0, 7.0),
            (8.0, 1.0),
            (7.0, 2.0),
            (1.0, 8.0),
            (6.0, 5.0),
        ]
        .iter()
        .map(|&(x, y)| Coord { x, y })
        .collect()
    }

    fn brute_force(points: &[Coord<f64>], q: Coord<f64>, k: usize, exclude: Option<usize>) -> Vec<Neighbor> {
        let mut all: Vec<Neighbor> = points
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != exclude)
            .map(|(i, p)| Neighbor {
                index: i,
                distance_sq: (p.x - q.x).powi(2) + (p.y - q.y).powi(2),
            })
            .collect();
        all.sort_by(|a, b| a.rank(b));
        all.truncate(k);
        all
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::build(&[]);
        assert!(tree.is_empty());
        assert!(tree.k_nearest(Coord { x: 0.0, y: 0.0 }, 3, None).is_empty());
    }

    #[test]
    fn test_k_nearest_matches_brute_force() {
        let pts = sample_points();
        let tree = KdTree::build(&pts);
        assert_eq!(tree.len(), 8);

        for qx in 0..10 {
            for qy in 0..10 {
                let q = Coord { x: qx as f64 + 0.5, y: qy as f64 + 0.5 };
                for k in 1..=4 {
                    assert_eq!(tree.k_nearest(q, k, None), brute_force(&pts, q, k, None));
                }
            }
        }
    }

    #[test]
    fn test_exclude_skips_query_point() {
        let pts = sample_points();
        let tree = KdTree::build(&pts);
        let res = tree.k_nearest(pts[7], 3, Some(7));
        assert_eq!(res.len(), 3);
        assert!(res.iter().all(|n| n.index != 7));
        assert_eq!(res, brute_force(&pts, pts[7], 3, Some(7)));
    }

    #[test]
    fn test_ties_broken_by_index_on_grid() {
        // 5x5 unit grid: the centre has 4 neighbors at distance 1
        let pts: Vec<Coord<f64>> = (0..25)
            .map(|i| Coord { x: (i % 5) as f64, y: (i / 5) as f64 })
            .collect();
        let tree = KdTree::build(&pts);
        let res = tree.k_nearest(pts[12], 2, Some(12));
        let idx: Vec<usize> = res.iter().map(|n| n.index).collect();
        // candidates at distance 1 are 7, 11, 13, 17
        assert_eq!(idx, vec![7, 11]);

        for i in 0..25 {
            for k in [2, 4, 7] {
                assert_eq!(tree.k_nearest(pts[i], k, Some(i)), brute_force(&pts, pts[i], k, Some(i)));
            }
        }
    }

    #[test]
    fn test_duplicate_points() {
        let pts = vec![Coord { x: 1.0, y: 1.0 }; 6];
        let tree = KdTree::build(&pts);
        let idx: Vec<usize> = tree
            .k_nearest(pts[3], 3, Some(3))
            .iter()
            .map(|n| n.index)
            .collect();
        assert_eq!(idx, vec![0, 1, 2]);
    }

    #[test]
    fn test_more_than_available() {
        let pts = sample_points();
        let tree = KdTree::build(&pts);
        assert_eq!(tree.k_nearest(pts[0], 100, Some(0)).len(), pts.len() - 1);
    }
}
