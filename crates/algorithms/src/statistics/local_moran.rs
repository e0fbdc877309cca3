//! Local Moran's I (LISA)
//!
//! Decomposes global Moran's I into one statistic per unit:
//!
//! `I_i = (z_i / m2) · Σ_j w_ij z_j`, with `m2 = Σ_k z_k² / n`
//!
//! Each unit is tested with a conditional permutation: its own value stays
//! put while the other n−1 values are reshuffled, so every unit gets its own
//! null distribution. Units run as independent tasks, each seeded from
//! `(seed, unit)`, writing into their own result slot.
//!
//! Under row-standardized weights `Σ_i I_i = n · I`, which ties the local
//! results back to the global statistic.

use lisagis_core::{Algorithm, AttributeVector, Error, NeighborGraph, Result};
use lisagis_parallel::{ParallelStrategy, ProcessingMode};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::inference::{pseudo_p_value, Alternative, PermutationSummary};
use super::{validate_inputs, validate_permutations, MoranInput, DEFAULT_PERMUTATIONS};
use crate::permutation::{PermutationEngine, DEFAULT_SEED};

/// Default significance threshold
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Parameters for local Moran's I
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalMoranParams {
    /// Conditional permutations per unit (≥ 1)
    pub permutations: usize,
    /// Top-level seed; unit i draws from stream i
    pub seed: u64,
    /// Significance threshold in (0, 1); a unit is significant when p ≤ alpha
    pub alpha: f64,
    /// How units are scheduled
    pub mode: ProcessingMode,
}

impl Default for LocalMoranParams {
    fn default() -> Self {
        Self {
            permutations: DEFAULT_PERMUTATIONS,
            seed: DEFAULT_SEED,
            alpha: DEFAULT_ALPHA,
            mode: ProcessingMode::default(),
        }
    }
}

/// Moran scatter-plot quadrant of a unit
///
/// "High" means strictly above the mean; a value exactly at the mean (or a
/// lag exactly zero) counts as low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quadrant {
    /// High value, high neighbors
    HH = 1,
    /// Low value, high neighbors
    LH = 2,
    /// Low value, low neighbors
    LL = 3,
    /// High value, low neighbors
    HL = 4,
}

impl Quadrant {
    pub fn classify(z: f64, lag: f64) -> Self {
        match (z > 0.0, lag > 0.0) {
            (true, true) => Quadrant::HH,
            (false, true) => Quadrant::LH,
            (false, false) => Quadrant::LL,
            (true, false) => Quadrant::HL,
        }
    }

    /// Conventional map code (1..=4)
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

/// Five-way cluster map class: quadrant masked by significance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterClass {
    NotSignificant = 0,
    HighHigh = 1,
    LowHigh = 2,
    LowLow = 3,
    HighLow = 4,
}

impl ClusterClass {
    pub fn new(quadrant: Quadrant, significant: bool) -> Self {
        if !significant {
            return ClusterClass::NotSignificant;
        }
        match quadrant {
            Quadrant::HH => ClusterClass::HighHigh,
            Quadrant::LH => ClusterClass::LowHigh,
            Quadrant::LL => ClusterClass::LowLow,
            Quadrant::HL => ClusterClass::HighLow,
        }
    }

    /// Conventional map code (0..=4)
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

/// Local Moran's I of one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalMoranResult {
    pub unit: usize,
    /// Local statistic I_i
    pub i: f64,
    /// Standardized value z_i / sd (scatter-plot x)
    pub z: f64,
    /// Spatial lag of the centered values, Σ_j w_ij z_j
    pub lag: f64,
    /// Spatial lag of the standardized values (scatter-plot y)
    pub standardized_lag: f64,
    pub quadrant: Quadrant,
    pub permutations: usize,
    /// One-sided pseudo p-value in the direction of the sign of I_i
    pub p_value: f64,
    /// `p_value <= alpha`
    pub significant: bool,
    pub cluster: ClusterClass,
    pub simulated: PermutationSummary,
}

/// Counts per cluster class plus the local/global identity check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalMoranSummary {
    pub units: usize,
    pub high_high: usize,
    pub low_high: usize,
    pub low_low: usize,
    pub high_low: usize,
    pub not_significant: usize,
    /// Σ_i I_i
    pub sum_i: f64,
}

impl LocalMoranSummary {
    pub fn from_results(results: &[LocalMoranResult]) -> Self {
        let mut summary = Self {
            units: results.len(),
            ..Default::default()
        };
        for r in results {
            summary.sum_i += r.i;
            match r.cluster {
                ClusterClass::HighHigh => summary.high_high += 1,
                ClusterClass::LowHigh => summary.low_high += 1,
                ClusterClass::LowLow => summary.low_low += 1,
                ClusterClass::HighLow => summary.high_low += 1,
                ClusterClass::NotSignificant => summary.not_significant += 1,
            }
        }
        summary
    }

    pub fn significant(&self) -> usize {
        self.units - self.not_significant
    }
}

/// |Σ_i I_i − n · I|, zero up to rounding for row-standardized weights.
pub fn local_sum_identity_gap(local: &[LocalMoranResult], global_i: f64) -> f64 {
    let sum: f64 = local.iter().map(|r| r.i).sum();
    (sum - local.len() as f64 * global_i).abs()
}

/// Local Moran's I algorithm
#[derive(Debug, Clone, Default)]
pub struct LocalMoran;

impl Algorithm for LocalMoran {
    type Input = MoranInput;
    type Output = Vec<LocalMoranResult>;
    type Params = LocalMoranParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Local Moran's I"
    }

    fn description(&self) -> &'static str {
        "Local indicators of spatial association with conditional permutation inference"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        local_moran(&input.values, &input.graph, &params)
    }
}

/// Local statistics I_i only, without permutation inference.
pub fn local_statistics(values: &AttributeVector, graph: &NeighborGraph) -> Result<Vec<f64>> {
    validate_inputs(values, graph, 2)?;
    let z = values.deviations();
    let m2 = values.m2();
    Ok((0..values.len())
        .map(|i| z[i] / m2 * graph.lag_at(i, z))
        .collect())
}

/// Compute local Moran's I with conditional permutation inference.
///
/// # Arguments
/// * `values` - Attribute vector aligned with the graph
/// * `graph` - Spatial weights
/// * `params` - Permutations, seed, alpha and processing mode
///
/// # Returns
/// One result per unit, in unit order. Output is identical for every
/// processing mode.
///
/// # Errors
/// [`Error::DegenerateInput`] for a constant attribute vector, raised
/// before any permutation is drawn; [`Error::InvalidParameter`] for alpha
/// outside (0, 1) or zero permutations.
pub fn local_moran(
    values: &AttributeVector,
    graph: &NeighborGraph,
    params: &LocalMoranParams,
) -> Result<Vec<LocalMoranResult>> {
    validate_inputs(values, graph, 2)?;
    validate_permutations(params.permutations)?;
    if !(params.alpha > 0.0 && params.alpha < 1.0) {
        return Err(Error::invalid_parameter("alpha", params.alpha, "must lie in (0, 1)"));
    }

    let n = values.len();
    let z = values.deviations();
    let m2 = values.m2();
    let sd = values.std_dev();
    let engine = PermutationEngine::new(params.seed);
    let permutations = params.permutations;

    debug!(
        units = n,
        permutations,
        seed = params.seed,
        alpha = params.alpha,
        threads = params.mode.threads(),
        "local Moran's I conditional permutation test"
    );

    let results = params
        .mode
        .par_map_init(
            0..n,
            || Vec::with_capacity(permutations),
            |draws: &mut Vec<f64>, unit| {
                let row = graph.neighbors(unit);
                let scale = z[unit] / m2;
                let lag = graph.lag_at(unit, z);
                let observed = scale * lag;

                draws.clear();
                let mut sampler = engine.conditional(n, unit);
                for _ in 0..permutations {
                    let picked = sampler.draw(row.len());
                    let lag_perm: f64 = row
                        .iter()
                        .zip(picked)
                        .map(|(&(_, w), &j)| w * z[j])
                        .sum();
                    draws.push(scale * lag_perm);
                }

                let p_value = pseudo_p_value(observed, &draws[..], 0.0, Alternative::Directional);
                let significant = p_value <= params.alpha;
                let quadrant = Quadrant::classify(z[unit], lag);
                trace!(unit, i = observed, p_value, ?quadrant, "local statistic");

                LocalMoranResult {
                    unit,
                    i: observed,
                    z: z[unit] / sd,
                    lag,
                    standardized_lag: lag / sd,
                    quadrant,
                    permutations,
                    p_value,
                    significant,
                    cluster: ClusterClass::new(quadrant, significant),
                    simulated: PermutationSummary::from_draws(observed, &draws[..]),
                }
            },
        )
        .map_err(|e| Error::ThreadPool(e.to_string()))?;

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::global_moran::{global_moran, GlobalMoranParams};
    use crate::weights::{
        build_weights, lattice_adjacency, Contiguity, WeightsInput, WeightsParams, WeightsStrategy,
    };

    fn queen_grid(rows: usize, cols: usize) -> NeighborGraph {
        let adj = lattice_adjacency(rows, cols, Contiguity::Queen);
        build_weights(
            WeightsInput::Adjacency(&adj),
            &WeightsParams {
                strategy: WeightsStrategy::Contiguity(Contiguity::Queen),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn params(permutations: usize) -> LocalMoranParams {
        LocalMoranParams {
            permutations,
            ..Default::default()
        }
    }

    #[test]
    fn test_quadrant_classification() {
        assert_eq!(Quadrant::classify(1.0, 2.0), Quadrant::HH);
        assert_eq!(Quadrant::classify(-1.0, 2.0), Quadrant::LH);
        assert_eq!(Quadrant::classify(-1.0, -2.0), Quadrant::LL);
        assert_eq!(Quadrant::classify(1.0, -2.0), Quadrant::HL);
        // ties count as low
        assert_eq!(Quadrant::classify(0.0, 0.0), Quadrant::LL);
        assert_eq!(Quadrant::HL.code(), 4);
    }

    #[test]
    fn test_cluster_class_masks_insignificant() {
        assert_eq!(ClusterClass::new(Quadrant::HH, false), ClusterClass::NotSignificant);
        assert_eq!(ClusterClass::new(Quadrant::LH, true), ClusterClass::LowHigh);
        assert_eq!(ClusterClass::NotSignificant.code(), 0);
    }

    #[test]
    fn test_local_statistic_formula() {
        let g = queen_grid(3, 3);
        let y = AttributeVector::new(vec![1.0, 4.0, 2.0, 8.0, 5.0, 7.0, 3.0, 9.0, 6.0]).unwrap();
        let results = local_moran(&y, &g, &params(19)).unwrap();
        let z = y.deviations();
        let m2 = y.m2();
        for r in &results {
            let lag: f64 = g.neighbors(r.unit).iter().map(|&(j, w)| w * z[j]).sum();
            assert!((r.i - z[r.unit] / m2 * lag).abs() < 1e-12);
            assert!((r.lag - lag).abs() < 1e-12);
            assert_eq!(r.permutations, 19);
        }
        let bare = local_statistics(&y, &g).unwrap();
        for (r, b) in results.iter().zip(&bare) {
            assert_eq!(r.i, *b);
        }
    }

    #[test]
    fn test_sum_matches_n_times_global() {
        let g = queen_grid(6, 6);
        let y = AttributeVector::new((0..36).map(|i| ((i * 13) % 17) as f64 + 0.5 * i as f64).collect()).unwrap();
        let local = local_moran(&y, &g, &params(9)).unwrap();
        let global = global_moran(&y, &g, &GlobalMoranParams { permutations: 9, ..Default::default() }).unwrap();
        assert!(local_sum_identity_gap(&local, global.i) < 1e-9);
    }

    #[test]
    fn test_hotspot_detected() {
        // 3x3 block of high values in the corner of a 9x9 grid
        let g = queen_grid(9, 9);
        let y: Vec<f64> = (0..81)
            .map(|i| if i / 9 < 3 && i % 9 < 3 { 100.0 } else { 1.0 + (i % 5) as f64 })
            .collect();
        let results = local_moran(&AttributeVector::new(y).unwrap(), &g, &params(499)).unwrap();
        // centre of the block: unit 10
        assert_eq!(results[10].quadrant, Quadrant::HH);
        assert!(results[10].significant, "p = {}", results[10].p_value);
        assert_eq!(results[10].cluster, ClusterClass::HighHigh);
    }

    #[test]
    fn test_deterministic_across_modes() {
        let g = queen_grid(7, 7);
        let y = AttributeVector::new((0..49).map(|i| ((i * 31) % 23) as f64).collect()).unwrap();
        let seq = local_moran(
            &y,
            &g,
            &LocalMoranParams { mode: ProcessingMode::Sequential, ..params(99) },
        )
        .unwrap();
        let par = local_moran(
            &y,
            &g,
            &LocalMoranParams { mode: ProcessingMode::ParallelWith(3), ..params(99) },
        )
        .unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn test_p_value_bounds() {
        let g = queen_grid(5, 5);
        let y = AttributeVector::new((0..25).map(|i| (i % 7) as f64).collect()).unwrap();
        for r in local_moran(&y, &g, &params(99)).unwrap() {
            assert!(r.p_value >= 0.01 - 1e-12 && r.p_value <= 1.0);
            assert_eq!(r.significant, r.p_value <= DEFAULT_ALPHA);
        }
    }

    #[test]
    fn test_constant_vector_fails_fast() {
        let g = queen_grid(3, 3);
        let y = AttributeVector::new(vec![2.5; 9]).unwrap();
        assert!(matches!(
            local_moran(&y, &g, &params(999)),
            Err(Error::DegenerateInput { .. })
        ));
        assert!(matches!(local_statistics(&y, &g), Err(Error::DegenerateInput { .. })));
    }

    #[test]
    fn test_alpha_validation() {
        let g = queen_grid(3, 3);
        let y = AttributeVector::new((0..9).map(|v| v as f64).collect()).unwrap();
        for alpha in [0.0, 1.0, -0.1, f64::NAN] {
            let p = LocalMoranParams { alpha, ..params(9) };
            assert!(matches!(
                local_moran(&y, &g, &p),
                Err(Error::InvalidParameter { name: "alpha", .. })
            ));
        }
    }

    #[test]
    fn test_summary_counts() {
        let g = queen_grid(9, 9);
        let y: Vec<f64> = (0..81).map(|i| if i % 9 < 4 { 10.0 } else { 0.0 } + (i % 3) as f64).collect();
        let results = local_moran(&AttributeVector::new(y).unwrap(), &g, &params(99)).unwrap();
        let s = LocalMoranSummary::from_results(&results);
        assert_eq!(s.units, 81);
        assert_eq!(
            s.high_high + s.low_high + s.low_low + s.high_low + s.not_significant,
            81
        );
        assert_eq!(s.significant(), results.iter().filter(|r| r.significant).count());
    }
}
