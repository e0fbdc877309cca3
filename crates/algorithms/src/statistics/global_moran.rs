//! Global Moran's I
//!
//! `I = (n / S0) · Σ_i z_i·lag_i / Σ_i z_i²` with `lag_i = Σ_j w_ij z_j`
//! taken over each unit's sparse neighbor row.
//!
//! Inference comes in two flavours:
//! - **Analytic**: E[I] = −1/(n−1) and the variance under the randomization
//!   assumption (Cliff & Ord 1981), giving a z-score and a normal p-value
//! - **Permutation**: R random relabelings of the attribute vector, giving
//!   a pseudo p-value that does not rely on distributional assumptions

use lisagis_core::{Algorithm, AttributeVector, Error, NeighborGraph, Result};
use lisagis_parallel::{ParallelStrategy, ProcessingMode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::inference::{normal_p_value, pseudo_p_value, Alternative, PermutationSummary};
use super::{validate_inputs, validate_permutations, MoranInput, DEFAULT_PERMUTATIONS};
use crate::permutation::{PermutationEngine, DEFAULT_SEED};

/// The randomization variance has (n−1)(n−2)(n−3) in its denominator
const MIN_UNITS: usize = 4;

/// Parameters for global Moran's I
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalMoranParams {
    /// Number of random permutations R (≥ 1)
    pub permutations: usize,
    /// Seed of the permutation streams
    pub seed: u64,
    /// Tail of the pseudo p-value
    pub alternative: Alternative,
    /// How the permutation draws are scheduled
    pub mode: ProcessingMode,
}

impl Default for GlobalMoranParams {
    fn default() -> Self {
        Self {
            permutations: DEFAULT_PERMUTATIONS,
            seed: DEFAULT_SEED,
            alternative: Alternative::default(),
            mode: ProcessingMode::default(),
        }
    }
}

/// Result of global Moran's I
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalMoranResult {
    /// Observed Moran's I
    pub i: f64,
    /// Expected I under the null, −1/(n−1)
    pub expected: f64,
    /// Variance of I under randomization
    pub variance: f64,
    /// (I − E[I]) / sqrt(Var[I])
    pub z_score: f64,
    /// Two-sided normal p-value of `z_score`
    pub p_norm: f64,
    /// Permutation count R
    pub permutations: usize,
    /// Pseudo p-value from the permutation distribution
    pub p_value: f64,
    pub alternative: Alternative,
    /// Seed that reproduces `p_value`
    pub seed: u64,
    /// Moments of the permuted statistics
    pub simulated: PermutationSummary,
}

/// Global Moran's I algorithm
#[derive(Debug, Clone, Default)]
pub struct GlobalMoran;

impl Algorithm for GlobalMoran {
    type Input = MoranInput;
    type Output = GlobalMoranResult;
    type Params = GlobalMoranParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Global Moran's I"
    }

    fn description(&self) -> &'static str {
        "Global spatial autocorrelation with analytic and permutation inference"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        global_moran(&input.values, &input.graph, &params)
    }
}

/// Moran's I of centered values `z` over `graph`.
///
/// `sum_sq` is Σ z² and `s0` the total weight; both are invariant under
/// permutation and are passed in so that draws do not recompute them.
pub fn moran_statistic(z: &[f64], sum_sq: f64, s0: f64, graph: &NeighborGraph) -> f64 {
    let cross: f64 = z
        .iter()
        .enumerate()
        .map(|(i, zi)| zi * graph.lag_at(i, z))
        .sum();
    (z.len() as f64 / s0) * cross / sum_sq
}

/// Compute global Moran's I with analytic and permutation inference.
///
/// # Arguments
/// * `values` - Attribute vector aligned with the graph
/// * `graph` - Spatial weights
/// * `params` - Permutation count, seed, tail and processing mode
///
/// # Errors
/// [`Error::DegenerateInput`] for a constant attribute vector, raised
/// before any permutation is drawn; [`Error::SizeMismatch`],
/// [`Error::InsufficientUnits`] and [`Error::InvalidParameter`] for
/// inconsistent input.
pub fn global_moran(
    values: &AttributeVector,
    graph: &NeighborGraph,
    params: &GlobalMoranParams,
) -> Result<GlobalMoranResult> {
    validate_inputs(values, graph, MIN_UNITS)?;
    validate_permutations(params.permutations)?;

    let n = values.len();
    let nf = n as f64;
    let z = values.deviations();
    let sum_sq = values.sum_sq();
    let moments = graph.moments();
    let s0 = moments.s0;

    let observed = moran_statistic(z, sum_sq, s0, graph);
    let expected = -1.0 / (nf - 1.0);

    // Variance under randomization
    let (s1, s2) = (moments.s1, moments.s2);
    let s02 = s0 * s0;
    let b2 = values.kurtosis();
    let a = nf * ((nf * nf - 3.0 * nf + 3.0) * s1 - nf * s2 + 3.0 * s02);
    let b = b2 * ((nf * nf - nf) * s1 - 2.0 * nf * s2 + 6.0 * s02);
    let denom = (nf - 1.0) * (nf - 2.0) * (nf - 3.0) * s02;
    let variance = (a - b) / denom - expected * expected;

    let (z_score, p_norm) = if variance > 0.0 {
        let z_score = (observed - expected) / variance.sqrt();
        (z_score, normal_p_value(z_score))
    } else {
        debug!(variance, "non-positive randomization variance; z-score set to 0");
        (0.0, 1.0)
    };

    debug!(
        units = n,
        permutations = params.permutations,
        seed = params.seed,
        threads = params.mode.threads(),
        "global Moran's I permutation test"
    );

    let engine = PermutationEngine::new(params.seed);
    let draws = params
        .mode
        .par_map_init(
            0..params.permutations,
            || Vec::with_capacity(n),
            |shuffled: &mut Vec<f64>, r| {
                engine.shuffle_into(z, r as u64, shuffled);
                moran_statistic(shuffled, sum_sq, s0, graph)
            },
        )
        .map_err(|e| Error::ThreadPool(e.to_string()))?;

    let p_value = pseudo_p_value(observed, &draws, expected, params.alternative);
    let simulated = PermutationSummary::from_draws(observed, &draws);

    Ok(GlobalMoranResult {
        i: observed,
        expected,
        variance,
        z_score,
        p_norm,
        permutations: params.permutations,
        p_value,
        alternative: params.alternative,
        seed: params.seed,
        simulated,
    })
}
