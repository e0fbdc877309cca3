//! End-to-end spatial autocorrelation run
//!
//! One immutable [`AnalysisConfig`] carries every knob (k, strategy, seed,
//! R, alpha, processing mode). [`run_analysis`] builds the weights once and
//! feeds the same graph and attribute vector to both engines.

use lisagis_core::{AttributeVector, NeighborGraph, Result};
use lisagis_parallel::ProcessingMode;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::permutation::DEFAULT_SEED;
use crate::statistics::{
    global_moran, local_moran, Alternative, GlobalMoranParams, GlobalMoranResult,
    LocalMoranParams, LocalMoranResult, LocalMoranSummary, DEFAULT_ALPHA, DEFAULT_PERMUTATIONS,
};
use crate::weights::{build_weights, WeightsInput, WeightsParams, WeightsStrategy, DEFAULT_K};

/// Configuration of one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Neighbor count for KNN weights
    pub k: usize,
    pub strategy: WeightsStrategy,
    /// Seed shared by the global and local permutation tests
    pub seed: u64,
    /// Permutation count R for both tests
    pub permutations: usize,
    /// Significance threshold for the cluster map
    pub alpha: f64,
    /// Tail of the global pseudo p-value
    pub alternative: Alternative,
    pub mode: ProcessingMode,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            strategy: WeightsStrategy::default(),
            seed: DEFAULT_SEED,
            permutations: DEFAULT_PERMUTATIONS,
            alpha: DEFAULT_ALPHA,
            alternative: Alternative::default(),
            mode: ProcessingMode::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn weights_params(&self) -> WeightsParams {
        WeightsParams {
            k: self.k,
            strategy: self.strategy,
        }
    }

    pub fn global_params(&self) -> GlobalMoranParams {
        GlobalMoranParams {
            permutations: self.permutations,
            seed: self.seed,
            alternative: self.alternative,
            mode: self.mode,
        }
    }

    pub fn local_params(&self) -> LocalMoranParams {
        LocalMoranParams {
            permutations: self.permutations,
            seed: self.seed,
            alpha: self.alpha,
            mode: self.mode,
        }
    }
}

/// Everything one run produces, ready for an external renderer
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub config: AnalysisConfig,
    #[serde(skip)]
    pub graph: NeighborGraph,
    pub global: GlobalMoranResult,
    pub local: Vec<LocalMoranResult>,
    pub summary: LocalMoranSummary,
}

/// Build weights and run both Moran engines.
///
/// Weight construction errors surface first, then a degenerate attribute
/// vector, before any permutation work starts.
pub fn run_analysis(
    input: WeightsInput<'_>,
    values: &AttributeVector,
    config: &AnalysisConfig,
) -> Result<Analysis> {
    let graph = build_weights(input, &config.weights_params())?;
    graph.check_len(values.len())?;
    values.require_variance()?;

    let global = global_moran(values, &graph, &config.global_params())?;
    let local = local_moran(values, &graph, &config.local_params())?;
    let summary = LocalMoranSummary::from_results(&local);

    info!(
        units = values.len(),
        i = global.i,
        p_value = global.p_value,
        significant = summary.significant(),
        "spatial autocorrelation analysis complete"
    );

    Ok(Analysis {
        config: *config,
        graph,
        global,
        local,
        summary,
    })
}
