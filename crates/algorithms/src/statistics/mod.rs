//! Spatial autocorrelation statistics
//!
//! - **global_moran**: Global Moran's I with analytic and permutation inference
//! - **local_moran**: Local Moran's I (LISA) with conditional permutation tests
//! - **inference**: Pseudo p-values and normal approximations shared by both

pub mod global_moran;
pub mod inference;
pub mod local_moran;

pub use global_moran::{global_moran, moran_statistic, GlobalMoran, GlobalMoranParams, GlobalMoranResult};
pub use inference::{normal_cdf, normal_p_value, pseudo_p_value, Alternative, PermutationSummary};
pub use local_moran::{
    local_moran, local_statistics, local_sum_identity_gap, ClusterClass, LocalMoran,
    LocalMoranParams, LocalMoranResult, LocalMoranSummary, Quadrant, DEFAULT_ALPHA,
};

use lisagis_core::{AttributeVector, Error, NeighborGraph, Result};

/// Default permutation count R
pub const DEFAULT_PERMUTATIONS: usize = 999;

/// Owned input for the [`Algorithm`](lisagis_core::Algorithm) implementations.
#[derive(Debug, Clone)]
pub struct MoranInput {
    pub values: AttributeVector,
    pub graph: NeighborGraph,
}

impl MoranInput {
    pub fn new(values: AttributeVector, graph: NeighborGraph) -> Self {
        Self { values, graph }
    }
}

/// Checks shared by both engines, in fail-fast order: alignment, unit
/// count, then variance.
pub(crate) fn validate_inputs(
    values: &AttributeVector,
    graph: &NeighborGraph,
    min_units: usize,
) -> Result<()> {
    graph.check_len(values.len())?;
    if values.len() < min_units {
        return Err(Error::InsufficientUnits {
            required: min_units,
            found: values.len(),
        });
    }
    values.require_variance()
}

pub(crate) fn validate_permutations(permutations: usize) -> Result<()> {
    if permutations == 0 {
        return Err(Error::invalid_parameter(
            "permutations",
            permutations,
            "at least one permutation is required",
        ));
    }
    Ok(())
}
