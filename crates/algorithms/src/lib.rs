//! # lisagis Algorithms
//!
//! Spatial autocorrelation analysis for lisagis.
//!
//! ## Available Algorithm Categories
//!
//! - **weights**: KNN and contiguity spatial weights, row-standardized
//! - **permutation**: Seedable, order-independent permutation streams
//! - **statistics**: Global Moran's I and local Moran's I (LISA)
//! - **analysis**: One-call pipeline driven by an immutable configuration

pub mod analysis;
pub mod permutation;
pub mod statistics;
pub mod weights;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::analysis::{run_analysis, Analysis, AnalysisConfig};
    pub use crate::permutation::{PermutationEngine, DEFAULT_SEED};
    pub use crate::statistics::{
        global_moran, local_moran, Alternative, ClusterClass, GlobalMoran, GlobalMoranParams,
        GlobalMoranResult, LocalMoran, LocalMoranParams, LocalMoranResult, LocalMoranSummary,
        MoranInput, Quadrant,
    };
    pub use crate::weights::{
        build_weights, lattice_adjacency, Contiguity, WeightsInput, WeightsParams,
        WeightsStrategy,
    };
    pub use lisagis_core::prelude::*;
    pub use lisagis_parallel::ProcessingMode;
}
