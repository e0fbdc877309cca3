//! # lisagis Core
//!
//! Core types and traits for the lisagis spatial autocorrelation library.
//!
//! This crate provides:
//! - `AttributeVector`: validated attribute values with cached moments
//! - `NeighborGraph`: sparse spatial weights, one row per unit
//! - `WeightMoments`: S0/S1/S2 weight sums used for analytic inference
//! - Algorithm traits for consistent API

pub mod attribute;
pub mod error;
pub mod graph;

pub use attribute::{AttributeVector, SpatialUnit};
pub use error::{Error, Result};
pub use graph::{NeighborGraph, WeightMoments};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::attribute::{AttributeVector, SpatialUnit};
    pub use crate::error::{Error, Result};
    pub use crate::graph::{NeighborGraph, WeightMoments};
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in lisagis.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
