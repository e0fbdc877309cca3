//! # lisagis Parallel
//!
//! Parallel execution strategies for the statistic engines.
//!
//! This crate provides:
//! - `ProcessingMode`: sequential, all-cores, or a dedicated pool of N threads
//! - `ParallelStrategy`: order-preserving parallel map over index ranges

pub mod strategy;

pub use rayon::ThreadPoolBuildError;
pub use strategy::{ParallelStrategy, ProcessingMode};
