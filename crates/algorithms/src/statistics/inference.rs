//! Randomization inference shared by the global and local engines

use serde::{Deserialize, Serialize};

/// Which permuted draws count as "at least as extreme" as the observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Alternative {
    /// Same side of the reference value as the observation
    #[default]
    Directional,
    /// Draws ≥ observed
    Greater,
    /// Draws ≤ observed
    Less,
    /// |draw − reference| ≥ |observed − reference|
    TwoSided,
}

/// Moments of the permutation distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PermutationSummary {
    /// Mean of the permuted statistics
    pub mean: f64,
    /// Population standard deviation of the permuted statistics
    pub std_dev: f64,
    /// (observed − mean) / std_dev, or 0 when the draws do not vary
    pub z_score: f64,
}

impl PermutationSummary {
    pub fn from_draws(observed: f64, draws: &[f64]) -> Self {
        if draws.is_empty() {
            return Self {
                mean: f64::NAN,
                std_dev: f64::NAN,
                z_score: 0.0,
            };
        }
        let r = draws.len() as f64;
        let mean = draws.iter().sum::<f64>() / r;
        let var = draws.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / r;
        let std_dev = var.sqrt();
        let z_score = if std_dev > 0.0 {
            (observed - mean) / std_dev
        } else {
            0.0
        };
        Self {
            mean,
            std_dev,
            z_score,
        }
    }
}

/// Pseudo p-value `(extreme + 1) / (R + 1)`.
///
/// `reference` is the value deviations are measured from: E[I] for the
/// global statistic, zero for a local one.
pub fn pseudo_p_value(observed: f64, draws: &[f64], reference: f64, alternative: Alternative) -> f64 {
    let extreme = draws
        .iter()
        .filter(|&&d| match alternative {
            Alternative::Greater => d >= observed,
            Alternative::Less => d <= observed,
            Alternative::Directional => {
                if observed >= reference {
                    d >= observed
                } else {
                    d <= observed
                }
            }
            Alternative::TwoSided => (d - reference).abs() >= (observed - reference).abs(),
        })
        .count();
    (extreme as f64 + 1.0) / (draws.len() as f64 + 1.0)
}

/// Two-sided p-value of a standard normal z-score.
pub fn normal_p_value(z: f64) -> f64 {
    2.0 * normal_cdf(-z.abs())
}

/// Approximate CDF of standard normal distribution
/// Uses Abramowitz & Stegun approximation (error < 7.5e-8)
pub fn normal_cdf(x: f64) -> f64 {
    if x < -8.0 { return 0.0; }
    if x > 8.0 { return 1.0; }

    let t = 1.0 / (1.0 + 0.2316419 * x.abs());
    let d = 0.3989422804014327; // 1/sqrt(2*pi)
    let p = d * (-x * x / 2.0).exp()
        * (t * (0.3193815
            + t * (-0.3565638
                + t * (1.781478
                    + t * (-1.821256
                        + t * 1.330274)))));

    if x > 0.0 { 1.0 - p } else { p }
}
