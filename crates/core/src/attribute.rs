//! Attribute vectors and the spatial units they belong to

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A spatial unit: an index-aligned identifier carrying one attribute value.
///
/// Geometry never reaches the core; it is reduced to a neighbor list by the
/// caller or by the weights builder beforehand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialUnit {
    pub id: usize,
    pub value: f64,
}

impl SpatialUnit {
    pub fn new(id: usize, value: f64) -> Self {
        Self { id, value }
    }
}

/// Immutable attribute vector with cached central moments.
///
/// Construction only checks finiteness. Zero variance is a property of the
/// analysis, not of the data, so it is checked by [`require_variance`]
/// which both Moran engines call before doing any permutation work.
///
/// [`require_variance`]: AttributeVector::require_variance
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeVector {
    values: Vec<f64>,
    mean: f64,
    /// Centered values `z_i = y_i - mean`
    deviations: Vec<f64>,
    /// Σ z_i²
    sum_sq: f64,
    /// Σ z_i⁴
    sum_quad: f64,
}

impl AttributeVector {
    /// Build an attribute vector, rejecting empty input and non-finite values.
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::InsufficientUnits {
                required: 1,
                found: 0,
            });
        }
        if let Some((unit, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(Error::NonFiniteValue { unit, value });
        }

        let n = values.len() as f64;
        // A constant vector takes its value as the exact mean so every
        // deviation is exactly zero
        let first = values[0];
        let mean = if values.iter().all(|&v| v == first) {
            first
        } else {
            values.iter().sum::<f64>() / n
        };
        let deviations: Vec<f64> = values.iter().map(|v| v - mean).collect();
        let sum_sq = deviations.iter().map(|d| d * d).sum::<f64>();
        let sum_quad = deviations.iter().map(|d| d.powi(4)).sum::<f64>();

        Ok(Self {
            values,
            mean,
            deviations,
            sum_sq,
            sum_quad,
        })
    }

    /// Build from units whose ids must be exactly `0..n` (in any order).
    pub fn from_units(units: &[SpatialUnit]) -> Result<Self> {
        let mut values = vec![f64::NAN; units.len()];
        let mut seen = vec![false; units.len()];
        for unit in units {
            if unit.id >= units.len() || seen[unit.id] {
                return Err(Error::invalid_parameter(
                    "unit.id",
                    unit.id,
                    format!("ids must be a permutation of 0..{}", units.len()),
                ));
            }
            seen[unit.id] = true;
            values[unit.id] = unit.value;
        }
        Self::new(values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Mean-centered values `z`.
    pub fn deviations(&self) -> &[f64] {
        &self.deviations
    }

    /// Sum of squared deviations, Σ z_i².
    pub fn sum_sq(&self) -> f64 {
        self.sum_sq
    }

    /// Second central moment (population variance), Σ z_i² / n.
    pub fn m2(&self) -> f64 {
        self.sum_sq / self.len() as f64
    }

    /// Fourth central moment, Σ z_i⁴ / n.
    pub fn m4(&self) -> f64 {
        self.sum_quad / self.len() as f64
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> f64 {
        self.m2().sqrt()
    }

    /// Sample kurtosis `b2 = m4 / m2²` used by the randomization variance.
    pub fn kurtosis(&self) -> f64 {
        let m2 = self.m2();
        self.m4() / (m2 * m2)
    }

    /// Whether the values vary at all, i.e. Σ z² is strictly positive.
    ///
    /// Only the spread counts, never its size relative to the mean, so
    /// values on a large offset still qualify.
    pub fn has_variance(&self) -> bool {
        self.sum_sq > 0.0
    }

    /// Fail with [`Error::DegenerateInput`] if the vector is constant.
    pub fn require_variance(&self) -> Result<()> {
        if self.has_variance() {
            Ok(())
        } else {
            Err(Error::DegenerateInput {
                reason: format!(
                    "attribute vector of {} units has zero variance (mean {})",
                    self.len(),
                    self.mean
                ),
            })
        }
    }

    /// Values rescaled to zero mean and unit population variance.
    pub fn standardized(&self) -> Vec<f64> {
        let sd = self.std_dev();
        self.deviations.iter().map(|z| z / sd).collect()
    }
}

impl TryFrom<Vec<f64>> for AttributeVector {
    type Error = Error;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Self::new(values)
    }
}

impl TryFrom<&[f64]> for AttributeVector {
    type Error = Error;

    fn try_from(values: &[f64]) -> Result<Self> {
        Self::new(values.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moments() {
        let y = AttributeVector::new(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((y.mean() - 2.5).abs() < 1e-12);
        assert!((y.sum_sq() - 5.0).abs() < 1e-12);
        assert!((y.m2() - 1.25).abs() < 1e-12);
        // Σ z⁴ = 2 * (1.5⁴ + 0.5⁴) = 10.25
        assert!((y.m4() - 10.25 / 4.0).abs() < 1e-12);
        assert!((y.kurtosis() - (10.25 / 4.0) / (1.25 * 1.25)).abs() < 1e-12);
    }

    #[test]
    fn test_standardized_has_unit_variance() {
        let y = AttributeVector::new(vec![3.0, 7.0, 1.0, 9.0, 5.0]).unwrap();
        let s = y.standardized();
        let mean = s.iter().sum::<f64>() / s.len() as f64;
        let var = s.iter().map(|v| v * v).sum::<f64>() / s.len() as f64;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_vector_is_degenerate() {
        let y = AttributeVector::new(vec![0.1; 17]).unwrap();
        assert!(!y.has_variance());
        assert!(matches!(
            y.require_variance(),
            Err(Error::DegenerateInput { .. })
        ));

        assert!(y.deviations().iter().all(|&d| d == 0.0));

        let zeros = AttributeVector::new(vec![0.0; 4]).unwrap();
        assert!(zeros.require_variance().is_err());
    }

    #[test]
    fn test_small_spread_on_large_offset_has_variance() {
        let y = AttributeVector::new(vec![1e13, 1e13 + 1.0, 1e13 + 1.0, 1e13]).unwrap();
        assert!(y.has_variance());
        assert!(y.require_variance().is_ok());
        assert!((y.m2() - 0.25).abs() < 1e-12);

        let tiny = AttributeVector::new(vec![-3e-9, 3e-9, 0.0]).unwrap();
        assert!(tiny.require_variance().is_ok());
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = AttributeVector::new(vec![1.0, f64::NAN, 3.0]).unwrap_err();
        assert!(matches!(err, Error::NonFiniteValue { unit: 1, .. }));

        let err = AttributeVector::new(vec![1.0, 2.0, f64::INFINITY]).unwrap_err();
        assert!(matches!(err, Error::NonFiniteValue { unit: 2, .. }));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(
            AttributeVector::new(Vec::new()),
            Err(Error::InsufficientUnits { .. })
        ));
    }

    #[test]
    fn test_from_units_reorders_by_id() {
        let units = [
            SpatialUnit::new(2, 30.0),
            SpatialUnit::new(0, 10.0),
            SpatialUnit::new(1, 20.0),
        ];
        let y = AttributeVector::from_units(&units).unwrap();
        assert_eq!(y.values(), &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_from_units_rejects_gaps_and_duplicates() {
        let gap = [SpatialUnit::new(0, 1.0), SpatialUnit::new(2, 2.0)];
        assert!(AttributeVector::from_units(&gap).is_err());

        let dup = [SpatialUnit::new(0, 1.0), SpatialUnit::new(0, 2.0)];
        assert!(AttributeVector::from_units(&dup).is_err());
    }
}
