use crate::data::FeatureVector;
use crate::errors::ConformalError;
use crate::utils::{validate_count_parameter, validate_float_parameter};
use serde::{Deserialize, Serialize};

/// A linear decision function `w·x + b`.
///
/// The bias is trained as the weight of a constant feature of value one.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LinearModel {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LinearModel {
    pub fn zeros(num_features: usize) -> Self {
        LinearModel {
            weights: vec![0.0; num_features],
            bias: 0.0,
        }
    }

    #[inline]
    pub fn decision(&self, x: &FeatureVector) -> f64 {
        x.dot(&self.weights) + self.bias
    }

    /// `w += scale * x`, `b += scale`.
    #[inline]
    pub(crate) fn update(&mut self, x: &FeatureVector, scale: f64) {
        x.add_scaled_to(scale, &mut self.weights);
        self.bias += scale;
    }
}

/// Check the hyper-parameters common to the dual coordinate descent solvers.
pub(crate) fn validate_solver(cost: f64, tolerance: f64, max_iterations: usize) -> Result<(), ConformalError> {
    validate_float_parameter(cost, f64::MIN_POSITIVE, f64::MAX, "cost")?;
    validate_float_parameter(tolerance, f64::MIN_POSITIVE, f64::MAX, "tolerance")?;
    validate_count_parameter(max_iterations, 1, "maxIterations")
}

/// Convert a tuned value to an iteration count.
pub(crate) fn iterations_from(value: f64) -> Result<usize, ConformalError> {
    if value.is_finite() && value >= 1.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(ConformalError::InvalidParameter(
            "maxIterations".to_string(),
            "a positive integer".to_string(),
            value.to_string(),
        ))
    }
}
