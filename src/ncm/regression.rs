use crate::constants::{LOG_RESIDUAL_OFFSET, MIN_NORMALIZER};
use crate::errors::ConformalError;
use crate::utils::{items_to_strings, validate_positive_float_parameter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Regression nonconformity measures.
///
/// The normalized variants divide the absolute residual by a predicted
/// difficulty coming from a second (error) model, so that intervals are
/// tighter for easy records. `beta` smooths the normalization and keeps the
/// denominator away from zero.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub enum RegressionNcm {
    /// `|y - ŷ|`
    #[default]
    AbsoluteDifference,
    /// `|y - ŷ| / (σ̂ + β)`, σ̂ predicts the absolute residual.
    Normalized { beta: f64 },
    /// `|y - ŷ| / (exp(μ̂) + β)`, μ̂ predicts the log absolute residual.
    LogNormalized { beta: f64 },
}

impl fmt::Display for RegressionNcm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegressionNcm::AbsoluteDifference => write!(f, "AbsoluteDifference"),
            RegressionNcm::Normalized { beta } => write!(f, "Normalized(beta={})", beta),
            RegressionNcm::LogNormalized { beta } => write!(f, "LogNormalized(beta={})", beta),
        }
    }
}

impl FromStr for RegressionNcm {
    type Err = ConformalError;

    /// Parse a measure name, normalized measures take the default `beta`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AbsoluteDifference" => Ok(RegressionNcm::AbsoluteDifference),
            "Normalized" => Ok(RegressionNcm::Normalized {
                beta: crate::constants::DEFAULT_NCM_BETA,
            }),
            "LogNormalized" => Ok(RegressionNcm::LogNormalized {
                beta: crate::constants::DEFAULT_NCM_BETA,
            }),
            _ => Err(ConformalError::ParseString(
                s.to_string(),
                "RegressionNcm".to_string(),
                items_to_strings(vec!["AbsoluteDifference", "Normalized", "LogNormalized"]),
            )),
        }
    }
}

impl RegressionNcm {
    pub fn uses_error_model(&self) -> bool {
        !matches!(self, RegressionNcm::AbsoluteDifference)
    }

    pub fn beta(&self) -> Option<f64> {
        match self {
            RegressionNcm::AbsoluteDifference => None,
            RegressionNcm::Normalized { beta } | RegressionNcm::LogNormalized { beta } => Some(*beta),
        }
    }

    /// Change `beta`; only meaningful for the normalized measures.
    pub fn set_beta(&mut self, value: f64) -> Result<(), ConformalError> {
        validate_positive_float_parameter(value, "ncmBeta")?;
        match self {
            RegressionNcm::AbsoluteDifference => Err(ConformalError::InvalidParameter(
                "ncmBeta".to_string(),
                "a normalized nonconformity measure".to_string(),
                self.to_string(),
            )),
            RegressionNcm::Normalized { beta } | RegressionNcm::LogNormalized { beta } => {
                *beta = value;
                Ok(())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConformalError> {
        match self.beta() {
            Some(beta) => validate_positive_float_parameter(beta, "ncmBeta"),
            None => Ok(()),
        }
    }

    /// Target the error model is trained on, given an absolute residual.
    pub fn error_target(&self, abs_residual: f64) -> f64 {
        match self {
            RegressionNcm::LogNormalized { .. } => (abs_residual + LOG_RESIDUAL_OFFSET).ln(),
            _ => abs_residual,
        }
    }

    /// Divisor applied to the absolute residual, never below `MIN_NORMALIZER`.
    pub fn normalizer(&self, error_prediction: Option<f64>) -> f64 {
        match (self, error_prediction) {
            (RegressionNcm::Normalized { beta }, Some(p)) => (p.max(0.0) + beta).max(MIN_NORMALIZER),
            (RegressionNcm::LogNormalized { beta }, Some(p)) => (p.exp() + beta).max(MIN_NORMALIZER),
            _ => 1.0,
        }
    }

    pub fn score(&self, y: f64, y_hat: f64, normalizer: f64) -> f64 {
        (y - y_hat).abs() / normalizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizer_guards_zero() {
        let ncm = RegressionNcm::Normalized { beta: 0.0 };
        assert_eq!(ncm.normalizer(Some(-3.0)), MIN_NORMALIZER);
        assert_eq!(ncm.normalizer(Some(2.0)), 2.0);
        let log = RegressionNcm::LogNormalized { beta: 0.5 };
        assert_eq!(log.normalizer(Some(0.0)), 1.5);
        assert_eq!(RegressionNcm::AbsoluteDifference.normalizer(None), 1.0);
        assert_eq!(RegressionNcm::AbsoluteDifference.score(1.0, 3.5, 1.0), 2.5);
    }

    #[test]
    fn test_set_beta() {
        let mut abs = RegressionNcm::AbsoluteDifference;
        assert!(abs.set_beta(0.1).is_err());
        let mut ncm = RegressionNcm::LogNormalized { beta: 0.01 };
        ncm.set_beta(0.25).unwrap();
        assert_eq!(ncm.beta(), Some(0.25));
        assert!(ncm.set_beta(-1.0).is_err());
        assert!(RegressionNcm::Normalized { beta: -0.1 }.validate().is_err());
    }

    #[test]
    fn test_error_target() {
        let ncm = RegressionNcm::LogNormalized { beta: 0.0 };
        approx::assert_relative_eq!(ncm.error_target(1.0), (1.0 + LOG_RESIDUAL_OFFSET).ln());
        assert_eq!(RegressionNcm::Normalized { beta: 0.0 }.error_target(2.0), 2.0);
    }
}
