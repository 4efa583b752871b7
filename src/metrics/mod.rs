//! Metrics
//!
//! Evaluation of conformal classifiers, conformal regressors and
//! probabilistic (Venn-ABERS) predictors on labelled test records.
pub mod classification;
pub mod evaluation;
pub mod probabilistic;
pub mod regression;

pub use evaluation::{is_comparison_better, Metric};

use crate::errors::ConformalError;
use std::collections::BTreeMap;

/// The p-values predicted for a test record together with its true label.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationOutcome {
    pub label: i64,
    pub p_values: BTreeMap<i64, f64>,
}

impl ClassificationOutcome {
    /// Labels whose p-value exceeds the significance level.
    pub fn prediction_set(&self, significance: f64) -> Vec<i64> {
        self.p_values
            .iter()
            .filter(|(_, p)| **p > significance)
            .map(|(l, _)| *l)
            .collect()
    }
}

/// The prediction interval of a test record, at the evaluated confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionOutcome {
    pub y: f64,
    pub y_hat: f64,
    pub lower: f64,
    pub upper: f64,
}

impl RegressionOutcome {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn covers(&self) -> bool {
        self.lower <= self.y && self.y <= self.upper
    }
}

/// Class probabilities of a test record with the width of their interval.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilisticOutcome {
    pub label: i64,
    pub probabilities: BTreeMap<i64, f64>,
    pub interval_width: f64,
}

/// Predictions collected over a test set, pooled across test splits.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationData {
    Classification(Vec<ClassificationOutcome>),
    /// Intervals were computed at `confidence`.
    Regression {
        confidence: f64,
        outcomes: Vec<RegressionOutcome>,
    },
    Probabilistic(Vec<ProbabilisticOutcome>),
}

impl EvaluationData {
    pub fn kind(&self) -> &'static str {
        match self {
            EvaluationData::Classification(_) => "classification",
            EvaluationData::Regression { .. } => "regression",
            EvaluationData::Probabilistic(_) => "probabilistic",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EvaluationData::Classification(v) => v.len(),
            EvaluationData::Regression { outcomes, .. } => outcomes.len(),
            EvaluationData::Probabilistic(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append the outcomes of another evaluation of the same kind.
    pub fn extend(&mut self, other: EvaluationData) -> Result<(), ConformalError> {
        match (self, other) {
            (EvaluationData::Classification(a), EvaluationData::Classification(b)) => a.extend(b),
            (EvaluationData::Probabilistic(a), EvaluationData::Probabilistic(b)) => a.extend(b),
            (
                EvaluationData::Regression { confidence, outcomes },
                EvaluationData::Regression {
                    confidence: other_confidence,
                    outcomes: other_outcomes,
                },
            ) if *confidence == other_confidence => outcomes.extend(other_outcomes),
            (a, b) => {
                return Err(ConformalError::InvalidParameter(
                    "evaluation data".to_string(),
                    format!("{} outcomes", a.kind()),
                    format!("{} outcomes", b.kind()),
                ))
            }
        }
        Ok(())
    }
}
