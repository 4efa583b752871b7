use crate::metrics::evaluation::EvaluationMetric;
use crate::metrics::RegressionOutcome;
use crate::utils::{mean, median};

pub struct CoverageMetric {}
impl EvaluationMetric for CoverageMetric {
    type Outcome = RegressionOutcome;
    fn calculate_metric(outcomes: &[RegressionOutcome], _confidence: f64) -> f64 {
        coverage(outcomes)
    }
    fn maximize() -> bool {
        true
    }
}

pub struct MeanIntervalWidthMetric {}
impl EvaluationMetric for MeanIntervalWidthMetric {
    type Outcome = RegressionOutcome;
    fn calculate_metric(outcomes: &[RegressionOutcome], _confidence: f64) -> f64 {
        mean(&widths(outcomes))
    }
    fn maximize() -> bool {
        false
    }
}

pub struct MedianIntervalWidthMetric {}
impl EvaluationMetric for MedianIntervalWidthMetric {
    type Outcome = RegressionOutcome;
    fn calculate_metric(outcomes: &[RegressionOutcome], _confidence: f64) -> f64 {
        median(&widths(outcomes))
    }
    fn maximize() -> bool {
        false
    }
}

pub struct RootMeanSquaredErrorMetric {}
impl EvaluationMetric for RootMeanSquaredErrorMetric {
    type Outcome = RegressionOutcome;
    fn calculate_metric(outcomes: &[RegressionOutcome], _confidence: f64) -> f64 {
        root_mean_squared_error(outcomes)
    }
    fn maximize() -> bool {
        false
    }
}

fn widths(outcomes: &[RegressionOutcome]) -> Vec<f64> {
    outcomes.iter().map(|o| o.width()).collect()
}

/// Fraction of true values inside their interval.
pub fn coverage(outcomes: &[RegressionOutcome]) -> f64 {
    if outcomes.is_empty() {
        return f64::NAN;
    }
    outcomes.iter().filter(|o| o.covers()).count() as f64 / outcomes.len() as f64
}

pub fn root_mean_squared_error(outcomes: &[RegressionOutcome]) -> f64 {
    if outcomes.is_empty() {
        return f64::NAN;
    }
    let mse = outcomes.iter().map(|o| (o.y - o.y_hat).powi(2)).sum::<f64>() / outcomes.len() as f64;
    mse.sqrt()
}
