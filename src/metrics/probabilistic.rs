use crate::constants::PROBABILITY_CLIP;
use crate::metrics::evaluation::EvaluationMetric;
use crate::metrics::ProbabilisticOutcome;
use crate::utils::mean;

pub struct LogLossMetric {}
impl EvaluationMetric for LogLossMetric {
    type Outcome = ProbabilisticOutcome;
    fn calculate_metric(outcomes: &[ProbabilisticOutcome], _confidence: f64) -> f64 {
        log_loss(outcomes)
    }
    fn maximize() -> bool {
        false
    }
}

pub struct BrierScoreMetric {}
impl EvaluationMetric for BrierScoreMetric {
    type Outcome = ProbabilisticOutcome;
    fn calculate_metric(outcomes: &[ProbabilisticOutcome], _confidence: f64) -> f64 {
        brier_score(outcomes)
    }
    fn maximize() -> bool {
        false
    }
}

pub struct MeanVennAbersWidthMetric {}
impl EvaluationMetric for MeanVennAbersWidthMetric {
    type Outcome = ProbabilisticOutcome;
    fn calculate_metric(outcomes: &[ProbabilisticOutcome], _confidence: f64) -> f64 {
        mean(&outcomes.iter().map(|o| o.interval_width).collect::<Vec<_>>())
    }
    fn maximize() -> bool {
        false
    }
}

/// Mean negative log probability of the true label, probabilities clipped away from zero.
pub fn log_loss(outcomes: &[ProbabilisticOutcome]) -> f64 {
    if outcomes.is_empty() {
        return f64::NAN;
    }
    outcomes
        .iter()
        .map(|o| {
            let p = o.probabilities.get(&o.label).copied().unwrap_or(0.0);
            -p.clamp(PROBABILITY_CLIP, 1.0 - PROBABILITY_CLIP).ln()
        })
        .sum::<f64>()
        / outcomes.len() as f64
}

/// Mean over records of the squared distance between the probabilities and the one-hot truth.
pub fn brier_score(outcomes: &[ProbabilisticOutcome]) -> f64 {
    if outcomes.is_empty() {
        return f64::NAN;
    }
    outcomes
        .iter()
        .map(|o| {
            o.probabilities
                .iter()
                .map(|(l, p)| {
                    let truth = if *l == o.label { 1.0 } else { 0.0 };
                    (p - truth).powi(2)
                })
                .sum::<f64>()
        })
        .sum::<f64>()
        / outcomes.len() as f64
}
