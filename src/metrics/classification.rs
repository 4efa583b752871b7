use crate::metrics::evaluation::EvaluationMetric;
use crate::metrics::ClassificationOutcome;
use std::collections::BTreeMap;

pub struct CPAccuracyMetric {}
impl EvaluationMetric for CPAccuracyMetric {
    type Outcome = ClassificationOutcome;
    fn calculate_metric(outcomes: &[ClassificationOutcome], confidence: f64) -> f64 {
        cp_accuracy(outcomes, 1.0 - confidence)
    }
    fn maximize() -> bool {
        true
    }
}

pub struct ObservedFuzzinessMetric {}
impl EvaluationMetric for ObservedFuzzinessMetric {
    type Outcome = ClassificationOutcome;
    fn calculate_metric(outcomes: &[ClassificationOutcome], _confidence: f64) -> f64 {
        observed_fuzziness(outcomes)
    }
    fn maximize() -> bool {
        false
    }
}

pub struct BalancedObservedFuzzinessMetric {}
impl EvaluationMetric for BalancedObservedFuzzinessMetric {
    type Outcome = ClassificationOutcome;
    fn calculate_metric(outcomes: &[ClassificationOutcome], _confidence: f64) -> f64 {
        balanced_observed_fuzziness(outcomes)
    }
    fn maximize() -> bool {
        false
    }
}

pub struct ProportionSingleLabelMetric {}
impl EvaluationMetric for ProportionSingleLabelMetric {
    type Outcome = ClassificationOutcome;
    fn calculate_metric(outcomes: &[ClassificationOutcome], confidence: f64) -> f64 {
        proportion_with_set_size(outcomes, 1.0 - confidence, 1)
    }
    fn maximize() -> bool {
        true
    }
}

pub struct ProportionEmptyMetric {}
impl EvaluationMetric for ProportionEmptyMetric {
    type Outcome = ClassificationOutcome;
    fn calculate_metric(outcomes: &[ClassificationOutcome], confidence: f64) -> f64 {
        proportion_with_set_size(outcomes, 1.0 - confidence, 0)
    }
    fn maximize() -> bool {
        false
    }
}

/// Fraction of records whose true label is in the prediction set.
pub fn cp_accuracy(outcomes: &[ClassificationOutcome], significance: f64) -> f64 {
    if outcomes.is_empty() {
        return f64::NAN;
    }
    let correct = outcomes
        .iter()
        .filter(|o| o.p_values.get(&o.label).is_some_and(|p| *p > significance))
        .count();
    correct as f64 / outcomes.len() as f64
}

fn false_label_p_values(outcome: &ClassificationOutcome) -> f64 {
    outcome
        .p_values
        .iter()
        .filter(|(l, _)| **l != outcome.label)
        .map(|(_, p)| *p)
        .sum()
}

/// Mean sum of the p-values of the false labels.
pub fn observed_fuzziness(outcomes: &[ClassificationOutcome]) -> f64 {
    if outcomes.is_empty() {
        return f64::NAN;
    }
    outcomes.iter().map(false_label_p_values).sum::<f64>() / outcomes.len() as f64
}

/// Observed fuzziness computed per true class, then averaged over classes.
pub fn balanced_observed_fuzziness(outcomes: &[ClassificationOutcome]) -> f64 {
    let mut per_class: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for o in outcomes {
        let entry = per_class.entry(o.label).or_insert((0.0, 0));
        entry.0 += false_label_p_values(o);
        entry.1 += 1;
    }
    if per_class.is_empty() {
        return f64::NAN;
    }
    per_class.values().map(|(sum, n)| sum / *n as f64).sum::<f64>() / per_class.len() as f64
}

pub fn proportion_with_set_size(outcomes: &[ClassificationOutcome], significance: f64, size: usize) -> f64 {
    if outcomes.is_empty() {
        return f64::NAN;
    }
    let n = outcomes
        .iter()
        .filter(|o| o.prediction_set(significance).len() == size)
        .count();
    n as f64 / outcomes.len() as f64
}
