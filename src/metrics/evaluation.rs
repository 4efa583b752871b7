use crate::errors::ConformalError;
use crate::metrics::{classification, probabilistic, regression, EvaluationData};
use crate::utils::items_to_strings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Compare to metric values, determining if b is better.
/// If one of them is NaN favor the non NaN value.
/// If both are NaN, consider the first value to be better.
pub fn is_comparison_better(value: f64, comparison: f64, maximize: bool) -> bool {
    match (value.is_nan(), comparison.is_nan()) {
        // Both nan, comparison is not better,
        // Or comparison is nan, also not better
        (true, true) | (false, true) => false,
        // comparison is not Nan, it's better
        (true, false) => true,
        // Perform numerical comparison.
        (false, false) => {
            if maximize {
                value < comparison
            } else {
                value > comparison
            }
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Classification: fraction of true labels inside the prediction set.
    /// Regression: fraction of true values inside the interval.
    CPAccuracy,
    ObservedFuzziness,
    BalancedObservedFuzziness,
    ProportionSingleLabel,
    ProportionEmpty,
    MeanIntervalWidth,
    MedianIntervalWidth,
    RootMeanSquaredError,
    LogLoss,
    BrierScore,
    MeanVennAbersWidth,
}

const METRIC_NAMES: [&str; 11] = [
    "CPAccuracy",
    "ObservedFuzziness",
    "BalancedObservedFuzziness",
    "ProportionSingleLabel",
    "ProportionEmpty",
    "MeanIntervalWidth",
    "MedianIntervalWidth",
    "RootMeanSquaredError",
    "LogLoss",
    "BrierScore",
    "MeanVennAbersWidth",
];

impl FromStr for Metric {
    type Err = ConformalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CPAccuracy" => Ok(Metric::CPAccuracy),
            "ObservedFuzziness" => Ok(Metric::ObservedFuzziness),
            "BalancedObservedFuzziness" => Ok(Metric::BalancedObservedFuzziness),
            "ProportionSingleLabel" => Ok(Metric::ProportionSingleLabel),
            "ProportionEmpty" => Ok(Metric::ProportionEmpty),
            "MeanIntervalWidth" => Ok(Metric::MeanIntervalWidth),
            "MedianIntervalWidth" => Ok(Metric::MedianIntervalWidth),
            "RootMeanSquaredError" => Ok(Metric::RootMeanSquaredError),
            "LogLoss" => Ok(Metric::LogLoss),
            "BrierScore" => Ok(Metric::BrierScore),
            "MeanVennAbersWidth" => Ok(Metric::MeanVennAbersWidth),
            _ => Err(ConformalError::ParseString(
                s.to_string(),
                "Metric".to_string(),
                items_to_strings(METRIC_NAMES.to_vec()),
            )),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub trait EvaluationMetric {
    type Outcome;
    fn calculate_metric(outcomes: &[Self::Outcome], confidence: f64) -> f64;
    fn maximize() -> bool;
}

impl Metric {
    /// Whether larger values of the metric are better.
    pub fn maximize(&self) -> bool {
        match self {
            Metric::CPAccuracy => classification::CPAccuracyMetric::maximize(),
            Metric::ObservedFuzziness => classification::ObservedFuzzinessMetric::maximize(),
            Metric::BalancedObservedFuzziness => classification::BalancedObservedFuzzinessMetric::maximize(),
            Metric::ProportionSingleLabel => classification::ProportionSingleLabelMetric::maximize(),
            Metric::ProportionEmpty => classification::ProportionEmptyMetric::maximize(),
            Metric::MeanIntervalWidth => regression::MeanIntervalWidthMetric::maximize(),
            Metric::MedianIntervalWidth => regression::MedianIntervalWidthMetric::maximize(),
            Metric::RootMeanSquaredError => regression::RootMeanSquaredErrorMetric::maximize(),
            Metric::LogLoss => probabilistic::LogLossMetric::maximize(),
            Metric::BrierScore => probabilistic::BrierScoreMetric::maximize(),
            Metric::MeanVennAbersWidth => probabilistic::MeanVennAbersWidthMetric::maximize(),
        }
    }

    /// Compute the metric at a confidence level.
    ///
    /// Classification metrics derive prediction sets at significance
    /// `1 - confidence`; regression intervals were already computed at the
    /// confidence stored in the data.
    pub fn compute(&self, data: &EvaluationData, confidence: f64) -> Result<f64, ConformalError> {
        let value = match (self, data) {
            (Metric::CPAccuracy, EvaluationData::Classification(o)) => {
                classification::CPAccuracyMetric::calculate_metric(o, confidence)
            }
            (Metric::ObservedFuzziness, EvaluationData::Classification(o)) => {
                classification::ObservedFuzzinessMetric::calculate_metric(o, confidence)
            }
            (Metric::BalancedObservedFuzziness, EvaluationData::Classification(o)) => {
                classification::BalancedObservedFuzzinessMetric::calculate_metric(o, confidence)
            }
            (Metric::ProportionSingleLabel, EvaluationData::Classification(o)) => {
                classification::ProportionSingleLabelMetric::calculate_metric(o, confidence)
            }
            (Metric::ProportionEmpty, EvaluationData::Classification(o)) => {
                classification::ProportionEmptyMetric::calculate_metric(o, confidence)
            }
            (Metric::CPAccuracy, EvaluationData::Regression { outcomes, confidence }) => {
                regression::CoverageMetric::calculate_metric(outcomes, *confidence)
            }
            (Metric::MeanIntervalWidth, EvaluationData::Regression { outcomes, confidence }) => {
                regression::MeanIntervalWidthMetric::calculate_metric(outcomes, *confidence)
            }
            (Metric::MedianIntervalWidth, EvaluationData::Regression { outcomes, confidence }) => {
                regression::MedianIntervalWidthMetric::calculate_metric(outcomes, *confidence)
            }
            (Metric::RootMeanSquaredError, EvaluationData::Regression { outcomes, confidence }) => {
                regression::RootMeanSquaredErrorMetric::calculate_metric(outcomes, *confidence)
            }
            (Metric::LogLoss, EvaluationData::Probabilistic(o)) => {
                probabilistic::LogLossMetric::calculate_metric(o, confidence)
            }
            (Metric::BrierScore, EvaluationData::Probabilistic(o)) => {
                probabilistic::BrierScoreMetric::calculate_metric(o, confidence)
            }
            (Metric::MeanVennAbersWidth, EvaluationData::Probabilistic(o)) => {
                probabilistic::MeanVennAbersWidthMetric::calculate_metric(o, confidence)
            }
            (metric, data) => {
                return Err(ConformalError::UnsupportedMetric(
                    metric.to_string(),
                    data.kind().to_string(),
                ))
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::classification::*;
    use crate::metrics::probabilistic::*;
    use crate::metrics::regression::*;
    use crate::metrics::{ClassificationOutcome, ProbabilisticOutcome, RegressionOutcome};
    use crate::utils::precision_round;
    use std::collections::BTreeMap;

    fn outcome(label: i64, p0: f64, p1: f64) -> ClassificationOutcome {
        ClassificationOutcome {
            label,
            p_values: BTreeMap::from([(0, p0), (1, p1)]),
        }
    }

    fn classification_outcomes() -> Vec<ClassificationOutcome> {
        vec![
            outcome(0, 0.8, 0.1),
            outcome(0, 0.3, 0.4),
            outcome(1, 0.05, 0.6),
            outcome(1, 0.5, 0.15),
        ]
    }

    #[test]
    fn test_cp_accuracy() {
        let o = classification_outcomes();
        // Significance 0.2: sets {0}, {0, 1}, {1}, {0}.
        assert_eq!(cp_accuracy(&o, 0.2), 0.75);
        assert_eq!(proportion_with_set_size(&o, 0.2, 1), 0.75);
        assert_eq!(proportion_with_set_size(&o, 0.2, 0), 0.0);
        assert_eq!(proportion_with_set_size(&o, 0.9, 0), 1.0);
    }

    #[test]
    fn test_observed_fuzziness() {
        let o = classification_outcomes();
        assert_eq!(precision_round(observed_fuzziness(&o), 4), 0.2625);
        // Class 0: (0.1 + 0.4) / 2, class 1: (0.05 + 0.5) / 2.
        assert_eq!(precision_round(balanced_observed_fuzziness(&o), 4), 0.2625);
        let skewed = vec![outcome(0, 0.9, 0.1), outcome(0, 0.9, 0.3), outcome(1, 0.6, 0.9)];
        assert_eq!(precision_round(balanced_observed_fuzziness(&skewed), 4), 0.4);
    }

    #[test]
    fn test_regression_metrics() {
        let o = vec![
            RegressionOutcome {
                y: 1.0,
                y_hat: 1.5,
                lower: 0.0,
                upper: 3.0,
            },
            RegressionOutcome {
                y: 4.0,
                y_hat: 2.0,
                lower: 1.0,
                upper: 3.0,
            },
        ];
        assert_eq!(coverage(&o), 0.5);
        let data = EvaluationData::Regression {
            confidence: 0.8,
            outcomes: o.clone(),
        };
        assert_eq!(Metric::MeanIntervalWidth.compute(&data, 0.8).unwrap(), 2.5);
        assert_eq!(Metric::MedianIntervalWidth.compute(&data, 0.8).unwrap(), 2.5);
        assert_eq!(precision_round(root_mean_squared_error(&o), 6), 1.457738);
    }

    #[test]
    fn test_probabilistic_metrics() {
        let o = vec![
            ProbabilisticOutcome {
                label: 1,
                probabilities: BTreeMap::from([(0, 0.2), (1, 0.8)]),
                interval_width: 0.1,
            },
            ProbabilisticOutcome {
                label: 0,
                probabilities: BTreeMap::from([(0, 0.6), (1, 0.4)]),
                interval_width: 0.3,
            },
        ];
        assert_eq!(precision_round(log_loss(&o), 5), 0.36698);
        assert_eq!(precision_round(brier_score(&o), 4), 0.2);
        let data = EvaluationData::Probabilistic(o);
        assert_eq!(precision_round(Metric::MeanVennAbersWidth.compute(&data, 0.9).unwrap(), 4), 0.2);
    }

    #[test]
    fn test_unsupported_metric() {
        let data = EvaluationData::Classification(classification_outcomes());
        assert!(matches!(
            Metric::MeanIntervalWidth.compute(&data, 0.8),
            Err(ConformalError::UnsupportedMetric(_, _))
        ));
        assert!(Metric::CPAccuracy.compute(&data, 0.8).is_ok());
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!("LogLoss".parse::<Metric>().unwrap(), Metric::LogLoss);
        assert!("AUC".parse::<Metric>().is_err());
        assert!(Metric::CPAccuracy.maximize());
        assert!(!Metric::ObservedFuzziness.maximize());
    }

    #[test]
    fn test_is_comparison_better() {
        assert!(is_comparison_better(0.5, 0.6, true));
        assert!(!is_comparison_better(0.5, 0.6, false));
        assert!(is_comparison_better(f64::NAN, 0.1, false));
        assert!(!is_comparison_better(0.1, f64::NAN, true));
    }
}
