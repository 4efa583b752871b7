use crate::algorithm::{Classifier, ScoringClassifier};
use crate::data::FeatureVector;
use crate::errors::ConformalError;
use crate::utils::items_to_strings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Class-conditional nonconformity measures.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ClassificationNcm {
    /// The negated decision value of the label, works with any scoring classifier.
    #[default]
    NegativeDistanceToHyperplane,
    /// `1 - p(label)`, needs class probabilities.
    InverseProbability,
    /// `0.5 - (p(label) - max other p) / 2`, needs class probabilities.
    ProbabilityMargin,
}

impl fmt::Display for ClassificationNcm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClassificationNcm::NegativeDistanceToHyperplane => "NegativeDistanceToHyperplane",
            ClassificationNcm::InverseProbability => "InverseProbability",
            ClassificationNcm::ProbabilityMargin => "ProbabilityMargin",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ClassificationNcm {
    type Err = ConformalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NegativeDistanceToHyperplane" => Ok(ClassificationNcm::NegativeDistanceToHyperplane),
            "InverseProbability" => Ok(ClassificationNcm::InverseProbability),
            "ProbabilityMargin" => Ok(ClassificationNcm::ProbabilityMargin),
            _ => Err(ConformalError::ParseString(
                s.to_string(),
                "ClassificationNcm".to_string(),
                items_to_strings(vec![
                    "NegativeDistanceToHyperplane",
                    "InverseProbability",
                    "ProbabilityMargin",
                ]),
            )),
        }
    }
}

impl ClassificationNcm {
    pub fn requires_probability(&self) -> bool {
        !matches!(self, ClassificationNcm::NegativeDistanceToHyperplane)
    }

    /// Check that the scoring classifier provides what the measure needs.
    pub fn validate(&self, algorithm: &Classifier) -> Result<(), ConformalError> {
        if self.requires_probability() && !algorithm.supports_probability() {
            return Err(ConformalError::IncompatibleNcm {
                ncm: self.to_string(),
                algorithm: algorithm.name().to_string(),
                reason: "the measure needs class probabilities".to_string(),
            });
        }
        Ok(())
    }

    /// Nonconformity score of `x` for every candidate class index.
    pub fn scores<C: ScoringClassifier>(&self, model: &C, x: &FeatureVector) -> Result<Vec<f64>, ConformalError> {
        match self {
            ClassificationNcm::NegativeDistanceToHyperplane => {
                Ok(model.decision_values(x)?.into_iter().map(|d| -d).collect())
            }
            ClassificationNcm::InverseProbability => Ok(model.probabilities(x)?.into_iter().map(|p| 1.0 - p).collect()),
            ClassificationNcm::ProbabilityMargin => {
                let probs = model.probabilities(x)?;
                Ok((0..probs.len())
                    .map(|l| {
                        let other = probs
                            .iter()
                            .enumerate()
                            .filter(|(j, _)| *j != l)
                            .map(|(_, p)| *p)
                            .fold(f64::NEG_INFINITY, f64::max);
                        0.5 - (probs[l] - other) / 2.0
                    })
                    .collect())
            }
        }
    }
}
