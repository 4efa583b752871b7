//! Venn-ABERS Predictors
//!
//! Probabilistic binary classification with a validity guarantee on the
//! calibration of the probabilities. For a test score `s` two isotonic
//! regressions are fitted on the calibration scores, one adding `(s, 0)`
//! and one adding `(s, 1)`; their values at `s` bound the probability of
//! the positive label.
//!
//! # Submodules
//!
//! * `isotonic`: Isotonic regression with the pool adjacent violators algorithm.

pub mod isotonic;

pub use isotonic::IsotonicCalibrator;

use crate::algorithm::{Classifier, ScoringClassifier};
use crate::config::PredictorConfig;
use crate::cp::{class_index, make_splits, record_class, split_records, split_seed, train_splits, Predictor};
use crate::data::{Dataset, FeatureVector, TrainingData};
use crate::errors::ConformalError;
use crate::io::ModelIO;
use crate::metrics::{EvaluationData, ProbabilisticOutcome};
use crate::sampling::{Sampling, SamplingStrategy};
use crate::tuning::Configurable;
use crate::utils::{class_label, geometric_mean, mean, median};
use hashbrown::HashMap;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;

/// Scoring model and calibration `(score, is positive)` pairs of one split.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VennAbersSplit {
    pub model: Classifier,
    pub calibration: Vec<(f64, f64)>,
}

impl VennAbersSplit {
    /// The multiprobability pair `(p0, p1)`, with `p0 <= p1`.
    pub fn probability_pair(&self, x: &FeatureVector) -> Result<(f64, f64), ConformalError> {
        let score = self.model.decision_values(x)?[1];
        let mut points = Vec::with_capacity(self.calibration.len() + 1);
        points.extend_from_slice(&self.calibration);
        points.push((score, 0.0));
        let p0 = IsotonicCalibrator::new(&points).value_at(score);
        if let Some(last) = points.last_mut() {
            last.1 = 1.0;
        }
        let p1 = IsotonicCalibrator::new(&points).value_at(score);
        Ok((p0, p1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VennAbersPrediction {
    /// Merged probability of each label.
    pub probabilities: BTreeMap<i64, f64>,
    /// Aggregated lower bound on the positive label probability.
    pub lower: f64,
    /// Aggregated upper bound on the positive label probability.
    pub upper: f64,
    pub mean_interval_width: f64,
    pub median_interval_width: f64,
}

/// Aggregated Venn-ABERS predictor for two classes.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AVAPClassification {
    pub classifier: Classifier,
    pub sampling: Sampling,
    #[serde(default)]
    pub cfg: PredictorConfig,
    #[serde(default)]
    labels: Vec<i64>,
    #[serde(default)]
    num_features: usize,
    #[serde(default)]
    splits: Vec<VennAbersSplit>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl AVAPClassification {
    pub fn new(classifier: Classifier, sampling: Sampling) -> Result<Self, ConformalError> {
        sampling.validate_parameters()?;
        Ok(AVAPClassification {
            classifier,
            sampling,
            cfg: PredictorConfig::default(),
            labels: Vec::new(),
            num_features: 0,
            splits: Vec::new(),
            metadata: HashMap::new(),
        })
    }

    pub fn set_config(mut self, cfg: PredictorConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn train_with_cancel(&mut self, data: &TrainingData, cancel: &AtomicBool) -> Result<(), ConformalError> {
        self.labels.clear();
        self.splits.clear();
        self.num_features = 0;

        let labels = data.class_labels()?;
        if labels.len() != 2 {
            return Err(ConformalError::InvalidParameter(
                "labels".to_string(),
                "exactly 2 classes".to_string(),
                labels.len().to_string(),
            ));
        }
        let index = class_index(&labels);
        let num_features = data.num_features();
        let splits = make_splits(&self.sampling, data, self.cfg.seed)?;
        let (template, cfg) = (&self.classifier, &self.cfg);

        let trained = train_splits(cfg, &splits, cancel, |k, split| {
            let records = split_records(data, split);
            let y = records
                .proper_training
                .iter()
                .map(|r| record_class(&index, r))
                .collect::<Result<Vec<_>, _>>()?;
            if y.iter().all(|c| *c == y[0]) {
                return Err(ConformalError::DegenerateSplit {
                    split: k,
                    reason: "the proper training set holds a single class".to_string(),
                });
            }
            let x: Vec<&FeatureVector> = records.proper_training.iter().map(|r| r.features()).collect();
            let mut model = template.clone();
            model.fit(&x, &y, 2, num_features, split_seed(cfg.seed, k))?;
            let calibration = records
                .calibration
                .iter()
                .map(|r| {
                    let score = model.decision_values(r.features())?[1];
                    Ok((score, record_class(&index, r)? as f64))
                })
                .collect::<Result<Vec<_>, ConformalError>>()?;
            Ok(VennAbersSplit { model, calibration })
        })?;

        info!(
            "Trained AVAPClassification with {} of {} split(s) over {} record(s).",
            trained.len(),
            splits.len(),
            data.len()
        );
        self.labels = labels;
        self.num_features = num_features;
        self.splits = trained;
        Ok(())
    }

    /// Merge the per split probability pairs.
    ///
    /// `p = GM(p1) / (GM(1 - p0) + GM(p1))` over the splits.
    pub fn predict(&self, x: &FeatureVector) -> Result<VennAbersPrediction, ConformalError> {
        if !self.is_trained() {
            return Err(ConformalError::NotTrained("AVAPClassification".to_string()));
        }
        self.cfg.feature_policy.check(x, self.num_features)?;
        let pairs = self
            .splits
            .iter()
            .map(|s| s.probability_pair(x))
            .collect::<Result<Vec<_>, _>>()?;
        let p0: Vec<f64> = pairs.iter().map(|(p0, _)| *p0).collect();
        let p1: Vec<f64> = pairs.iter().map(|(_, p1)| *p1).collect();
        let gm_p1 = geometric_mean(&p1);
        let gm_not_p0 = geometric_mean(&p0.iter().map(|p| 1.0 - p).collect::<Vec<_>>());
        let p = gm_p1 / (gm_not_p0 + gm_p1);
        let widths: Vec<f64> = pairs.iter().map(|(p0, p1)| p1 - p0).collect();
        Ok(VennAbersPrediction {
            probabilities: BTreeMap::from([(self.labels[0], 1.0 - p), (self.labels[1], p)]),
            lower: self.cfg.aggregation.aggregate(&p0),
            upper: self.cfg.aggregation.aggregate(&p1),
            mean_interval_width: mean(&widths),
            median_interval_width: median(&widths),
        })
    }

    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    pub fn num_models(&self) -> usize {
        self.splits.len()
    }

    /// Insert metadata
    /// * `key` - String value for the metadata key.
    /// * `value` - value to assign to the metadata key.
    pub fn insert_metadata(&mut self, key: String, value: String) {
        self.metadata.insert(key, value);
    }

    /// Get Metadata
    /// * `key` - Get the associated value for the metadata key.
    pub fn get_metadata(&self, key: &String) -> Option<String> {
        self.metadata.get(key).cloned()
    }
}

impl Predictor for AVAPClassification {
    fn train(&mut self, data: &TrainingData) -> Result<(), ConformalError> {
        self.train_with_cancel(data, &AtomicBool::new(false))
    }

    fn evaluate(&self, test: &Dataset, _confidence: f64) -> Result<EvaluationData, ConformalError> {
        let outcomes = test
            .records()
            .iter()
            .map(|r| {
                let prediction = self.predict(r.features())?;
                Ok(ProbabilisticOutcome {
                    label: class_label(r.label())?,
                    probabilities: prediction.probabilities,
                    interval_width: prediction.mean_interval_width,
                })
            })
            .collect::<Result<Vec<_>, ConformalError>>()?;
        Ok(EvaluationData::Probabilistic(outcomes))
    }

    fn is_trained(&self) -> bool {
        !self.splits.is_empty()
    }

    fn is_conformal(&self) -> bool {
        false
    }
}

impl Configurable for AVAPClassification {
    fn config_parameters(&self) -> Vec<&'static str> {
        self.classifier.parameter_names()
    }

    fn set_config_parameter(&mut self, name: &str, value: f64) -> Result<(), ConformalError> {
        self.classifier.set_parameter(name, value)
    }
}

impl ModelIO for AVAPClassification {}
