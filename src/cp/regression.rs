use crate::algorithm::{Regressor, ScoringRegressor};
use crate::config::PredictorConfig;
use crate::cp::{make_splits, split_records, split_seed, train_splits, validate_confidence, Predictor};
use crate::data::{Dataset, FeatureVector, TrainingData};
use crate::errors::ConformalError;
use crate::io::ModelIO;
use crate::metrics::{EvaluationData, RegressionOutcome};
use crate::ncm::RegressionNcm;
use crate::sampling::{Sampling, SamplingStrategy};
use crate::tuning::Configurable;
use crate::utils::{conformal_quantile, sort_scores, validate_positive_float_parameter};
use hashbrown::HashMap;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;

/// The trained state of one split.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegressionIcp {
    pub model: Regressor,
    /// Predicts the difficulty of a record, present for normalized measures.
    pub error_model: Option<Regressor>,
    /// Sorted ascending.
    pub calibration_scores: Vec<f64>,
}

impl RegressionIcp {
    fn normalizer(&self, ncm: &RegressionNcm, x: &FeatureVector) -> Result<f64, ConformalError> {
        let error_prediction = match &self.error_model {
            Some(m) => Some(m.predict(x)?),
            None => None,
        };
        Ok(ncm.normalizer(error_prediction))
    }
}

/// A prediction interval at one confidence level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionInterval {
    pub confidence: f64,
    pub interval: (f64, f64),
    /// `interval` clamped to the range of the training labels.
    pub capped_interval: (f64, f64),
    pub half_width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionPrediction {
    pub y_hat: f64,
    pub intervals: Vec<PredictionInterval>,
}

/// The confidence at which the interval half-width equals `distance`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceConfidence {
    pub distance: f64,
    pub confidence: f64,
}

/// Aggregated (or cross) conformal regressor.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ACPRegression {
    pub ncm: RegressionNcm,
    /// Untrained template, cloned for the model and error model of every split.
    pub regressor: Regressor,
    pub sampling: Sampling,
    #[serde(default)]
    pub cfg: PredictorConfig,
    #[serde(default)]
    num_features: usize,
    #[serde(default)]
    label_range: Option<(f64, f64)>,
    #[serde(default)]
    icps: Vec<RegressionIcp>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ACPRegression {
    pub fn new(ncm: RegressionNcm, regressor: Regressor, sampling: Sampling) -> Result<Self, ConformalError> {
        ncm.validate()?;
        sampling.validate_parameters()?;
        Ok(ACPRegression {
            ncm,
            regressor,
            sampling,
            cfg: PredictorConfig::default(),
            num_features: 0,
            label_range: None,
            icps: Vec::new(),
            metadata: HashMap::new(),
        })
    }

    pub fn set_config(mut self, cfg: PredictorConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Train, checking `cancel` before every split.
    pub fn train_with_cancel(&mut self, data: &TrainingData, cancel: &AtomicBool) -> Result<(), ConformalError> {
        self.icps.clear();
        self.label_range = None;
        self.num_features = 0;

        let num_features = data.num_features();
        let label_range = data.label_range();
        let splits = make_splits(&self.sampling, data, self.cfg.seed)?;
        let (ncm, template, cfg) = (&self.ncm, &self.regressor, &self.cfg);

        let icps = train_splits(cfg, &splits, cancel, |k, split| {
            let records = split_records(data, split);
            let x: Vec<&FeatureVector> = records.proper_training.iter().map(|r| r.features()).collect();
            let y: Vec<f64> = records.proper_training.iter().map(|r| r.label()).collect();
            let seed = split_seed(cfg.seed, k);
            let mut model = template.clone();
            model.fit(&x, &y, num_features, seed)?;

            let error_model = if ncm.uses_error_model() {
                let targets = x
                    .iter()
                    .zip(&y)
                    .map(|(xi, yi)| Ok(ncm.error_target((yi - model.predict(xi)?).abs())))
                    .collect::<Result<Vec<_>, ConformalError>>()?;
                let mut error_model = template.clone();
                error_model.fit(&x, &targets, num_features, seed)?;
                Some(error_model)
            } else {
                None
            };

            let mut icp = RegressionIcp {
                model,
                error_model,
                calibration_scores: Vec::with_capacity(records.calibration.len()),
            };
            for r in &records.calibration {
                let y_hat = icp.model.predict(r.features())?;
                let normalizer = icp.normalizer(ncm, r.features())?;
                icp.calibration_scores.push(ncm.score(r.label(), y_hat, normalizer));
            }
            sort_scores(&mut icp.calibration_scores);
            Ok(icp)
        })?;

        info!(
            "Trained ACPRegression with {} of {} split(s) over {} record(s).",
            icps.len(),
            splits.len(),
            data.len()
        );
        self.num_features = num_features;
        self.label_range = label_range;
        self.icps = icps;
        Ok(())
    }

    fn check_predict(&self, x: &FeatureVector) -> Result<(), ConformalError> {
        if !self.is_trained() {
            return Err(ConformalError::NotTrained("ACPRegression".to_string()));
        }
        self.cfg.feature_policy.check(x, self.num_features)
    }

    /// Point prediction and normalizer of every split.
    fn split_predictions(&self, x: &FeatureVector) -> Result<Vec<(f64, f64)>, ConformalError> {
        self.icps
            .iter()
            .map(|icp| Ok((icp.model.predict(x)?, icp.normalizer(&self.ncm, x)?)))
            .collect()
    }

    /// Predict intervals for every confidence level.
    ///
    /// Each split's half-width is the `ceil((n + 1) c)`-th smallest
    /// calibration score times the split's normalizer, infinite when the
    /// rank exceeds the calibration set. Point predictions and half-widths
    /// are aggregated separately and the interval is centered on the
    /// aggregated point prediction, so widths never shrink as the
    /// confidence grows.
    pub fn predict(&self, x: &FeatureVector, confidences: &[f64]) -> Result<RegressionPrediction, ConformalError> {
        for c in confidences {
            validate_confidence(*c, "confidence")?;
        }
        self.check_predict(x)?;
        let per_split = self.split_predictions(x)?;
        let aggregation = self.cfg.aggregation;
        let y_hat = aggregation.aggregate(&per_split.iter().map(|(y, _)| *y).collect::<Vec<_>>());

        let intervals = confidences
            .iter()
            .map(|c| {
                let half_widths: Vec<f64> = per_split
                    .iter()
                    .zip(&self.icps)
                    .map(|((_, normalizer), icp)| conformal_quantile(&icp.calibration_scores, *c) * normalizer)
                    .collect();
                let half_width = aggregation.aggregate(&half_widths);
                let interval = (y_hat - half_width, y_hat + half_width);
                let capped_interval = match self.label_range {
                    Some((min, max)) => (interval.0.clamp(min, max), interval.1.clamp(min, max)),
                    None => interval,
                };
                PredictionInterval {
                    confidence: *c,
                    interval,
                    capped_interval,
                    half_width,
                }
            })
            .collect();
        Ok(RegressionPrediction { y_hat, intervals })
    }

    /// Confidence of the interval whose half-width equals each distance.
    ///
    /// For a split with `n` calibration scores this is `m / (n + 1)`, `m`
    /// being the number of scores not above the distance divided by the
    /// split's normalizer; the split confidences are aggregated.
    pub fn predict_for_distances(
        &self,
        x: &FeatureVector,
        distances: &[f64],
    ) -> Result<Vec<DistanceConfidence>, ConformalError> {
        for d in distances {
            validate_positive_float_parameter(*d, "distance")?;
        }
        self.check_predict(x)?;
        let per_split = self.split_predictions(x)?;
        Ok(distances
            .iter()
            .map(|d| {
                let confidences: Vec<f64> = per_split
                    .iter()
                    .zip(&self.icps)
                    .map(|((_, normalizer), icp)| {
                        let scaled = d / normalizer;
                        let m = icp.calibration_scores.partition_point(|s| *s <= scaled);
                        m as f64 / (icp.calibration_scores.len() as f64 + 1.0)
                    })
                    .collect();
                DistanceConfidence {
                    distance: *d,
                    confidence: self.cfg.aggregation.aggregate(&confidences),
                }
            })
            .collect())
    }

    pub fn num_models(&self) -> usize {
        self.icps.len()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Smallest and largest training label.
    pub fn label_range(&self) -> Option<(f64, f64)> {
        self.label_range
    }

    pub fn icps(&self) -> &[RegressionIcp] {
        &self.icps
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

impl Predictor for ACPRegression {
    fn train(&mut self, data: &TrainingData) -> Result<(), ConformalError> {
        self.train_with_cancel(data, &AtomicBool::new(false))
    }

    fn evaluate(&self, test: &Dataset, confidence: f64) -> Result<EvaluationData, ConformalError> {
        let outcomes = test
            .records()
            .iter()
            .map(|r| {
                let prediction = self.predict(r.features(), &[confidence])?;
                let (lower, upper) = prediction.intervals[0].interval;
                Ok(RegressionOutcome {
                    y: r.label(),
                    y_hat: prediction.y_hat,
                    lower,
                    upper,
                })
            })
            .collect::<Result<Vec<_>, ConformalError>>()?;
        Ok(EvaluationData::Regression { confidence, outcomes })
    }

    fn is_trained(&self) -> bool {
        !self.icps.is_empty()
    }
}

impl Configurable for ACPRegression {
    fn config_parameters(&self) -> Vec<&'static str> {
        let mut names = self.regressor.parameter_names();
        if self.ncm.uses_error_model() {
            names.push("ncmBeta");
        }
        names
    }

    fn set_config_parameter(&mut self, name: &str, value: f64) -> Result<(), ConformalError> {
        match name {
            "ncmBeta" => self.ncm.set_beta(value),
            _ => self.regressor.set_parameter(name, value),
        }
    }
}

impl ModelIO for ACPRegression {}
