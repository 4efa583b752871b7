use crate::algorithm::{Classifier, ScoringClassifier};
use crate::config::PredictorConfig;
use crate::cp::{
    class_index, make_splits, record_class, require_classes, split_records, split_seed, train_splits,
    validate_confidence, Predictor,
};
use crate::data::{Dataset, FeatureVector, TrainingData};
use crate::errors::ConformalError;
use crate::io::ModelIO;
use crate::metrics::{ClassificationOutcome, EvaluationData};
use crate::ncm::ClassificationNcm;
use crate::sampling::{Sampling, SamplingStrategy};
use crate::tuning::Configurable;
use crate::utils::{class_label, conformal_p_value, sort_scores};
use hashbrown::HashMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;

/// The trained state of one split: its scoring model and the sorted
/// calibration scores of each class.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ClassificationIcp {
    pub model: Classifier,
    pub calibration_scores: Vec<Vec<f64>>,
}

impl ClassificationIcp {
    /// p-value of every class index for a test record.
    pub fn p_values(&self, ncm: &ClassificationNcm, x: &FeatureVector) -> Result<Vec<f64>, ConformalError> {
        let scores = ncm.scores(&self.model, x)?;
        Ok(scores
            .iter()
            .zip(&self.calibration_scores)
            .map(|(s, calibration)| conformal_p_value(calibration, *s))
            .collect())
    }
}

/// Aggregated (or cross) conformal classifier with Mondrian calibration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ACPClassification {
    pub ncm: ClassificationNcm,
    /// Untrained template, cloned for every split.
    pub classifier: Classifier,
    pub sampling: Sampling,
    #[serde(default)]
    pub cfg: PredictorConfig,
    #[serde(default)]
    labels: Vec<i64>,
    #[serde(default)]
    num_features: usize,
    #[serde(default)]
    icps: Vec<ClassificationIcp>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ACPClassification {
    /// Create an untrained predictor.
    ///
    /// Fails with [`ConformalError::IncompatibleNcm`] when the measure needs
    /// something the classifier cannot provide.
    pub fn new(ncm: ClassificationNcm, classifier: Classifier, sampling: Sampling) -> Result<Self, ConformalError> {
        ncm.validate(&classifier)?;
        sampling.validate_parameters()?;
        Ok(ACPClassification {
            ncm,
            classifier,
            sampling,
            cfg: PredictorConfig::default(),
            labels: Vec::new(),
            num_features: 0,
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
        self.labels.clear();
        self.icps.clear();
        self.num_features = 0;

        let labels = data.class_labels()?;
        require_classes(&labels)?;
        let index = class_index(&labels);
        let num_features = data.num_features();
        let splits = make_splits(&self.sampling, data, self.cfg.seed)?;
        let (ncm, template, cfg) = (&self.ncm, &self.classifier, &self.cfg);

        let icps = train_splits(cfg, &splits, cancel, |k, split| {
            let records = split_records(data, split);
            let y = records
                .proper_training
                .iter()
                .map(|r| record_class(&index, r))
                .collect::<Result<Vec<_>, _>>()?;
            let mut present = vec![false; labels.len()];
            y.iter().for_each(|c| present[*c] = true);
            let n_present = present.iter().filter(|p| **p).count();
            if n_present < 2 {
                return Err(ConformalError::DegenerateSplit {
                    split: k,
                    reason: format!("the proper training set holds {} class(es)", n_present),
                });
            }
            let x: Vec<&FeatureVector> = records.proper_training.iter().map(|r| r.features()).collect();
            let mut model = template.clone();
            model.fit(&x, &y, labels.len(), num_features, split_seed(cfg.seed, k))?;

            let mut calibration_scores = vec![Vec::new(); labels.len()];
            for r in &records.calibration {
                let c = record_class(&index, r)?;
                let scores = ncm.scores(&model, r.features())?;
                calibration_scores[c].push(scores[c]);
            }
            for (c, scores) in calibration_scores.iter_mut().enumerate() {
                if scores.is_empty() {
                    warn!(
                        "Split {} has no calibration records of class {}, its p-values for that class are 1.",
                        k, labels[c]
                    );
                }
                sort_scores(scores);
            }
            Ok(ClassificationIcp {
                model,
                calibration_scores,
            })
        })?;

        info!(
            "Trained ACPClassification with {} of {} split(s) over {} record(s).",
            icps.len(),
            splits.len(),
            data.len()
        );
        self.labels = labels;
        self.num_features = num_features;
        self.icps = icps;
        Ok(())
    }

    /// Aggregated p-value of every label for a test record.
    pub fn predict(&self, x: &FeatureVector) -> Result<BTreeMap<i64, f64>, ConformalError> {
        if !self.is_trained() {
            return Err(ConformalError::NotTrained("ACPClassification".to_string()));
        }
        self.cfg.feature_policy.check(x, self.num_features)?;
        let per_split = self
            .icps
            .iter()
            .map(|icp| icp.p_values(&self.ncm, x))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self
            .labels
            .iter()
            .enumerate()
            .map(|(c, label)| {
                let p: Vec<f64> = per_split.iter().map(|v| v[c]).collect();
                (*label, self.cfg.aggregation.aggregate(&p))
            })
            .collect())
    }

    /// Labels whose p-value exceeds `significance`.
    pub fn predict_set(&self, x: &FeatureVector, significance: f64) -> Result<Vec<i64>, ConformalError> {
        validate_confidence(significance, "significance")?;
        Ok(self
            .predict(x)?
            .into_iter()
            .filter(|(_, p)| *p > significance)
            .map(|(l, _)| l)
            .collect())
    }

    /// Class labels seen during training, sorted.
    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    /// Number of trained splits (aggregated models).
    pub fn num_models(&self) -> usize {
        self.icps.len()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn icps(&self) -> &[ClassificationIcp] {
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

impl Predictor for ACPClassification {
    fn train(&mut self, data: &TrainingData) -> Result<(), ConformalError> {
        self.train_with_cancel(data, &AtomicBool::new(false))
    }

    fn evaluate(&self, test: &Dataset, confidence: f64) -> Result<EvaluationData, ConformalError> {
        validate_confidence(confidence, "confidence")?;
        let outcomes = test
            .records()
            .iter()
            .map(|r| {
                Ok(ClassificationOutcome {
                    label: class_label(r.label())?,
                    p_values: self.predict(r.features())?,
                })
            })
            .collect::<Result<Vec<_>, ConformalError>>()?;
        Ok(EvaluationData::Classification(outcomes))
    }

    fn is_trained(&self) -> bool {
        !self.icps.is_empty()
    }
}

impl Configurable for ACPClassification {
    fn config_parameters(&self) -> Vec<&'static str> {
        self.classifier.parameter_names()
    }

    fn set_config_parameter(&mut self, name: &str, value: f64) -> Result<(), ConformalError> {
        self.classifier.set_parameter(name, value)
    }
}

impl ModelIO for ACPClassification {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{LinearSVC, PlattScaledSVC};
    use crate::data::Record;
    use crate::sampling::{FoldedSampling, RandomSampling};

    fn blobs(n: usize) -> Dataset {
        (0..n)
            .map(|i| {
                let label = (i % 2) as f64;
                let sign = if i % 2 == 0 { -1.0 } else { 1.0 };
                let jitter = ((i * 37) % 11) as f64 / 10.0 - 0.5;
                Record::new(FeatureVector::dense(vec![sign * 1.5 + jitter, jitter * 0.5]), label)
            })
            .collect()
    }

    #[test]
    fn test_incompatible_ncm_rejected_at_construction() {
        let result = ACPClassification::new(
            ClassificationNcm::InverseProbability,
            Classifier::LinearSVC(LinearSVC::default()),
            Sampling::default(),
        );
        assert!(matches!(result, Err(ConformalError::IncompatibleNcm { .. })));
    }

    #[test]
    fn test_predict_before_train() {
        let acp = ACPClassification::new(ClassificationNcm::default(), Classifier::default(), Sampling::default())
            .unwrap();
        assert!(matches!(
            acp.predict(&FeatureVector::dense(vec![0.0, 0.0])),
            Err(ConformalError::NotTrained(_))
        ));
    }

    #[test]
    fn test_train_and_predict() {
        let mut acp = ACPClassification::new(
            ClassificationNcm::ProbabilityMargin,
            Classifier::PlattScaledSVC(PlattScaledSVC::default()),
            FoldedSampling::new(5).unwrap().into(),
        )
        .unwrap();
        acp.train(&blobs(60).into()).unwrap();
        assert_eq!(acp.num_models(), 5);
        assert_eq!(acp.labels(), &[0, 1]);

        let p = acp.predict(&FeatureVector::dense(vec![1.6, 0.0])).unwrap();
        assert!(p.values().all(|v| (0.0..=1.0).contains(v)));
        assert!(p[&1] > p[&0]);
        assert_eq!(acp.predict_set(&FeatureVector::dense(vec![1.6, 0.0]), 0.2).unwrap(), vec![1]);
        assert!(acp.predict_set(&FeatureVector::dense(vec![1.6, 0.0]), 1.5).is_err());
    }

    #[test]
    fn test_single_class_rejected() {
        let data: Dataset = (0..20)
            .map(|i| Record::new(FeatureVector::dense(vec![i as f64]), 1.0))
            .collect();
        let mut acp = ACPClassification::new(ClassificationNcm::default(), Classifier::default(), Sampling::default())
            .unwrap();
        assert!(acp.train(&data.into()).is_err());
        assert!(!acp.is_trained());
    }

    #[test]
    fn test_exclusive_records_used() {
        let data = TrainingData::new(blobs(40)).with_calibration_exclusive(blobs(10));
        let mut acp = ACPClassification::new(
            ClassificationNcm::default(),
            Classifier::default(),
            RandomSampling::new(3, 0.25).unwrap().into(),
        )
        .unwrap();
        acp.train(&data).unwrap();
        for icp in acp.icps() {
            let n: usize = icp.calibration_scores.iter().map(|s| s.len()).sum();
            assert_eq!(n, 20);
        }
    }

    #[test]
    fn test_metadata() {
        let mut acp = ACPClassification::new(ClassificationNcm::default(), Classifier::default(), Sampling::default())
            .unwrap();
        acp.insert_metadata("dataset".to_string(), "blobs".to_string());
        assert_eq!(acp.get_metadata(&"dataset".to_string()), Some("blobs".to_string()));
        assert_eq!(acp.get_metadata(&"missing".to_string()), None);
    }
}
