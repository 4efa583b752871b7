//! Transductive conformal classification.
//!
//! No calibration set is held out: for every test record and candidate
//! label the scoring model is refit on the training records plus the test
//! record carrying that label, and the test score is compared with the
//! scores of the training records of the same class.
use crate::algorithm::{Classifier, ScoringClassifier};
use crate::config::PredictorConfig;
use crate::cp::{class_index, record_class, require_classes, validate_confidence, Predictor};
use crate::data::{Dataset, FeatureVector, TrainingData};
use crate::errors::ConformalError;
use crate::io::ModelIO;
use crate::metrics::{ClassificationOutcome, EvaluationData};
use crate::ncm::ClassificationNcm;
use crate::tuning::Configurable;
use crate::utils::class_label;
use hashbrown::HashMap;
use log::info;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TCPClassification {
    pub ncm: ClassificationNcm,
    pub classifier: Classifier,
    #[serde(default)]
    pub cfg: PredictorConfig,
    #[serde(default)]
    labels: Vec<i64>,
    #[serde(default)]
    num_features: usize,
    #[serde(default)]
    training: Dataset,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl TCPClassification {
    pub fn new(ncm: ClassificationNcm, classifier: Classifier) -> Result<Self, ConformalError> {
        ncm.validate(&classifier)?;
        Ok(TCPClassification {
            ncm,
            classifier,
            cfg: PredictorConfig::default(),
            labels: Vec::new(),
            num_features: 0,
            training: Dataset::default(),
            metadata: HashMap::new(),
        })
    }

    pub fn set_config(mut self, cfg: PredictorConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// p-value of `x` carrying the label at class index `c`.
    fn p_value(&self, index: &HashMap<i64, usize>, x: &FeatureVector, c: usize) -> Result<f64, ConformalError> {
        let records = self.training.records();
        let mut features: Vec<&FeatureVector> = records.iter().map(|r| r.features()).collect();
        let mut y = records
            .iter()
            .map(|r| record_class(index, r))
            .collect::<Result<Vec<_>, _>>()?;
        features.push(x);
        y.push(c);

        let mut model = self.classifier.clone();
        model.fit(&features, &y, self.labels.len(), self.num_features, self.cfg.seed)?;
        let test_score = self.ncm.scores(&model, x)?[c];
        let mut n_class = 0;
        let mut n_at_least = 0;
        for (xi, yi) in features[..records.len()].iter().zip(&y) {
            if *yi != c {
                continue;
            }
            n_class += 1;
            if self.ncm.scores(&model, xi)?[c] >= test_score {
                n_at_least += 1;
            }
        }
        Ok((n_at_least as f64 + 1.0) / (n_class as f64 + 1.0))
    }

    /// p-value of every label for a test record.
    pub fn predict(&self, x: &FeatureVector) -> Result<BTreeMap<i64, f64>, ConformalError> {
        if !self.is_trained() {
            return Err(ConformalError::NotTrained("TCPClassification".to_string()));
        }
        self.predict_with_pool(&self.cfg.thread_pool()?, x)
    }

    fn predict_with_pool(&self, pool: &ThreadPool, x: &FeatureVector) -> Result<BTreeMap<i64, f64>, ConformalError> {
        self.cfg.feature_policy.check(x, self.num_features)?;
        let index = class_index(&self.labels);
        let p_values = pool.install(|| {
            (0..self.labels.len())
                .into_par_iter()
                .map(|c| self.p_value(&index, x, c))
                .collect::<Result<Vec<_>, _>>()
        })?;
        Ok(self.labels.iter().copied().zip(p_values).collect())
    }

    pub fn predict_set(&self, x: &FeatureVector, significance: f64) -> Result<Vec<i64>, ConformalError> {
        validate_confidence(significance, "significance")?;
        Ok(self
            .predict(x)?
            .into_iter()
            .filter(|(_, p)| *p > significance)
            .map(|(l, _)| l)
            .collect())
    }

    pub fn labels(&self) -> &[i64] {
        &self.labels
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

impl Predictor for TCPClassification {
    /// Store the training records; all exclusive records are used as ordinary records.
    fn train(&mut self, data: &TrainingData) -> Result<(), ConformalError> {
        self.training = Dataset::default();
        self.labels.clear();
        self.num_features = 0;
        let labels = data.class_labels()?;
        if data.is_empty() {
            return Err(ConformalError::EmptyDataset);
        }
        require_classes(&labels)?;
        self.training = data.all_records().cloned().collect();
        self.num_features = data.num_features();
        self.labels = labels;
        info!("Stored {} record(s) for TCPClassification.", self.training.len());
        Ok(())
    }

    fn evaluate(&self, test: &Dataset, confidence: f64) -> Result<EvaluationData, ConformalError> {
        validate_confidence(confidence, "confidence")?;
        if !self.is_trained() {
            return Err(ConformalError::NotTrained("TCPClassification".to_string()));
        }
        let pool = self.cfg.thread_pool()?;
        let outcomes = test
            .records()
            .iter()
            .map(|r| {
                Ok(ClassificationOutcome {
                    label: class_label(r.label())?,
                    p_values: self.predict_with_pool(&pool, r.features())?,
                })
            })
            .collect::<Result<Vec<_>, ConformalError>>()?;
        Ok(EvaluationData::Classification(outcomes))
    }

    fn is_trained(&self) -> bool {
        !self.training.is_empty()
    }
}

impl Configurable for TCPClassification {
    fn config_parameters(&self) -> Vec<&'static str> {
        self.classifier.parameter_names()
    }

    fn set_config_parameter(&mut self, name: &str, value: f64) -> Result<(), ConformalError> {
        self.classifier.set_parameter(name, value)
    }
}

impl ModelIO for TCPClassification {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Record;

    #[test]
    fn test_tcp_predict() {
        let data: Dataset = (0..30)
            .map(|i| {
                let label = (i % 2) as f64;
                let x = if i % 2 == 0 { -1.0 } else { 1.0 } * (1.0 + (i % 5) as f64 / 5.0);
                Record::new(FeatureVector::dense(vec![x]), label)
            })
            .collect();
        let mut tcp = TCPClassification::new(ClassificationNcm::default(), Classifier::default()).unwrap();
        assert!(!tcp.is_trained());
        tcp.train(&data.into()).unwrap();
        let p = tcp.predict(&FeatureVector::dense(vec![1.4])).unwrap();
        assert_eq!(p.len(), 2);
        assert!(p.values().all(|v| (0.0..=1.0).contains(v)));
        assert!(p[&1] > p[&0]);
        // The test record is the strangest of class 0, p = 1 / 16.
        approx::assert_relative_eq!(p[&0], 1.0 / 16.0);
        assert_eq!(tcp.predict_set(&FeatureVector::dense(vec![1.4]), 0.1).unwrap(), vec![1]);

        let test: Dataset = vec![
            Record::new(FeatureVector::dense(vec![1.4]), 1.0),
            Record::new(FeatureVector::dense(vec![-1.4]), 0.0),
        ]
        .into_iter()
        .collect();
        match tcp.evaluate(&test, 0.9).unwrap() {
            EvaluationData::Classification(outcomes) => {
                assert_eq!(outcomes.len(), 2);
                assert_eq!(outcomes[0].p_values, p);
                assert!(outcomes[1].p_values[&0] > outcomes[1].p_values[&1]);
            }
            other => panic!("unexpected evaluation data {:?}", other),
        }
    }

    #[test]
    fn test_tcp_failed_train_clears_state() {
        let data: Dataset = (0..10)
            .map(|i| Record::new(FeatureVector::dense(vec![i as f64]), (i % 2) as f64))
            .collect();
        let mut tcp = TCPClassification::new(ClassificationNcm::default(), Classifier::default()).unwrap();
        tcp.train(&data.into()).unwrap();
        assert!(tcp.is_trained());

        let single_class: Dataset = (0..5)
            .map(|i| Record::new(FeatureVector::dense(vec![i as f64]), 1.0))
            .collect();
        assert!(tcp.train(&single_class.into()).is_err());
        assert!(!tcp.is_trained());
        assert!(tcp.labels().is_empty());
        assert!(matches!(
            tcp.predict(&FeatureVector::dense(vec![1.0])),
            Err(ConformalError::NotTrained(_))
        ));
        assert!(matches!(
            tcp.evaluate(&Dataset::default(), 0.9),
            Err(ConformalError::NotTrained(_))
        ));
    }
}
