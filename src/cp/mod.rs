//! Conformal Predictors
//!
//! Aggregated (random splits) and cross (folds) conformal predictors for
//! classification and regression, plus a transductive classifier.
//!
//! Every split fits a private copy of the scoring model on its proper
//! training records and keeps the nonconformity scores of its calibration
//! records. Splits are independent and train in parallel; their p-values
//! or interval bounds are aggregated at prediction time.
//!
//! # Submodules
//!
//! * `classification`: [`ACPClassification`], Mondrian p-values per label.
//! * `regression`: [`ACPRegression`], prediction intervals per confidence.
//! * `tcp`: [`TCPClassification`], refits the scoring model for every test record.

pub mod classification;
pub mod regression;
pub mod tcp;

#[cfg(test)]
mod tests;

pub use classification::{ACPClassification, ClassificationIcp};
pub use regression::{ACPRegression, DistanceConfidence, PredictionInterval, RegressionIcp, RegressionPrediction};
pub use tcp::TCPClassification;

use crate::config::PredictorConfig;
use crate::data::{Dataset, Record, TrainingData};
use crate::errors::ConformalError;
use crate::metrics::EvaluationData;
use crate::sampling::{Sampling, SamplingStrategy, Split};
use crate::utils::{class_label, validate_float_parameter};
use hashbrown::HashMap;
use log::{info, warn};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// A trainable predictor that can be evaluated on a labelled test set.
pub trait Predictor: Clone + Send + Sync {
    /// Train from scratch, discarding any previous state.
    fn train(&mut self, data: &TrainingData) -> Result<(), ConformalError>;

    /// Predict every record of `test`.
    ///
    /// Regression intervals are computed at `confidence`; classification
    /// outcomes keep all p-values so metrics can be taken at any level.
    fn evaluate(&self, test: &Dataset, confidence: f64) -> Result<EvaluationData, ConformalError>;

    fn is_trained(&self) -> bool;

    /// Whether predictions carry the conformal validity guarantee.
    fn is_conformal(&self) -> bool {
        true
    }
}

/// Proper training and calibration records of one split.
pub(crate) struct SplitRecords<'a> {
    pub proper_training: Vec<&'a Record>,
    pub calibration: Vec<&'a Record>,
}

/// Resolve a split of the dataset, adding the exclusive records.
pub(crate) fn split_records<'a>(data: &'a TrainingData, split: &Split) -> SplitRecords<'a> {
    let records = data.dataset.records();
    let proper_training = split
        .proper_training
        .iter()
        .map(|i| &records[*i])
        .chain(data.modeling_exclusive.records())
        .collect();
    let calibration = split
        .calibration
        .iter()
        .map(|i| &records[*i])
        .chain(data.calibration_exclusive.records())
        .collect();
    SplitRecords {
        proper_training,
        calibration,
    }
}

pub(crate) fn make_splits(sampling: &Sampling, data: &TrainingData, seed: u64) -> Result<Vec<Split>, ConformalError> {
    if data.is_empty() {
        return Err(ConformalError::EmptyDataset);
    }
    sampling.splits(&data.dataset.labels(), seed)
}

/// Map each class label to its index in the sorted label list.
pub(crate) fn class_index(labels: &[i64]) -> HashMap<i64, usize> {
    labels.iter().enumerate().map(|(i, l)| (*l, i)).collect()
}

pub(crate) fn record_class(index: &HashMap<i64, usize>, record: &Record) -> Result<usize, ConformalError> {
    let label = class_label(record.label())?;
    index
        .get(&label)
        .copied()
        .ok_or(ConformalError::InvalidLabel(record.label()))
}

pub(crate) fn require_classes(labels: &[i64]) -> Result<(), ConformalError> {
    if labels.len() < 2 {
        return Err(ConformalError::InvalidParameter(
            "labels".to_string(),
            "at least 2 classes".to_string(),
            labels.len().to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_confidence(value: f64, name: &str) -> Result<(), ConformalError> {
    validate_float_parameter(value, 0.0, 1.0, name)
}

/// Seed of the scoring model of split `k`.
#[inline]
pub(crate) fn split_seed(seed: u64, k: usize) -> u64 {
    seed.wrapping_add(k as u64)
}

/// Train every split on the configured thread pool.
///
/// Splits failing with [`ConformalError::DegenerateSplit`] are logged and
/// excluded; any other error aborts training. Once `cancel` is raised no
/// further split starts and all finished work is dropped.
pub(crate) fn train_splits<T, F>(
    cfg: &PredictorConfig,
    splits: &[Split],
    cancel: &AtomicBool,
    train_split: F,
) -> Result<Vec<T>, ConformalError>
where
    T: Send,
    F: Fn(usize, &Split) -> Result<T, ConformalError> + Sync,
{
    let pool = cfg.thread_pool()?;
    let n_splits = splits.len();
    let results: Vec<Result<T, ConformalError>> = pool.install(|| {
        splits
            .par_iter()
            .enumerate()
            .map(|(k, split)| {
                if cancel.load(Ordering::Relaxed) {
                    return Err(ConformalError::Cancelled);
                }
                let result = train_split(k, split);
                if cfg.log_splits && result.is_ok() {
                    info!(
                        "Split {} of {}: {} proper training, {} calibration record(s).",
                        k + 1,
                        n_splits,
                        split.proper_training.len(),
                        split.calibration.len()
                    );
                }
                result
            })
            .collect()
    });

    if cancel.load(Ordering::Relaxed) {
        return Err(ConformalError::Cancelled);
    }
    let mut trained = Vec::with_capacity(n_splits);
    for result in results {
        match result {
            Ok(t) => trained.push(t),
            Err(ConformalError::DegenerateSplit { split, reason }) => {
                warn!("Excluding split {}: {}", split, reason);
            }
            Err(e) => return Err(e),
        }
    }
    if trained.is_empty() {
        return Err(ConformalError::NoValidSplits(n_splits));
    }
    Ok(trained)
}
