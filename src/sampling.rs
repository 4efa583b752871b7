//! Sampling
//!
//! Strategies partitioning a training set into proper-training and
//! calibration subsets, one partition per aggregated model.
use crate::constants::{DEFAULT_CALIBRATION_RATIO, DEFAULT_FOLDS, DEFAULT_NUM_MODELS, RANK_EPS};
use crate::errors::ConformalError;
use crate::utils::{class_label, validate_count_parameter, validate_float_parameter};
use log::warn;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Indices of the records used for fitting the scoring model and for calibrating it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub proper_training: Vec<usize>,
    pub calibration: Vec<usize>,
}

/// A sampling strategy turns labels into splits.
pub trait SamplingStrategy {
    /// Number of splits (and so aggregated models) produced.
    fn num_splits(&self) -> usize;

    /// Partition the records with the given labels.
    ///
    /// Stratified strategies require integral class labels.
    fn splits(&self, labels: &[f64], seed: u64) -> Result<Vec<Split>, ConformalError>;
}

fn default_num_models() -> usize {
    DEFAULT_NUM_MODELS
}
fn default_calibration_ratio() -> f64 {
    DEFAULT_CALIBRATION_RATIO
}
fn default_folds() -> usize {
    DEFAULT_FOLDS
}

/// Independent random calibration draws, each of `floor(n * calibration_ratio)` records.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RandomSampling {
    #[serde(default = "default_num_models")]
    pub num_models: usize,
    #[serde(default = "default_calibration_ratio")]
    pub calibration_ratio: f64,
    #[serde(default)]
    pub stratified: bool,
}

impl Default for RandomSampling {
    fn default() -> Self {
        RandomSampling {
            num_models: DEFAULT_NUM_MODELS,
            calibration_ratio: DEFAULT_CALIBRATION_RATIO,
            stratified: false,
        }
    }
}

impl RandomSampling {
    pub fn new(num_models: usize, calibration_ratio: f64) -> Result<Self, ConformalError> {
        let sampling = RandomSampling {
            num_models,
            calibration_ratio,
            stratified: false,
        };
        sampling.validate_parameters()?;
        Ok(sampling)
    }

    pub fn set_stratified(mut self, stratified: bool) -> Self {
        self.stratified = stratified;
        self
    }

    pub fn validate_parameters(&self) -> Result<(), ConformalError> {
        validate_count_parameter(self.num_models, 1, "num_models")?;
        if !(self.calibration_ratio > 0.0 && self.calibration_ratio < 1.0) {
            return Err(ConformalError::InvalidParameter(
                "calibration_ratio".to_string(),
                "a ratio strictly between 0 and 1".to_string(),
                self.calibration_ratio.to_string(),
            ));
        }
        Ok(())
    }

    /// Per class calibration sizes, rounded down.
    fn stratum_sizes(&self, strata: &BTreeMap<i64, Vec<usize>>) -> Result<Vec<usize>, ConformalError> {
        strata
            .iter()
            .map(|(label, members)| {
                let exact = members.len() as f64 * self.calibration_ratio;
                let size = (exact + RANK_EPS).floor() as usize;
                if size == 0 {
                    return Err(ConformalError::TooFewRecords {
                        label: *label,
                        count: members.len(),
                        purpose: format!("draw a stratified calibration set of ratio {}", self.calibration_ratio),
                    });
                }
                if size >= members.len() {
                    return Err(ConformalError::TooFewRecords {
                        label: *label,
                        count: members.len(),
                        purpose: format!(
                            "keep a proper training record at calibration ratio {}",
                            self.calibration_ratio
                        ),
                    });
                }
                if exact - size as f64 > RANK_EPS {
                    warn!(
                        "Class {} has {} record(s), rounding its calibration share {:.2} down to {}.",
                        label,
                        members.len(),
                        exact,
                        size
                    );
                }
                Ok(size)
            })
            .collect()
    }
}

impl SamplingStrategy for RandomSampling {
    fn num_splits(&self) -> usize {
        self.num_models
    }

    fn splits(&self, labels: &[f64], seed: u64) -> Result<Vec<Split>, ConformalError> {
        self.validate_parameters()?;
        if labels.is_empty() {
            return Err(ConformalError::EmptyDataset);
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let n = labels.len();

        if self.stratified {
            let strata = stratify(labels)?;
            let sizes = self.stratum_sizes(&strata)?;
            let mut splits = Vec::with_capacity(self.num_models);
            for _ in 0..self.num_models {
                let mut calibration = Vec::new();
                for (members, size) in strata.values().zip(&sizes) {
                    let mut shuffled = members.clone();
                    shuffled.shuffle(&mut rng);
                    calibration.extend_from_slice(&shuffled[..*size]);
                }
                splits.push(complement_split(n, calibration));
            }
            return Ok(splits);
        }

        let size = (n as f64 * self.calibration_ratio + RANK_EPS).floor() as usize;
        if size == 0 || size >= n {
            return Err(ConformalError::InvalidParameter(
                "calibration_ratio".to_string(),
                format!("a ratio leaving at least one calibration and one proper-training record of {}", n),
                self.calibration_ratio.to_string(),
            ));
        }
        let mut index: Vec<usize> = (0..n).collect();
        let splits = (0..self.num_models)
            .map(|_| {
                index.shuffle(&mut rng);
                complement_split(n, index[..size].to_vec())
            })
            .collect();
        Ok(splits)
    }
}

/// K disjoint folds, fold `k` is the calibration set of split `k`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FoldedSampling {
    #[serde(default = "default_folds")]
    pub folds: usize,
    #[serde(default)]
    pub stratified: bool,
}

impl Default for FoldedSampling {
    fn default() -> Self {
        FoldedSampling {
            folds: DEFAULT_FOLDS,
            stratified: false,
        }
    }
}

impl FoldedSampling {
    pub fn new(folds: usize) -> Result<Self, ConformalError> {
        let sampling = FoldedSampling {
            folds,
            stratified: false,
        };
        sampling.validate_parameters()?;
        Ok(sampling)
    }

    pub fn set_stratified(mut self, stratified: bool) -> Self {
        self.stratified = stratified;
        self
    }

    pub fn validate_parameters(&self) -> Result<(), ConformalError> {
        validate_count_parameter(self.folds, 2, "folds")
    }
}

impl SamplingStrategy for FoldedSampling {
    fn num_splits(&self) -> usize {
        self.folds
    }

    fn splits(&self, labels: &[f64], seed: u64) -> Result<Vec<Split>, ConformalError> {
        self.validate_parameters()?;
        let n = labels.len();
        if n == 0 {
            return Err(ConformalError::EmptyDataset);
        }
        if n < self.folds {
            return Err(ConformalError::InvalidParameter(
                "folds".to_string(),
                format!("at most {} folds for {} record(s)", n, n),
                self.folds.to_string(),
            ));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.folds];

        if self.stratified {
            // Deal each class round-robin, continuing where the previous class stopped.
            let mut next = 0;
            for (label, members) in stratify(labels)? {
                if members.len() < self.folds {
                    warn!(
                        "Class {} has {} record(s), fewer than the {} folds; some folds will lack it.",
                        label,
                        members.len(),
                        self.folds
                    );
                }
                let mut shuffled = members;
                shuffled.shuffle(&mut rng);
                for i in shuffled {
                    folds[next % self.folds].push(i);
                    next += 1;
                }
            }
        } else {
            let mut index: Vec<usize> = (0..n).collect();
            index.shuffle(&mut rng);
            for (position, i) in index.into_iter().enumerate() {
                folds[position % self.folds].push(i);
            }
        }

        if let Some(k) = folds.iter().position(|f| f.is_empty()) {
            return Err(ConformalError::DegenerateSplit {
                split: k,
                reason: "the calibration fold is empty".to_string(),
            });
        }
        Ok(folds.into_iter().map(|fold| complement_split(n, fold)).collect())
    }
}

/// The sampling strategy of a predictor.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Sampling {
    Random(RandomSampling),
    Folded(FoldedSampling),
}

impl Default for Sampling {
    fn default() -> Self {
        Sampling::Random(RandomSampling::default())
    }
}

impl From<RandomSampling> for Sampling {
    fn from(value: RandomSampling) -> Self {
        Sampling::Random(value)
    }
}

impl From<FoldedSampling> for Sampling {
    fn from(value: FoldedSampling) -> Self {
        Sampling::Folded(value)
    }
}

impl Sampling {
    pub fn validate_parameters(&self) -> Result<(), ConformalError> {
        match self {
            Sampling::Random(s) => s.validate_parameters(),
            Sampling::Folded(s) => s.validate_parameters(),
        }
    }

    pub fn is_stratified(&self) -> bool {
        match self {
            Sampling::Random(s) => s.stratified,
            Sampling::Folded(s) => s.stratified,
        }
    }
}

impl SamplingStrategy for Sampling {
    fn num_splits(&self) -> usize {
        match self {
            Sampling::Random(s) => s.num_splits(),
            Sampling::Folded(s) => s.num_splits(),
        }
    }

    fn splits(&self, labels: &[f64], seed: u64) -> Result<Vec<Split>, ConformalError> {
        match self {
            Sampling::Random(s) => s.splits(labels, seed),
            Sampling::Folded(s) => s.splits(labels, seed),
        }
    }
}

/// Group record indices by class label.
fn stratify(labels: &[f64]) -> Result<BTreeMap<i64, Vec<usize>>, ConformalError> {
    let mut strata: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        strata.entry(class_label(*label)?).or_default().push(i);
    }
    Ok(strata)
}

fn complement_split(n: usize, mut calibration: Vec<usize>) -> Split {
    calibration.sort_unstable();
    let mut in_calibration = vec![false; n];
    for i in &calibration {
        in_calibration[*i] = true;
    }
    let proper_training = (0..n).filter(|i| !in_calibration[*i]).collect();
    Split {
        proper_training,
        calibration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced_labels(n: usize) -> Vec<f64> {
        (0..n).map(|i| (i % 2) as f64).collect()
    }

    #[test]
    fn test_random_sampling() {
        let sampling = RandomSampling::new(10, 0.2).unwrap();
        let splits = sampling.splits(&balanced_labels(100), 42).unwrap();
        assert_eq!(splits.len(), 10);
        for s in &splits {
            assert_eq!(s.calibration.len(), 20);
            assert_eq!(s.proper_training.len(), 80);
            assert!(s.calibration.iter().all(|i| !s.proper_training.contains(i)));
        }
        // Draws are independent, not a partition.
        assert_ne!(splits[0].calibration, splits[1].calibration);
        // Same seed, same splits.
        assert_eq!(splits, sampling.splits(&balanced_labels(100), 42).unwrap());
    }

    #[test]
    fn test_random_sampling_invalid() {
        assert!(RandomSampling::new(0, 0.2).is_err());
        assert!(RandomSampling::new(5, 1.0).is_err());
        assert!(RandomSampling::new(5, 0.0).is_err());
        let sampling = RandomSampling::new(5, 0.2).unwrap();
        assert!(sampling.splits(&[0.0, 1.0], 0).is_err());
        assert!(matches!(sampling.splits(&[], 0), Err(ConformalError::EmptyDataset)));
    }

    #[test]
    fn test_folded_sampling_covers_each_record_once() {
        let n = 53;
        let sampling = FoldedSampling::new(5).unwrap();
        let splits = sampling.splits(&balanced_labels(n), 7).unwrap();
        assert_eq!(splits.len(), 5);
        let mut seen = vec![0; n];
        for s in &splits {
            assert_eq!(s.calibration.len() + s.proper_training.len(), n);
            assert!(s.calibration.len() == 10 || s.calibration.len() == 11);
            for i in &s.calibration {
                seen[*i] += 1;
            }
        }
        assert!(seen.iter().all(|c| *c == 1));
    }

    #[test]
    fn test_folded_sampling_invalid() {
        assert!(FoldedSampling::new(1).is_err());
        let sampling = FoldedSampling::new(10).unwrap();
        assert!(sampling.splits(&balanced_labels(5), 0).is_err());
    }

    #[test]
    fn test_stratified_random_sampling() {
        let mut labels = vec![0.0; 30];
        labels.extend(vec![1.0; 12]);
        let sampling = RandomSampling::new(3, 0.2).unwrap().set_stratified(true);
        for s in sampling.splits(&labels, 1).unwrap() {
            let ones = s.calibration.iter().filter(|i| labels[**i] == 1.0).count();
            // 6 of class 0 and 12 * 0.2 = 2.4 rounded down to 2 of class 1.
            assert_eq!(ones, 2);
            assert_eq!(s.calibration.len(), 8);
        }
    }

    #[test]
    fn test_stratified_small_classes_keep_proper_training() {
        let mut labels = vec![0.0; 2];
        labels.extend(vec![1.0; 5]);
        labels.extend(vec![2.0; 10]);
        // 5 * 0.2 is exactly one calibration record, 10 * 0.2 two, 2 * 0.5 one.
        for (ratio, expected) in [(0.5, [1, 2, 5]), (0.6, [1, 3, 6])] {
            let sampling = RandomSampling::new(20, ratio).unwrap().set_stratified(true);
            for s in sampling.splits(&labels, 3).unwrap() {
                for (class, size) in expected.iter().enumerate() {
                    let count = |idx: &[usize]| idx.iter().filter(|i| labels[**i] == class as f64).count();
                    assert_eq!(count(s.calibration.as_slice()), *size);
                    assert!(count(s.proper_training.as_slice()) >= 1, "class {} lost at ratio {}", class, ratio);
                }
            }
        }
        let labels: Vec<f64> = labels.into_iter().filter(|l| *l != 0.0).collect();
        let sampling = RandomSampling::new(20, 0.2).unwrap().set_stratified(true);
        for s in sampling.splits(&labels, 3).unwrap() {
            let ones = s.calibration.iter().filter(|i| labels[**i] == 1.0).count();
            assert_eq!(ones, 1);
            assert_eq!(s.proper_training.len(), labels.len() - 3);
        }

        // A share rounding up to the whole class leaves no proper training record.
        let sampling = RandomSampling::new(2, 1.0 - 1e-12).unwrap().set_stratified(true);
        assert!(matches!(
            sampling.splits(&[0.0, 0.0, 1.0, 1.0], 1),
            Err(ConformalError::TooFewRecords { count: 2, .. })
        ));
    }

    #[test]
    fn test_stratified_too_few_records() {
        let mut labels = vec![0.0; 30];
        labels.extend(vec![1.0; 3]);
        let sampling = RandomSampling::new(3, 0.2).unwrap().set_stratified(true);
        match sampling.splits(&labels, 1) {
            Err(ConformalError::TooFewRecords { label, count, .. }) => {
                assert_eq!(label, 1);
                assert_eq!(count, 3);
            }
            other => panic!("expected TooFewRecords, got {:?}", other),
        }
        assert!(matches!(
            sampling.splits(&[0.5, 1.0, 0.0, 1.0, 0.0], 1),
            Err(ConformalError::InvalidLabel(_))
        ));
    }

    #[test]
    fn test_stratified_folds() {
        let mut labels = vec![0.0; 20];
        labels.extend(vec![1.0; 3]);
        let sampling = FoldedSampling::new(4).unwrap().set_stratified(true);
        let splits = sampling.splits(&labels, 3).unwrap();
        let mut seen = vec![0; labels.len()];
        for s in &splits {
            let zeros = s.calibration.iter().filter(|i| labels[**i] == 0.0).count();
            assert_eq!(zeros, 5);
            for i in &s.calibration {
                seen[*i] += 1;
            }
        }
        assert!(seen.iter().all(|c| *c == 1));
    }
}
