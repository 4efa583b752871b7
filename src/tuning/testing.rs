use crate::data::Dataset;
use crate::errors::ConformalError;
use crate::utils::validate_count_parameter;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// How a dataset is divided into training and test sets.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum TestingStrategy {
    /// Every record is tested once, by the model trained on the other folds.
    KFoldCV { folds: usize, seed: u64 },
    LeaveOneOut,
    /// A single split testing on `test_fraction` of the records.
    RandomSplit { test_fraction: f64, seed: u64 },
}

impl Default for TestingStrategy {
    fn default() -> Self {
        TestingStrategy::KFoldCV { folds: 10, seed: 0 }
    }
}

impl TestingStrategy {
    pub fn validate_parameters(&self) -> Result<(), ConformalError> {
        match self {
            TestingStrategy::KFoldCV { folds, .. } => validate_count_parameter(*folds, 2, "folds"),
            TestingStrategy::LeaveOneOut => Ok(()),
            TestingStrategy::RandomSplit { test_fraction, .. } => {
                if *test_fraction > 0.0 && *test_fraction < 1.0 {
                    Ok(())
                } else {
                    Err(ConformalError::InvalidParameter(
                        "test_fraction".to_string(),
                        "a fraction strictly between 0 and 1".to_string(),
                        test_fraction.to_string(),
                    ))
                }
            }
        }
    }

    /// `(train, test)` pairs, in a reproducible order.
    pub fn splits(&self, data: &Dataset) -> Result<Vec<(Dataset, Dataset)>, ConformalError> {
        self.validate_parameters()?;
        let n = data.len();
        if n < 2 {
            return Err(ConformalError::EmptyDataset);
        }
        match self {
            TestingStrategy::KFoldCV { folds, seed } => {
                if n < *folds {
                    return Err(ConformalError::InvalidParameter(
                        "folds".to_string(),
                        format!("at most {} folds", n),
                        folds.to_string(),
                    ));
                }
                let mut index: Vec<usize> = (0..n).collect();
                index.shuffle(&mut StdRng::seed_from_u64(*seed));
                Ok((0..*folds)
                    .map(|k| {
                        let (test, train): (Vec<usize>, Vec<usize>) =
                            (0..n).partition(|position| position % folds == k);
                        let test: Vec<usize> = test.into_iter().map(|p| index[p]).collect();
                        let train: Vec<usize> = train.into_iter().map(|p| index[p]).collect();
                        (data.select(&train), data.select(&test))
                    })
                    .collect())
            }
            TestingStrategy::LeaveOneOut => Ok((0..n)
                .map(|i| {
                    let train: Vec<usize> = (0..n).filter(|j| *j != i).collect();
                    (data.select(&train), data.select(&[i]))
                })
                .collect()),
            TestingStrategy::RandomSplit { test_fraction, seed } => {
                let (test, train) = data.split_random(*test_fraction, *seed)?;
                if test.is_empty() || train.is_empty() {
                    return Err(ConformalError::InvalidParameter(
                        "test_fraction".to_string(),
                        format!("a fraction leaving records in both parts of {}", n),
                        test_fraction.to_string(),
                    ));
                }
                Ok(vec![(train, test)])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FeatureVector, Record};

    fn data(n: usize) -> Dataset {
        (0..n)
            .map(|i| Record::new(FeatureVector::dense(vec![i as f64]), i as f64))
            .collect()
    }

    #[test]
    fn test_k_fold_tests_every_record_once() {
        let splits = TestingStrategy::KFoldCV { folds: 4, seed: 1 }.splits(&data(22)).unwrap();
        assert_eq!(splits.len(), 4);
        let mut tested: Vec<f64> = splits.iter().flat_map(|(_, test)| test.labels()).collect();
        tested.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(tested, data(22).labels());
        for (train, test) in &splits {
            assert_eq!(train.len() + test.len(), 22);
        }
    }

    #[test]
    fn test_leave_one_out_and_random_split() {
        let splits = TestingStrategy::LeaveOneOut.splits(&data(5)).unwrap();
        assert_eq!(splits.len(), 5);
        assert!(splits.iter().all(|(train, test)| train.len() == 4 && test.len() == 1));

        let splits = TestingStrategy::RandomSplit {
            test_fraction: 0.25,
            seed: 3,
        }
        .splits(&data(20))
        .unwrap();
        assert_eq!(splits[0].1.len(), 5);
        assert_eq!(splits[0].0.len(), 15);
    }

    #[test]
    fn test_invalid_strategies() {
        assert!(TestingStrategy::KFoldCV { folds: 1, seed: 0 }.splits(&data(10)).is_err());
        assert!(TestingStrategy::KFoldCV { folds: 20, seed: 0 }.splits(&data(10)).is_err());
        assert!(TestingStrategy::RandomSplit {
            test_fraction: 1.0,
            seed: 0
        }
        .splits(&data(10))
        .is_err());
    }
}
