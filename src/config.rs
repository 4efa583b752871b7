//! Predictor Configuration
//!
//! Settings shared by every predictor: how split results are aggregated,
//! how many threads train the splits, the seed of all sampling and what to
//! do with unseen test features.
use crate::data::FeaturePolicy;
use crate::errors::ConformalError;
use crate::io::ModelIO;
use crate::utils::{items_to_strings, mean, median};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How per split p-values, bounds and predictions are combined.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Aggregation {
    #[default]
    Mean,
    Median,
}

impl Aggregation {
    pub fn aggregate(&self, values: &[f64]) -> f64 {
        match self {
            Aggregation::Mean => mean(values),
            Aggregation::Median => median(values),
        }
    }
}

impl FromStr for Aggregation {
    type Err = ConformalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Mean" => Ok(Aggregation::Mean),
            "Median" => Ok(Aggregation::Median),
            _ => Err(ConformalError::ParseString(
                s.to_string(),
                "Aggregation".to_string(),
                items_to_strings(vec!["Mean", "Median"]),
            )),
        }
    }
}

fn default_num_threads() -> Option<usize> {
    None
}
fn default_seed() -> u64 {
    0
}
fn default_log_splits() -> bool {
    false
}

/// Configuration common to all predictors.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PredictorConfig {
    #[serde(default)]
    pub aggregation: Aggregation,
    /// Number of threads training splits, all available cores when `None`.
    #[serde(default = "default_num_threads")]
    pub num_threads: Option<usize>,
    /// Seed of the sampling strategy and the scoring models.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub feature_policy: FeaturePolicy,
    /// Log a line for every trained split.
    #[serde(default = "default_log_splits")]
    pub log_splits: bool,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        PredictorConfig {
            aggregation: Aggregation::default(),
            num_threads: default_num_threads(),
            seed: default_seed(),
            feature_policy: FeaturePolicy::default(),
            log_splits: default_log_splits(),
        }
    }
}

impl PredictorConfig {
    pub fn set_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn set_num_threads(mut self, num_threads: Option<usize>) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn set_feature_policy(mut self, feature_policy: FeaturePolicy) -> Self {
        self.feature_policy = feature_policy;
        self
    }

    pub fn set_log_splits(mut self, log_splits: bool) -> Self {
        self.log_splits = log_splits;
        self
    }

    /// Build the thread pool training the splits.
    pub(crate) fn thread_pool(&self) -> Result<rayon::ThreadPool, ConformalError> {
        let num_threads = match self.num_threads {
            Some(n) => n,
            None => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        };
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| {
                ConformalError::InvalidParameter(
                    "num_threads".to_string(),
                    "a buildable thread pool".to_string(),
                    e.to_string(),
                )
            })
    }
}

impl ModelIO for PredictorConfig {}
