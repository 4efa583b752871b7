//! Errors
//!
//! Custom error types used throughout the `conformist` crate.
use thiserror::Error;

/// Errors that can occur while loading data, training or using a predictor.
#[derive(Debug, Error)]
pub enum ConformalError {
    /// Unable to write model to file.
    #[error("Unable to write model to file: {0}")]
    UnableToWrite(String),
    /// Unable to read model from file.
    #[error("Unable to read model from a file {0}")]
    UnableToRead(String),
    /// Invalid value parsing.
    #[error("Invalid value {0} passed for {1}, expected one of {2}.")]
    ParseString(String, String, String),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// The nonconformity measure needs a capability the scoring model lacks.
    #[error("Nonconformity measure {ncm} cannot be used with {algorithm}: {reason}.")]
    IncompatibleNcm {
        ncm: String,
        algorithm: String,
        reason: String,
    },
    /// The metric cannot be computed for this kind of predictor.
    #[error("Metric {0} is not supported for {1} predictions.")]
    UnsupportedMetric(String, String),
    /// A line of an input file could not be parsed.
    #[error("Malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
    /// No records were available.
    #[error("The dataset is empty.")]
    EmptyDataset,
    /// A label that must be an integral class value was not.
    #[error("Label {0} is not a valid class label.")]
    InvalidLabel(f64),
    /// A class has too few members to build the requested partition.
    #[error("Class {label} has {count} record(s), too few to {purpose}.")]
    TooFewRecords {
        label: i64,
        count: usize,
        purpose: String,
    },
    /// A single split could not be used for training.
    #[error("Split {split} is degenerate: {reason}")]
    DegenerateSplit { split: usize, reason: String },
    /// Every split was excluded during training.
    #[error("None of the {0} split(s) could be trained.")]
    NoValidSplits(usize),
    /// Training was aborted through the cancellation flag.
    #[error("Training was cancelled before all splits were completed.")]
    Cancelled,
    /// The predictor (or transformer) has not been trained.
    #[error("The {0} has not been trained.")]
    NotTrained(String),
    /// A test vector refers to a feature the model was never trained on.
    #[error("Feature index {index} is outside the {num_features} feature(s) seen during training.")]
    FeatureOutOfRange { index: usize, num_features: usize },
}
