// Modules
pub mod algorithm;
pub mod config;
pub mod constants;
pub mod cp;
pub mod data;
pub mod errors;
pub mod io;
pub mod metrics;
pub mod ncm;
pub mod sampling;
pub mod transform;
pub mod tuning;
pub mod utils;
pub mod venn_abers;

// Individual classes, and functions
pub use algorithm::{Classifier, LinearSVC, LinearSVR, PlattScaledSVC, Regressor};
pub use config::{Aggregation, PredictorConfig};
pub use cp::{ACPClassification, ACPRegression, Predictor, TCPClassification};
pub use data::{Dataset, FeatureVector, Record, TrainingData};
pub use errors::ConformalError;
pub use io::ModelIO;
pub use metrics::Metric;
pub use ncm::{ClassificationNcm, RegressionNcm};
pub use sampling::{FoldedSampling, RandomSampling, Sampling};
pub use tuning::{GridSearch, ParameterGrid, TestRunner, TestingStrategy};
pub use venn_abers::AVAPClassification;
