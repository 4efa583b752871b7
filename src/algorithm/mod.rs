//! Scoring Algorithms
//!
//! The underlying models wrapped by the conformal and Venn-ABERS predictors.
//! Every model produces real valued scores for a record: one decision value
//! per class for classifiers, a point prediction for regressors.
//!
//! # Submodules
//!
//! * `linear`: Linear decision functions shared by the models below.
//! * `svc`: L2-regularized linear support vector classification.
//! * `platt`: Platt scaled support vector classification with class probabilities.
//! * `svr`: L2-regularized linear epsilon support vector regression.

pub mod linear;
pub mod platt;
pub mod svc;
pub mod svr;

pub use platt::PlattScaledSVC;
pub use svc::LinearSVC;
pub use svr::LinearSVR;

use crate::data::FeatureVector;
use crate::errors::ConformalError;
use crate::utils::items_to_strings;
use serde::{Deserialize, Serialize};

/// A classifier producing one decision value per class.
///
/// Only [`fit`](ScoringClassifier::fit) and
/// [`decision_values`](ScoringClassifier::decision_values) are required;
/// models able to produce calibrated class probabilities override
/// [`supports_probability`](ScoringClassifier::supports_probability) and
/// [`probabilities`](ScoringClassifier::probabilities).
pub trait ScoringClassifier: Send + Sync {
    /// Fit the model.
    ///
    /// # Arguments
    /// * `x` – feature vectors of the training records.
    /// * `y` – class index of each record, in `0..n_classes`.
    /// * `n_classes` – number of classes, at least two.
    /// * `num_features` – number of feature dimensions to allocate weights for.
    /// * `seed` – seed for any randomness used while fitting.
    fn fit(
        &mut self,
        x: &[&FeatureVector],
        y: &[usize],
        n_classes: usize,
        num_features: usize,
        seed: u64,
    ) -> Result<(), ConformalError>;

    /// Decision values, higher meaning more likely, one per class index.
    fn decision_values(&self, x: &FeatureVector) -> Result<Vec<f64>, ConformalError>;

    fn supports_probability(&self) -> bool {
        false
    }

    /// Class probabilities, one per class index.
    fn probabilities(&self, _x: &FeatureVector) -> Result<Vec<f64>, ConformalError> {
        Err(ConformalError::InvalidParameter(
            "algorithm".to_string(),
            "a classifier supporting probabilities".to_string(),
            self.name().to_string(),
        ))
    }

    fn is_fitted(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// A regressor producing a point prediction.
pub trait ScoringRegressor: Send + Sync {
    fn fit(&mut self, x: &[&FeatureVector], y: &[f64], num_features: usize, seed: u64) -> Result<(), ConformalError>;

    fn predict(&self, x: &FeatureVector) -> Result<f64, ConformalError>;

    fn is_fitted(&self) -> bool;

    fn name(&self) -> &'static str;
}

pub(crate) fn check_fit_input(n_x: usize, n_y: usize) -> Result<(), ConformalError> {
    if n_x == 0 {
        return Err(ConformalError::EmptyDataset);
    }
    if n_x != n_y {
        return Err(ConformalError::InvalidParameter(
            "y".to_string(),
            format!("{} label(s)", n_x),
            n_y.to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn unknown_parameter(name: &str, algorithm: &str, known: Vec<&str>) -> ConformalError {
    ConformalError::InvalidParameter(
        name.to_string(),
        format!("a parameter of {} ({})", algorithm, items_to_strings(known)),
        name.to_string(),
    )
}

/// The scoring classifier used by a predictor.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum Classifier {
    /// Linear SVM, decision values are signed distances to the hyperplane.
    LinearSVC(LinearSVC),
    /// Linear SVM with Platt scaled probabilities.
    PlattScaledSVC(PlattScaledSVC),
}

impl Default for Classifier {
    fn default() -> Self {
        Classifier::LinearSVC(LinearSVC::default())
    }
}

impl Classifier {
    /// Names of the hyper-parameters that can be set with [`set_parameter`](Classifier::set_parameter).
    pub fn parameter_names(&self) -> Vec<&'static str> {
        vec!["cost", "tolerance", "maxIterations"]
    }

    pub fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), ConformalError> {
        match self {
            Classifier::LinearSVC(m) => m.set_parameter(name, value),
            Classifier::PlattScaledSVC(m) => m.svc.set_parameter(name, value),
        }
    }
}

impl ScoringClassifier for Classifier {
    fn fit(
        &mut self,
        x: &[&FeatureVector],
        y: &[usize],
        n_classes: usize,
        num_features: usize,
        seed: u64,
    ) -> Result<(), ConformalError> {
        match self {
            Classifier::LinearSVC(m) => m.fit(x, y, n_classes, num_features, seed),
            Classifier::PlattScaledSVC(m) => m.fit(x, y, n_classes, num_features, seed),
        }
    }

    fn decision_values(&self, x: &FeatureVector) -> Result<Vec<f64>, ConformalError> {
        match self {
            Classifier::LinearSVC(m) => m.decision_values(x),
            Classifier::PlattScaledSVC(m) => m.decision_values(x),
        }
    }

    fn supports_probability(&self) -> bool {
        match self {
            Classifier::LinearSVC(m) => m.supports_probability(),
            Classifier::PlattScaledSVC(m) => m.supports_probability(),
        }
    }

    fn probabilities(&self, x: &FeatureVector) -> Result<Vec<f64>, ConformalError> {
        match self {
            Classifier::LinearSVC(m) => m.probabilities(x),
            Classifier::PlattScaledSVC(m) => m.probabilities(x),
        }
    }

    fn is_fitted(&self) -> bool {
        match self {
            Classifier::LinearSVC(m) => m.is_fitted(),
            Classifier::PlattScaledSVC(m) => m.is_fitted(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Classifier::LinearSVC(m) => m.name(),
            Classifier::PlattScaledSVC(m) => m.name(),
        }
    }
}

/// The scoring regressor used by a predictor.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum Regressor {
    /// Linear epsilon-insensitive support vector regression.
    LinearSVR(LinearSVR),
}

impl Default for Regressor {
    fn default() -> Self {
        Regressor::LinearSVR(LinearSVR::default())
    }
}

impl Regressor {
    pub fn parameter_names(&self) -> Vec<&'static str> {
        vec!["cost", "svrEpsilon", "tolerance", "maxIterations"]
    }

    pub fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), ConformalError> {
        match self {
            Regressor::LinearSVR(m) => m.set_parameter(name, value),
        }
    }
}

impl ScoringRegressor for Regressor {
    fn fit(&mut self, x: &[&FeatureVector], y: &[f64], num_features: usize, seed: u64) -> Result<(), ConformalError> {
        match self {
            Regressor::LinearSVR(m) => m.fit(x, y, num_features, seed),
        }
    }

    fn predict(&self, x: &FeatureVector) -> Result<f64, ConformalError> {
        match self {
            Regressor::LinearSVR(m) => m.predict(x),
        }
    }

    fn is_fitted(&self) -> bool {
        match self {
            Regressor::LinearSVR(m) => m.is_fitted(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Regressor::LinearSVR(m) => m.name(),
        }
    }
}
