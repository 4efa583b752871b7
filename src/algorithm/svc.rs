//! Linear support vector classification.
//!
//! L2-regularized, L1-loss (hinge) SVM solved in the dual with coordinate
//! descent (Hsieh et al., 2008). Two classes are handled by a single model,
//! more classes by one-vs-rest models.
use crate::algorithm::linear::{iterations_from, validate_solver, LinearModel};
use crate::algorithm::{check_fit_input, unknown_parameter, ScoringClassifier};
use crate::constants::{DEFAULT_COST, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE};
use crate::data::FeatureVector;
use crate::errors::ConformalError;
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

fn default_cost() -> f64 {
    DEFAULT_COST
}
fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}
fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LinearSVC {
    /// Penalty of the hinge loss.
    #[serde(default = "default_cost")]
    pub cost: f64,
    /// Stopping tolerance on the projected gradient range.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Maximum passes over the data.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    models: Vec<LinearModel>,
    #[serde(default)]
    n_classes: usize,
}

impl Default for LinearSVC {
    fn default() -> Self {
        LinearSVC {
            cost: DEFAULT_COST,
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            models: Vec::new(),
            n_classes: 0,
        }
    }
}

impl LinearSVC {
    pub fn new(cost: f64) -> Result<Self, ConformalError> {
        let svc = LinearSVC {
            cost,
            ..Default::default()
        };
        svc.validate_parameters()?;
        Ok(svc)
    }

    pub fn set_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn set_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn validate_parameters(&self) -> Result<(), ConformalError> {
        validate_solver(self.cost, self.tolerance, self.max_iterations)
    }

    /// Set a named hyper-parameter. A rejected value leaves the model unchanged.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), ConformalError> {
        let mut candidate = self.clone();
        match name {
            "cost" => candidate.cost = value,
            "tolerance" => candidate.tolerance = value,
            "maxIterations" => candidate.max_iterations = iterations_from(value)?,
            _ => {
                return Err(unknown_parameter(
                    name,
                    self.name(),
                    vec!["cost", "tolerance", "maxIterations"],
                ))
            }
        }
        candidate.validate_parameters()?;
        *self = candidate;
        Ok(())
    }

    pub fn models(&self) -> &[LinearModel] {
        &self.models
    }
}

/// Dual coordinate descent for a binary L1-loss SVM with targets in {-1, +1}.
pub(crate) fn train_binary_svc(
    x: &[&FeatureVector],
    targets: &[f64],
    cost: f64,
    tolerance: f64,
    max_iterations: usize,
    num_features: usize,
    rng: &mut StdRng,
) -> LinearModel {
    let n = x.len();
    let mut model = LinearModel::zeros(num_features);
    let mut alpha = vec![0.0; n];
    // Diagonal of the kernel matrix, including the constant bias feature.
    let qd: Vec<f64> = x.iter().map(|xi| xi.squared_norm() + 1.0).collect();
    let mut order: Vec<usize> = (0..n).collect();

    let mut iteration = 0;
    while iteration < max_iterations {
        order.shuffle(rng);
        let mut max_pg = f64::NEG_INFINITY;
        let mut min_pg = f64::INFINITY;
        for &i in &order {
            let yi = targets[i];
            let g = yi * model.decision(x[i]) - 1.0;
            let pg = if alpha[i] == 0.0 {
                g.min(0.0)
            } else if alpha[i] == cost {
                g.max(0.0)
            } else {
                g
            };
            max_pg = max_pg.max(pg);
            min_pg = min_pg.min(pg);
            if pg.abs() > 1e-12 {
                let old = alpha[i];
                alpha[i] = (alpha[i] - g / qd[i]).clamp(0.0, cost);
                model.update(x[i], (alpha[i] - old) * yi);
            }
        }
        iteration += 1;
        if max_pg - min_pg <= tolerance {
            break;
        }
    }
    debug!("LinearSVC solver finished after {} iteration(s).", iteration);
    model
}

impl ScoringClassifier for LinearSVC {
    fn fit(
        &mut self,
        x: &[&FeatureVector],
        y: &[usize],
        n_classes: usize,
        num_features: usize,
        seed: u64,
    ) -> Result<(), ConformalError> {
        check_fit_input(x.len(), y.len())?;
        self.validate_parameters()?;
        if n_classes < 2 {
            return Err(ConformalError::InvalidParameter(
                "n_classes".to_string(),
                "at least 2".to_string(),
                n_classes.to_string(),
            ));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let positives: Vec<usize> = if n_classes == 2 { vec![1] } else { (0..n_classes).collect() };
        self.models = positives
            .into_iter()
            .map(|positive| {
                let targets: Vec<f64> = y.iter().map(|c| if *c == positive { 1.0 } else { -1.0 }).collect();
                train_binary_svc(
                    x,
                    &targets,
                    self.cost,
                    self.tolerance,
                    self.max_iterations,
                    num_features,
                    &mut rng,
                )
            })
            .collect();
        self.n_classes = n_classes;
        Ok(())
    }

    fn decision_values(&self, x: &FeatureVector) -> Result<Vec<f64>, ConformalError> {
        if !self.is_fitted() {
            return Err(ConformalError::NotTrained(self.name().to_string()));
        }
        if self.n_classes == 2 {
            let f = self.models[0].decision(x);
            Ok(vec![-f, f])
        } else {
            Ok(self.models.iter().map(|m| m.decision(x)).collect())
        }
    }

    fn is_fitted(&self) -> bool {
        !self.models.is_empty()
    }

    fn name(&self) -> &'static str {
        "LinearSVC"
    }
}
