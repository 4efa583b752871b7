//! Linear support vector regression.
//!
//! L2-regularized, L1-loss epsilon-insensitive SVR solved with dual
//! coordinate descent (Ho and Lin, 2012).
use crate::algorithm::linear::{iterations_from, validate_solver, LinearModel};
use crate::algorithm::{check_fit_input, unknown_parameter, ScoringRegressor};
use crate::constants::{DEFAULT_COST, DEFAULT_MAX_ITERATIONS, DEFAULT_SVR_EPSILON, DEFAULT_TOLERANCE};
use crate::data::FeatureVector;
use crate::errors::ConformalError;
use crate::utils::validate_float_parameter;
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

fn default_cost() -> f64 {
    DEFAULT_COST
}
fn default_svr_epsilon() -> f64 {
    DEFAULT_SVR_EPSILON
}
fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}
fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LinearSVR {
    #[serde(default = "default_cost")]
    pub cost: f64,
    /// Half width of the insensitive tube.
    #[serde(default = "default_svr_epsilon")]
    pub svr_epsilon: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    model: Option<LinearModel>,
}

impl Default for LinearSVR {
    fn default() -> Self {
        LinearSVR {
            cost: DEFAULT_COST,
            svr_epsilon: DEFAULT_SVR_EPSILON,
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            model: None,
        }
    }
}

impl LinearSVR {
    pub fn new(cost: f64, svr_epsilon: f64) -> Result<Self, ConformalError> {
        let svr = LinearSVR {
            cost,
            svr_epsilon,
            ..Default::default()
        };
        svr.validate_parameters()?;
        Ok(svr)
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
        validate_solver(self.cost, self.tolerance, self.max_iterations)?;
        validate_float_parameter(self.svr_epsilon, 0.0, f64::MAX, "svrEpsilon")
    }

    /// Set a named hyper-parameter. A rejected value leaves the model unchanged.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), ConformalError> {
        let mut candidate = self.clone();
        match name {
            "cost" => candidate.cost = value,
            "svrEpsilon" => candidate.svr_epsilon = value,
            "tolerance" => candidate.tolerance = value,
            "maxIterations" => candidate.max_iterations = iterations_from(value)?,
            _ => {
                return Err(unknown_parameter(
                    name,
                    self.name(),
                    vec!["cost", "svrEpsilon", "tolerance", "maxIterations"],
                ))
            }
        }
        candidate.validate_parameters()?;
        *self = candidate;
        Ok(())
    }

    pub fn model(&self) -> Option<&LinearModel> {
        self.model.as_ref()
    }
}

impl ScoringRegressor for LinearSVR {
    fn fit(&mut self, x: &[&FeatureVector], y: &[f64], num_features: usize, seed: u64) -> Result<(), ConformalError> {
        check_fit_input(x.len(), y.len())?;
        self.validate_parameters()?;
        let n = x.len();
        let (cost, eps) = (self.cost, self.svr_epsilon);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut model = LinearModel::zeros(num_features);
        let mut beta = vec![0.0; n];
        let qd: Vec<f64> = x.iter().map(|xi| xi.squared_norm() + 1.0).collect();
        let mut order: Vec<usize> = (0..n).collect();

        let mut iteration = 0;
        while iteration < self.max_iterations {
            order.shuffle(&mut rng);
            let mut max_violation: f64 = 0.0;
            for &i in &order {
                let g = model.decision(x[i]) - y[i];
                let h = qd[i];
                let gp = g + eps;
                let gn = g - eps;
                let d = if gp < h * beta[i] {
                    -gp / h
                } else if gn > h * beta[i] {
                    -gn / h
                } else {
                    -beta[i]
                };
                let updated = (beta[i] + d).clamp(-cost, cost);
                let d = updated - beta[i];
                if d.abs() > 1e-12 {
                    beta[i] = updated;
                    model.update(x[i], d);
                }
                max_violation = max_violation.max(d.abs() * h);
            }
            iteration += 1;
            if max_violation <= self.tolerance {
                break;
            }
        }
        debug!("LinearSVR solver finished after {} iteration(s).", iteration);
        self.model = Some(model);
        Ok(())
    }

    fn predict(&self, x: &FeatureVector) -> Result<f64, ConformalError> {
        self.model
            .as_ref()
            .map(|m| m.decision(x))
            .ok_or_else(|| ConformalError::NotTrained(self.name().to_string()))
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    fn name(&self) -> &'static str {
        "LinearSVR"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_svr_fits_line() {
        let x: Vec<FeatureVector> = (0..50).map(|i| FeatureVector::dense(vec![i as f64 / 25.0 - 1.0])).collect();
        let y: Vec<f64> = x.iter().map(|xi| 2.0 * xi.get(0) + 0.5).collect();
        let refs: Vec<&FeatureVector> = x.iter().collect();
        let mut svr = LinearSVR::new(10.0, 0.01).unwrap().set_tolerance(0.001);
        svr.fit(&refs, &y, 1, 0).unwrap();
        for (xi, yi) in x.iter().zip(&y) {
            let p = svr.predict(xi).unwrap();
            assert!((p - yi).abs() < 0.15, "prediction {} too far from {}", p, yi);
        }
    }

    #[test]
    fn test_linear_svr_not_fitted() {
        let svr = LinearSVR::default();
        assert!(matches!(
            svr.predict(&FeatureVector::dense(vec![1.0])),
            Err(ConformalError::NotTrained(_))
        ));
        assert!(LinearSVR::new(1.0, -0.5).is_err());
    }

    #[test]
    fn test_linear_svr_rejected_parameter_is_not_kept() {
        let mut svr = LinearSVR::new(2.0, 0.1).unwrap();
        svr.set_parameter("svrEpsilon", 0.2).unwrap();
        assert_eq!(svr.svr_epsilon, 0.2);
        assert!(svr.set_parameter("cost", -1.0).is_err());
        assert_eq!(svr.cost, 2.0);
        assert!(svr.set_parameter("svrEpsilon", -0.5).is_err());
        assert_eq!(svr.svr_epsilon, 0.2);
        assert!(svr.set_parameter("maxIterations", 0.0).is_err());
        assert_eq!(svr.max_iterations, DEFAULT_MAX_ITERATIONS);
    }
}
