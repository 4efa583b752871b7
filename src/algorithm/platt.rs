//! Platt scaled support vector classification.
//!
//! Fits a sigmoid `1 / (1 + exp(A f + B))` to the decision values `f` of a
//! [`LinearSVC`], using the regularized targets and Newton method with
//! backtracking of Platt (1999) as refined by Lin, Lin and Weng (2007).
use crate::algorithm::svc::LinearSVC;
use crate::algorithm::ScoringClassifier;
use crate::constants::{PLATT_EPS, PLATT_MAX_ITERATIONS, PLATT_MIN_STEP, PLATT_SIGMA};
use crate::data::FeatureVector;
use crate::errors::ConformalError;
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PlattScaledSVC {
    pub svc: LinearSVC,
    /// `(A, B)` per one-vs-rest model.
    #[serde(default)]
    sigmoids: Vec<(f64, f64)>,
}

impl PlattScaledSVC {
    pub fn new(svc: LinearSVC) -> Self {
        PlattScaledSVC {
            svc,
            sigmoids: Vec::new(),
        }
    }

    pub fn sigmoids(&self) -> &[(f64, f64)] {
        &self.sigmoids
    }
}

#[inline]
fn sigmoid_predict(f: f64, a: f64, b: f64) -> f64 {
    let fapb = f * a + b;
    // Rearranged to avoid overflow in exp.
    if fapb >= 0.0 {
        (-fapb).exp() / (1.0 + (-fapb).exp())
    } else {
        1.0 / (1.0 + fapb.exp())
    }
}

fn sigmoid_objective(dec: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
    dec.iter()
        .zip(targets)
        .map(|(f, t)| {
            let fapb = f * a + b;
            if fapb >= 0.0 {
                t * fapb + (1.0 + (-fapb).exp()).ln()
            } else {
                (t - 1.0) * fapb + (1.0 + fapb.exp()).ln()
            }
        })
        .sum()
}

/// Fit sigmoid parameters `(A, B)` for decision values and positive flags.
pub(crate) fn sigmoid_train(dec: &[f64], positive: &[bool]) -> (f64, f64) {
    let prior1 = positive.iter().filter(|p| **p).count() as f64;
    let prior0 = positive.len() as f64 - prior1;
    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = positive.iter().map(|p| if *p { hi_target } else { lo_target }).collect();

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = sigmoid_objective(dec, &targets, a, b);

    for iteration in 0..PLATT_MAX_ITERATIONS {
        let (mut h11, mut h22, mut h21) = (PLATT_SIGMA, PLATT_SIGMA, 0.0);
        let (mut g1, mut g2) = (0.0, 0.0);
        for (f, t) in dec.iter().zip(&targets) {
            let fapb = f * a + b;
            let (p, q) = if fapb >= 0.0 {
                let e = (-fapb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = fapb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = t - p;
            g1 += f * d1;
            g2 += d1;
        }
        if g1.abs() < PLATT_EPS && g2.abs() < PLATT_EPS {
            break;
        }
        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= PLATT_MIN_STEP {
            let (new_a, new_b) = (a + step * da, b + step * db);
            let new_f = sigmoid_objective(dec, &targets, new_a, new_b);
            if new_f < fval + 0.0001 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }
        if step < PLATT_MIN_STEP {
            warn!("Platt scaling line search failed at iteration {}.", iteration);
            break;
        }
    }
    (a, b)
}

impl ScoringClassifier for PlattScaledSVC {
    fn fit(
        &mut self,
        x: &[&FeatureVector],
        y: &[usize],
        n_classes: usize,
        num_features: usize,
        seed: u64,
    ) -> Result<(), ConformalError> {
        self.svc.fit(x, y, n_classes, num_features, seed)?;
        let decisions = x
            .iter()
            .map(|xi| self.svc.decision_values(xi))
            .collect::<Result<Vec<_>, _>>()?;
        let positives: Vec<usize> = if n_classes == 2 { vec![1] } else { (0..n_classes).collect() };
        self.sigmoids = positives
            .into_iter()
            .map(|c| {
                let dec: Vec<f64> = decisions.iter().map(|d| d[c]).collect();
                let positive: Vec<bool> = y.iter().map(|yi| *yi == c).collect();
                sigmoid_train(&dec, &positive)
            })
            .collect();
        Ok(())
    }

    fn decision_values(&self, x: &FeatureVector) -> Result<Vec<f64>, ConformalError> {
        self.svc.decision_values(x)
    }

    fn supports_probability(&self) -> bool {
        true
    }

    fn probabilities(&self, x: &FeatureVector) -> Result<Vec<f64>, ConformalError> {
        if !self.is_fitted() {
            return Err(ConformalError::NotTrained(self.name().to_string()));
        }
        let dv = self.svc.decision_values(x)?;
        if dv.len() == 2 {
            let (a, b) = self.sigmoids[0];
            let p = sigmoid_predict(dv[1], a, b);
            return Ok(vec![1.0 - p, p]);
        }
        let raw: Vec<f64> = dv
            .iter()
            .zip(&self.sigmoids)
            .map(|(f, (a, b))| sigmoid_predict(*f, *a, *b))
            .collect();
        let total: f64 = raw.iter().sum();
        if total > 0.0 {
            Ok(raw.iter().map(|p| p / total).collect())
        } else {
            Ok(vec![1.0 / raw.len() as f64; raw.len()])
        }
    }

    fn is_fitted(&self) -> bool {
        self.svc.is_fitted() && !self.sigmoids.is_empty()
    }

    fn name(&self) -> &'static str {
        "PlattScaledSVC"
    }
}
