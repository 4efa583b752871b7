use crate::utils::cmp_f64;
use serde::{Deserialize, Serialize};

/// A non-decreasing step function fitted by isotonic regression.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct IsotonicCalibrator {
    /// Largest input of each block, increasing.
    pub thresholds: Vec<f64>,
    /// Fitted value of each block, non-decreasing.
    pub values: Vec<f64>,
}

impl IsotonicCalibrator {
    /// Fit `(input, target)` pairs.
    ///
    /// Pairs sharing an input are pooled into one weighted point before the
    /// pool adjacent violators pass, so equal inputs always get equal values.
    pub fn new(points: &[(f64, f64)]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let mut data = points.to_vec();
        data.sort_by(|a, b| cmp_f64(&a.0, &b.0));

        // (input, sum of targets, weight)
        let mut groups: Vec<(f64, f64, f64)> = Vec::with_capacity(data.len());
        for (x, y) in data {
            match groups.last_mut() {
                Some(last) if last.0 == x => {
                    last.1 += y;
                    last.2 += 1.0;
                }
                _ => groups.push((x, y, 1.0)),
            }
        }

        // Stack of blocks: (sum_y, weight, last input)
        let mut blocks: Vec<(f64, f64, f64)> = Vec::with_capacity(groups.len());
        for (x, sum_y, weight) in groups {
            let mut current_sum_y = sum_y;
            let mut current_weight = weight;
            // Merge down
            while let Some((prev_sum_y, prev_weight, _)) = blocks.last() {
                if prev_sum_y / prev_weight > current_sum_y / current_weight {
                    current_sum_y += *prev_sum_y;
                    current_weight += *prev_weight;
                    blocks.pop();
                } else {
                    break;
                }
            }
            blocks.push((current_sum_y, current_weight, x));
        }

        let (thresholds, values) = blocks.into_iter().map(|(s, w, x)| (x, s / w)).unzip();
        IsotonicCalibrator { thresholds, values }
    }

    /// Value of the block holding `x`, constant beyond the fitted range.
    pub fn value_at(&self, x: f64) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }
        let idx = self.thresholds.partition_point(|t| *t < x).min(self.values.len() - 1);
        self.values[idx]
    }

    pub fn transform(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|v| self.value_at(*v)).collect()
    }
}
