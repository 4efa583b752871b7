use crate::constants::RANK_EPS;
use crate::errors::ConformalError;
use std::cmp::Ordering;

/// Create a string of all available items.
pub fn items_to_strings(items: Vec<&str>) -> String {
    let mut s = String::new();
    for i in items {
        s.push_str(i);
        s.push_str(&String::from(", "));
    }
    s
}

// Validation
pub fn validate_positive_float_parameter(value: f64, parameter: &str) -> Result<(), ConformalError> {
    validate_float_parameter(value, 0.0, f64::INFINITY, parameter)
}

pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), ConformalError> {
    if value.is_nan() || value < min || max < value {
        let ex_msg = format!("real value within range {} and {}", min, max);
        Err(ConformalError::InvalidParameter(
            parameter.to_string(),
            ex_msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_count_parameter(value: usize, min: usize, parameter: &str) -> Result<(), ConformalError> {
    if value < min {
        Err(ConformalError::InvalidParameter(
            parameter.to_string(),
            format!("an integer of at least {}", min),
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Total order on floats, NaN sorted last.
#[inline]
pub fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    a.total_cmp(b)
}

/// Sort a vector of scores ascending, in place.
pub fn sort_scores(v: &mut [f64]) {
    v.sort_unstable_by(cmp_f64);
}

/// Number of values in a sorted (ascending) slice that are `>= value`.
#[inline]
pub fn count_at_least(sorted: &[f64], value: f64) -> usize {
    sorted.len() - sorted.partition_point(|v| *v < value)
}

/// Conformal p-value of a score against sorted calibration scores.
///
/// `(#{calibration >= score} + 1) / (#calibration + 1)`
#[inline]
pub fn conformal_p_value(sorted: &[f64], score: f64) -> f64 {
    (count_at_least(sorted, score) as f64 + 1.0) / (sorted.len() as f64 + 1.0)
}

/// The calibration score bounding a region of the given confidence.
///
/// Returns the `ceil((n + 1) * confidence)`-th smallest score, `0` for
/// a rank of zero and infinity when the rank exceeds the number of scores.
/// The result is non-decreasing in `confidence`.
pub fn conformal_quantile(sorted: &[f64], confidence: f64) -> f64 {
    let n = sorted.len();
    let rank = ((n as f64 + 1.0) * confidence - RANK_EPS).ceil().max(0.0) as usize;
    if rank == 0 {
        0.0
    } else if rank > n {
        f64::INFINITY
    } else {
        sorted[rank - 1]
    }
}

pub fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        return f64::NAN;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

pub fn median(v: &[f64]) -> f64 {
    if v.is_empty() {
        return f64::NAN;
    }
    let mut sorted = v.to_vec();
    sort_scores(&mut sorted);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        let (a, b) = (sorted[mid - 1], sorted[mid]);
        // Keep infinite bounds infinite instead of producing NaN.
        if a == b {
            a
        } else {
            (a + b) / 2.0
        }
    } else {
        sorted[mid]
    }
}

pub fn geometric_mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        return f64::NAN;
    }
    (v.iter().map(|x| x.ln()).sum::<f64>() / v.len() as f64).exp()
}

/// Check that a label is an integral class value.
pub fn class_label(label: f64) -> Result<i64, ConformalError> {
    if label.is_finite() && label.fract() == 0.0 && label.abs() < i64::MAX as f64 {
        Ok(label as i64)
    } else {
        Err(ConformalError::InvalidLabel(label))
    }
}

pub fn precision_round(n: f64, precision: i32) -> f64 {
    let p = (10.0_f64).powi(precision);
    (n * p).round() / p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_p_value() {
        let cal = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(conformal_p_value(&cal, 0.25), 3.0 / 5.0);
        assert_eq!(conformal_p_value(&cal, 0.3), 3.0 / 5.0);
        assert_eq!(conformal_p_value(&cal, 1.0), 1.0 / 5.0);
        assert_eq!(conformal_p_value(&cal, -1.0), 1.0);
        assert_eq!(conformal_p_value(&[], 0.5), 1.0);
    }

    #[test]
    fn test_conformal_quantile() {
        let cal: Vec<f64> = (1..=9).map(|v| v as f64).collect();
        // (9 + 1) * 0.8 = 8
        assert_eq!(conformal_quantile(&cal, 0.8), 8.0);
        assert_eq!(conformal_quantile(&cal, 0.0), 0.0);
        assert_eq!(conformal_quantile(&cal, 0.95), f64::INFINITY);
        let mut last = 0.0;
        for c in 0..=100 {
            let q = conformal_quantile(&cal, c as f64 / 100.0);
            assert!(q >= last);
            last = q;
        }
    }

    #[test]
    fn test_median_and_mean() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&[f64::INFINITY, f64::INFINITY]), f64::INFINITY);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_class_label() {
        assert_eq!(class_label(1.0).unwrap(), 1);
        assert_eq!(class_label(-1.0).unwrap(), -1);
        assert!(class_label(0.5).is_err());
        assert!(class_label(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_float_parameter() {
        assert!(validate_float_parameter(0.5, 0.0, 1.0, "ratio").is_ok());
        assert!(validate_float_parameter(1.5, 0.0, 1.0, "ratio").is_err());
        assert!(validate_positive_float_parameter(f64::NAN, "cost").is_err());
    }
}
