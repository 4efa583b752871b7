//! Transform
//!
//! Feature transformations fitted on one dataset and applied to others.
//!
//! Scalers store their output densely and let features unseen at fit time
//! pass through unchanged. Selectors keep a subset of the fitted features
//! and renumber them from zero, dropping everything else. Transformations
//! are applied in sequence with a [`TransformerChain`].
use crate::algorithm::{LinearSVR, ScoringRegressor};
use crate::data::{Dataset, FeatureVector, Record};
use crate::errors::ConformalError;
use crate::utils::sort_scores;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// A transformation with parameters learned from data.
pub trait Transformer {
    /// Learn the parameters from `data`. Fails for an empty dataset.
    fn fit(&mut self, data: &Dataset) -> Result<(), ConformalError>;

    /// Apply the learned parameters to a single feature vector.
    fn transform_features(&self, x: &FeatureVector) -> Result<FeatureVector, ConformalError>;

    /// A new dataset with every record transformed; labels are kept.
    fn transform(&self, data: &Dataset) -> Result<Dataset, ConformalError> {
        data.records()
            .iter()
            .map(|r| Ok(Record::new(self.transform_features(r.features())?, r.label())))
            .collect()
    }

    fn fit_transform(&mut self, data: &Dataset) -> Result<Dataset, ConformalError> {
        self.fit(data)?;
        self.transform(data)
    }
}

/// Values of every feature column, implicit sparse zeros included.
fn column_values(data: &Dataset) -> Result<Vec<Vec<f64>>, ConformalError> {
    if data.is_empty() {
        return Err(ConformalError::EmptyDataset);
    }
    let n = data.num_features();
    let mut columns = vec![vec![0.0; data.len()]; n];
    for (row, record) in data.records().iter().enumerate() {
        for (i, v) in record.features().iter() {
            if let Some(column) = columns.get_mut(i) {
                column[row] = v;
            }
        }
    }
    Ok(columns)
}

/// Map every fitted feature with `f(index, value)`, densely.
fn map_fitted<F>(x: &FeatureVector, num_fitted: usize, f: F) -> FeatureVector
where
    F: Fn(usize, f64) -> f64,
{
    let values = x
        .to_dense(num_fitted)
        .iter()
        .map(|(i, v)| if i < num_fitted { f(i, v) } else { v })
        .collect();
    FeatureVector::dense(values)
}

/// Zero mean and unit variance per feature.
///
/// Columns without variance are only centered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    means: Option<Vec<f64>>,
    std_devs: Vec<f64>,
}

impl Standardizer {
    pub fn new() -> Self {
        Standardizer::default()
    }

    pub fn means(&self) -> Option<&[f64]> {
        self.means.as_deref()
    }

    pub fn std_devs(&self) -> &[f64] {
        &self.std_devs
    }
}

impl Transformer for Standardizer {
    fn fit(&mut self, data: &Dataset) -> Result<(), ConformalError> {
        let columns = column_values(data)?;
        let n = data.len() as f64;
        let means: Vec<f64> = columns.iter().map(|c| c.iter().sum::<f64>() / n).collect();
        self.std_devs = columns
            .iter()
            .zip(&means)
            .map(|(c, m)| (c.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n).sqrt())
            .collect();
        debug!("Fitted standardizer on {} feature(s).", means.len());
        self.means = Some(means);
        Ok(())
    }

    fn transform_features(&self, x: &FeatureVector) -> Result<FeatureVector, ConformalError> {
        let means = self
            .means
            .as_ref()
            .ok_or_else(|| ConformalError::NotTrained("Standardizer".to_string()))?;
        Ok(map_fitted(x, means.len(), |i, v| {
            let centered = v - means[i];
            if self.std_devs[i] > 0.0 {
                centered / self.std_devs[i]
            } else {
                centered
            }
        }))
    }
}

/// Scale every feature to `[0, 1]` over the fitted range.
///
/// Constant columns map to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    ranges: Option<Vec<(f64, f64)>>,
}

impl MinMaxScaler {
    pub fn new() -> Self {
        MinMaxScaler::default()
    }

    /// Fitted `(min, max)` per feature.
    pub fn ranges(&self) -> Option<&[(f64, f64)]> {
        self.ranges.as_deref()
    }
}

impl Transformer for MinMaxScaler {
    fn fit(&mut self, data: &Dataset) -> Result<(), ConformalError> {
        let columns = column_values(data)?;
        let ranges: Vec<(f64, f64)> = columns
            .iter()
            .map(|c| {
                c.iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
            })
            .collect();
        debug!("Fitted min-max scaler on {} feature(s).", ranges.len());
        self.ranges = Some(ranges);
        Ok(())
    }

    fn transform_features(&self, x: &FeatureVector) -> Result<FeatureVector, ConformalError> {
        let ranges = self
            .ranges
            .as_ref()
            .ok_or_else(|| ConformalError::NotTrained("MinMaxScaler".to_string()))?;
        Ok(map_fitted(x, ranges.len(), |i, v| {
            let (lo, hi) = ranges[i];
            if hi > lo {
                (v - lo) / (hi - lo)
            } else {
                0.0
            }
        }))
    }
}

/// Linearly interpolated quantile of an ascending slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = (sorted.len() - 1) as f64 * q;
    let lower = pos.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let frac = pos - lower as f64;
    sorted[lower] * (1.0 - frac) + sorted[upper] * frac
}

/// Keep the features at the sorted indices `kept`, renumbered from zero.
fn select_features(x: &FeatureVector, kept: &[usize]) -> FeatureVector {
    match x {
        FeatureVector::Sparse(e) => FeatureVector::sparse(
            e.iter()
                .filter_map(|(i, v)| kept.binary_search(i).ok().map(|j| (j, *v)))
                .collect(),
        ),
        FeatureVector::Dense(v) => {
            FeatureVector::dense(kept.iter().map(|i| v.get(*i).copied().unwrap_or(0.0)).collect())
        }
    }
}

/// Center on the median and scale by the interquartile range per feature.
///
/// Less sensitive to outliers than [`Standardizer`]. Columns with a zero
/// interquartile range are only centered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RobustScaler {
    medians: Option<Vec<f64>>,
    iqrs: Vec<f64>,
}

impl RobustScaler {
    pub fn new() -> Self {
        RobustScaler::default()
    }

    pub fn medians(&self) -> Option<&[f64]> {
        self.medians.as_deref()
    }

    pub fn iqrs(&self) -> &[f64] {
        &self.iqrs
    }
}

impl Transformer for RobustScaler {
    fn fit(&mut self, data: &Dataset) -> Result<(), ConformalError> {
        let mut columns = column_values(data)?;
        let mut medians = Vec::with_capacity(columns.len());
        self.iqrs = Vec::with_capacity(columns.len());
        for column in columns.iter_mut() {
            sort_scores(column);
            medians.push(quantile(column, 0.5));
            self.iqrs.push(quantile(column, 0.75) - quantile(column, 0.25));
        }
        debug!("Fitted robust scaler on {} feature(s).", medians.len());
        self.medians = Some(medians);
        Ok(())
    }

    fn transform_features(&self, x: &FeatureVector) -> Result<FeatureVector, ConformalError> {
        let medians = self
            .medians
            .as_ref()
            .ok_or_else(|| ConformalError::NotTrained("RobustScaler".to_string()))?;
        Ok(map_fitted(x, medians.len(), |i, v| {
            let centered = v - medians[i];
            if self.iqrs[i] > 0.0 {
                centered / self.iqrs[i]
            } else {
                centered
            }
        }))
    }
}

/// Store every feature vector densely with the fitted width.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MakeDense {
    num_features: Option<usize>,
}

impl MakeDense {
    pub fn new() -> Self {
        MakeDense::default()
    }
}

impl Transformer for MakeDense {
    fn fit(&mut self, data: &Dataset) -> Result<(), ConformalError> {
        if data.is_empty() {
            return Err(ConformalError::EmptyDataset);
        }
        self.num_features = Some(data.num_features());
        Ok(())
    }

    fn transform_features(&self, x: &FeatureVector) -> Result<FeatureVector, ConformalError> {
        let n = self
            .num_features
            .ok_or_else(|| ConformalError::NotTrained("MakeDense".to_string()))?;
        Ok(x.to_dense(n))
    }
}

/// Drop every feature holding a missing (NaN) or infinite value in the fitted data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DropMissingData {
    kept: Option<Vec<usize>>,
}

impl DropMissingData {
    pub fn new() -> Self {
        DropMissingData::default()
    }

    /// Original indices of the kept features, in their new order.
    pub fn selected(&self) -> Option<&[usize]> {
        self.kept.as_deref()
    }
}

impl Transformer for DropMissingData {
    fn fit(&mut self, data: &Dataset) -> Result<(), ConformalError> {
        let columns = column_values(data)?;
        let kept: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.iter().all(|v| v.is_finite()))
            .map(|(j, _)| j)
            .collect();
        info!(
            "Dropped {} of {} feature(s) with missing values.",
            columns.len() - kept.len(),
            columns.len()
        );
        self.kept = Some(kept);
        Ok(())
    }

    fn transform_features(&self, x: &FeatureVector) -> Result<FeatureVector, ConformalError> {
        let kept = self
            .kept
            .as_ref()
            .ok_or_else(|| ConformalError::NotTrained("DropMissingData".to_string()))?;
        Ok(select_features(x, kept))
    }
}

/// Keep the features carrying the largest weights of a linear SVR fitted on the labels.
///
/// A feature is kept when its absolute weight exceeds `min_weight`; with
/// `max_features` set only that many of the heaviest are kept. Weights are
/// only comparable across features of similar scale, so scale first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvrWeightSelector {
    pub regressor: LinearSVR,
    pub min_weight: f64,
    pub max_features: Option<usize>,
    pub seed: u64,
    kept: Option<Vec<usize>>,
}

impl Default for SvrWeightSelector {
    fn default() -> Self {
        SvrWeightSelector {
            regressor: LinearSVR::default(),
            min_weight: 0.0,
            max_features: None,
            seed: 0,
            kept: None,
        }
    }
}

impl SvrWeightSelector {
    pub fn new() -> Self {
        SvrWeightSelector::default()
    }

    pub fn set_min_weight(mut self, min_weight: f64) -> Self {
        self.min_weight = min_weight;
        self
    }

    pub fn set_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn set_regressor(mut self, regressor: LinearSVR) -> Self {
        self.regressor = regressor;
        self
    }

    /// Original indices of the kept features, in their new order.
    pub fn selected(&self) -> Option<&[usize]> {
        self.kept.as_deref()
    }
}

impl Transformer for SvrWeightSelector {
    fn fit(&mut self, data: &Dataset) -> Result<(), ConformalError> {
        if data.is_empty() {
            return Err(ConformalError::EmptyDataset);
        }
        let features: Vec<&FeatureVector> = data.records().iter().map(|r| r.features()).collect();
        let num_features = data.num_features();
        let mut regressor = self.regressor.clone();
        regressor.fit(&features, &data.labels(), num_features, self.seed)?;
        let weights = regressor
            .model()
            .map(|m| m.weights.clone())
            .ok_or_else(|| ConformalError::NotTrained(regressor.name().to_string()))?;

        let mut ranked: Vec<(usize, f64)> = weights
            .iter()
            .enumerate()
            .map(|(j, w)| (j, w.abs()))
            .filter(|(_, w)| *w > self.min_weight)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        if let Some(max) = self.max_features {
            ranked.truncate(max);
        }
        let mut kept: Vec<usize> = ranked.into_iter().map(|(j, _)| j).collect();
        kept.sort_unstable();
        info!("Kept {} of {} feature(s) by SVR weight.", kept.len(), num_features);
        self.kept = Some(kept);
        Ok(())
    }

    fn transform_features(&self, x: &FeatureVector) -> Result<FeatureVector, ConformalError> {
        let kept = self
            .kept
            .as_ref()
            .ok_or_else(|| ConformalError::NotTrained("SvrWeightSelector".to_string()))?;
        Ok(select_features(x, kept))
    }
}

/// Any of the available transformations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Transformation {
    Standardizer(Standardizer),
    MinMaxScaler(MinMaxScaler),
    RobustScaler(RobustScaler),
    MakeDense(MakeDense),
    DropMissingData(DropMissingData),
    SvrWeightSelector(SvrWeightSelector),
}

impl Transformer for Transformation {
    fn fit(&mut self, data: &Dataset) -> Result<(), ConformalError> {
        match self {
            Transformation::Standardizer(t) => t.fit(data),
            Transformation::MinMaxScaler(t) => t.fit(data),
            Transformation::RobustScaler(t) => t.fit(data),
            Transformation::MakeDense(t) => t.fit(data),
            Transformation::DropMissingData(t) => t.fit(data),
            Transformation::SvrWeightSelector(t) => t.fit(data),
        }
    }

    fn transform_features(&self, x: &FeatureVector) -> Result<FeatureVector, ConformalError> {
        match self {
            Transformation::Standardizer(t) => t.transform_features(x),
            Transformation::MinMaxScaler(t) => t.transform_features(x),
            Transformation::RobustScaler(t) => t.transform_features(x),
            Transformation::MakeDense(t) => t.transform_features(x),
            Transformation::DropMissingData(t) => t.transform_features(x),
            Transformation::SvrWeightSelector(t) => t.transform_features(x),
        }
    }
}

macro_rules! impl_from_transformer {
    ($($t:ident),*) => {
        $(
            impl From<$t> for Transformation {
                fn from(t: $t) -> Self {
                    Transformation::$t(t)
                }
            }
        )*
    };
}

impl_from_transformer!(Standardizer, MinMaxScaler, RobustScaler, MakeDense, DropMissingData, SvrWeightSelector);

/// Transformations applied one after the other.
///
/// Every step is fitted on the output of the steps before it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformerChain {
    steps: Vec<Transformation>,
}

impl TransformerChain {
    pub fn new(steps: Vec<Transformation>) -> Self {
        TransformerChain { steps }
    }

    pub fn push<T: Into<Transformation>>(mut self, step: T) -> Self {
        self.steps.push(step.into());
        self
    }

    pub fn steps(&self) -> &[Transformation] {
        &self.steps
    }
}

impl Transformer for TransformerChain {
    fn fit(&mut self, data: &Dataset) -> Result<(), ConformalError> {
        if data.is_empty() {
            return Err(ConformalError::EmptyDataset);
        }
        let mut current = data.clone();
        for step in self.steps.iter_mut() {
            current = step.fit_transform(&current)?;
        }
        debug!("Fitted {} transformation(s).", self.steps.len());
        Ok(())
    }

    fn transform_features(&self, x: &FeatureVector) -> Result<FeatureVector, ConformalError> {
        self.steps
            .iter()
            .try_fold(x.clone(), |acc, step| step.transform_features(&acc))
    }
}
