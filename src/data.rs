//! Data
//!
//! Records, datasets and the LIBSVM text format used to load them.
//! Every dataset operation that reorders or partitions records returns new
//! `Dataset` instances and leaves the original untouched.
use crate::errors::ConformalError;
use crate::utils::class_label;
use log::warn;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Numeric attributes of a single record.
///
/// Sparse vectors keep their entries sorted by index with unique indices.
/// Deserialized sparse vectors are normalized the way [`FeatureVector::sparse`]
/// does it; the queries below also tolerate entries built by hand out of order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFeatureVector")]
pub enum FeatureVector {
    /// `(index, value)` pairs, sorted by index.
    Sparse(Vec<(usize, f64)>),
    /// One value per feature index, starting at zero.
    Dense(Vec<f64>),
}

#[derive(Deserialize)]
enum RawFeatureVector {
    Sparse(Vec<(usize, f64)>),
    Dense(Vec<f64>),
}

impl From<RawFeatureVector> for FeatureVector {
    fn from(raw: RawFeatureVector) -> Self {
        match raw {
            RawFeatureVector::Sparse(e) => FeatureVector::sparse(e),
            RawFeatureVector::Dense(v) => FeatureVector::Dense(v),
        }
    }
}

/// Iterator over the `(index, value)` pairs of a [`FeatureVector`].
pub enum FeatureIter<'a> {
    Sparse(std::slice::Iter<'a, (usize, f64)>),
    Dense(std::iter::Enumerate<std::slice::Iter<'a, f64>>),
}

impl Iterator for FeatureIter<'_> {
    type Item = (usize, f64);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            FeatureIter::Sparse(it) => it.next().copied(),
            FeatureIter::Dense(it) => it.next().map(|(i, v)| (i, *v)),
        }
    }
}

impl FeatureVector {
    /// Create a sparse vector, sorting the entries. For duplicated indices the last value wins.
    pub fn sparse(mut entries: Vec<(usize, f64)>) -> Self {
        entries.sort_by_key(|(i, _)| *i);
        let mut unique: Vec<(usize, f64)> = Vec::with_capacity(entries.len());
        for (i, v) in entries {
            match unique.last_mut() {
                Some(last) if last.0 == i => last.1 = v,
                _ => unique.push((i, v)),
            }
        }
        FeatureVector::Sparse(unique)
    }

    pub fn dense(values: Vec<f64>) -> Self {
        FeatureVector::Dense(values)
    }

    /// Parse a whitespace separated list of `index:value` tokens.
    ///
    /// ```
    /// use conformist::data::FeatureVector;
    /// let v = FeatureVector::parse_sparse("1:0.44 3:0.88 5:1.32").unwrap();
    /// assert_eq!(v.get(3), 0.88);
    /// ```
    pub fn parse_sparse(s: &str) -> Result<Self, ConformalError> {
        parse_sparse_tokens(s.split_whitespace()).map_err(|reason| ConformalError::MalformedRecord { line: 1, reason })
    }

    pub fn iter(&self) -> FeatureIter<'_> {
        match self {
            FeatureVector::Sparse(e) => FeatureIter::Sparse(e.iter()),
            FeatureVector::Dense(v) => FeatureIter::Dense(v.iter().enumerate()),
        }
    }

    /// Value at `index`, zero when absent. For duplicated sparse indices the last value wins.
    pub fn get(&self, index: usize) -> f64 {
        match self {
            FeatureVector::Sparse(e) => e.iter().rev().find(|(i, _)| *i == index).map_or(0.0, |(_, v)| *v),
            FeatureVector::Dense(v) => v.get(index).copied().unwrap_or(0.0),
        }
    }

    /// Largest index carrying a value, `None` for an empty vector.
    pub fn max_index(&self) -> Option<usize> {
        match self {
            FeatureVector::Sparse(e) => e.iter().map(|(i, _)| *i).max(),
            FeatureVector::Dense(v) => v.len().checked_sub(1),
        }
    }

    /// Dot product with a weight vector. Indices beyond the weights contribute nothing.
    #[inline]
    pub fn dot(&self, w: &[f64]) -> f64 {
        match self {
            FeatureVector::Sparse(e) => e.iter().filter(|(i, _)| *i < w.len()).map(|(i, v)| w[*i] * v).sum(),
            FeatureVector::Dense(v) => v.iter().zip(w).map(|(a, b)| a * b).sum(),
        }
    }

    #[inline]
    pub fn squared_norm(&self) -> f64 {
        self.iter().map(|(_, v)| v * v).sum()
    }

    /// `w += scale * self`, ignoring indices beyond `w`.
    #[inline]
    pub fn add_scaled_to(&self, scale: f64, w: &mut [f64]) {
        for (i, v) in self.iter() {
            if let Some(wi) = w.get_mut(i) {
                *wi += scale * v;
            }
        }
    }

    /// Dense copy at least `num_features` wide, wider when the vector uses larger indices.
    pub fn to_dense(&self, num_features: usize) -> FeatureVector {
        let mut values = vec![0.0; num_features.max(self.max_index().map_or(0, |m| m + 1))];
        for (i, v) in self.iter() {
            if let Some(slot) = values.get_mut(i) {
                *slot = v;
            }
        }
        FeatureVector::Dense(values)
    }

    pub fn to_sparse(&self) -> FeatureVector {
        FeatureVector::sparse(self.iter().filter(|(_, v)| *v != 0.0).collect())
    }

    pub fn is_dense(&self) -> bool {
        matches!(self, FeatureVector::Dense(_))
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        FeatureVector::Dense(values)
    }
}

/// A feature vector and its label (class value or real valued target).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    features: FeatureVector,
    label: f64,
}

impl Record {
    pub fn new(features: FeatureVector, label: f64) -> Self {
        Record { features, label }
    }

    pub fn features(&self) -> &FeatureVector {
        &self.features
    }

    pub fn label(&self) -> f64 {
        self.label
    }
}

/// An ordered collection of records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    records: Vec<Record>,
}

impl FromIterator<Record> for Dataset {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Dataset {
            records: iter.into_iter().collect(),
        }
    }
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Dataset { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of feature dimensions, the largest index in use plus one.
    pub fn num_features(&self) -> usize {
        self.records
            .iter()
            .filter_map(|r| r.features.max_index())
            .max()
            .map_or(0, |m| m + 1)
    }

    pub fn labels(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.label).collect()
    }

    /// Sorted distinct class labels, failing for non integral labels.
    pub fn class_labels(&self) -> Result<Vec<i64>, ConformalError> {
        let mut labels = self
            .records
            .iter()
            .map(|r| class_label(r.label))
            .collect::<Result<Vec<_>, _>>()?;
        labels.sort_unstable();
        labels.dedup();
        Ok(labels)
    }

    /// Smallest and largest label, `None` when empty.
    pub fn label_range(&self) -> Option<(f64, f64)> {
        let mut it = self.records.iter().map(|r| r.label);
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// A new dataset with the records in random order.
    pub fn shuffled(&self, seed: u64) -> Dataset {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut records = self.records.clone();
        records.shuffle(&mut rng);
        Dataset { records }
    }

    /// Split at `index`; the first part holds records `[0, index)`.
    pub fn split_static(&self, index: usize) -> (Dataset, Dataset) {
        let index = index.min(self.records.len());
        (
            Dataset::new(self.records[..index].to_vec()),
            Dataset::new(self.records[index..].to_vec()),
        )
    }

    /// Split so that the first part holds `fraction` of the records (rounded down).
    pub fn split_static_fraction(&self, fraction: f64) -> Result<(Dataset, Dataset), ConformalError> {
        crate::utils::validate_float_parameter(fraction, 0.0, 1.0, "fraction")?;
        Ok(self.split_static((self.records.len() as f64 * fraction).floor() as usize))
    }

    /// Random split, the first part holds `fraction` of the records (rounded down).
    pub fn split_random(&self, fraction: f64, seed: u64) -> Result<(Dataset, Dataset), ConformalError> {
        crate::utils::validate_float_parameter(fraction, 0.0, 1.0, "fraction")?;
        Ok(self
            .shuffled(seed)
            .split_static((self.records.len() as f64 * fraction).floor() as usize))
    }

    /// A new dataset with the records at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        indices.iter().map(|i| self.records[*i].clone()).collect()
    }

    /// A new dataset with the records of `self` followed by those of `other`.
    pub fn join(&self, other: &Dataset) -> Dataset {
        self.records.iter().chain(other.records.iter()).cloned().collect()
    }

    /// A new dataset with every record stored densely.
    pub fn to_dense(&self) -> Dataset {
        let n = self.num_features();
        self.records
            .iter()
            .map(|r| Record::new(r.features.to_dense(n), r.label))
            .collect()
    }

    /// Load a dataset in LIBSVM format. Malformed lines are skipped with a warning.
    pub fn from_libsvm<R: BufRead>(reader: R) -> Result<Dataset, ConformalError> {
        Ok(read_libsvm(reader)?.dataset)
    }

    pub fn from_libsvm_file<P: AsRef<Path>>(path: P) -> Result<Dataset, ConformalError> {
        let file = File::open(path).map_err(|e| ConformalError::UnableToRead(e.to_string()))?;
        Dataset::from_libsvm(BufReader::new(file))
    }

    /// Write the records in LIBSVM format, one per line.
    pub fn write_libsvm<W: Write>(&self, mut writer: W) -> Result<(), ConformalError> {
        for r in &self.records {
            let mut line = r.label.to_string();
            for (i, v) in r.features.iter().filter(|(_, v)| *v != 0.0) {
                line.push_str(&format!(" {}:{}", i, v));
            }
            line.push('\n');
            writer
                .write_all(line.as_bytes())
                .map_err(|e| ConformalError::UnableToWrite(e.to_string()))?;
        }
        writer.flush().map_err(|e| ConformalError::UnableToWrite(e.to_string()))
    }
}

/// Data used to train a predictor.
///
/// The `dataset` is split between proper training and calibration by the
/// sampling strategy. Records in `calibration_exclusive` only ever
/// calibrate and records in `modeling_exclusive` only ever train the
/// scoring model.
#[derive(Debug, Clone, Default)]
pub struct TrainingData {
    pub dataset: Dataset,
    pub calibration_exclusive: Dataset,
    pub modeling_exclusive: Dataset,
}

impl From<Dataset> for TrainingData {
    fn from(dataset: Dataset) -> Self {
        TrainingData::new(dataset)
    }
}

impl TrainingData {
    pub fn new(dataset: Dataset) -> Self {
        TrainingData {
            dataset,
            calibration_exclusive: Dataset::default(),
            modeling_exclusive: Dataset::default(),
        }
    }

    pub fn with_calibration_exclusive(mut self, data: Dataset) -> Self {
        self.calibration_exclusive = data;
        self
    }

    pub fn with_modeling_exclusive(mut self, data: Dataset) -> Self {
        self.modeling_exclusive = data;
        self
    }

    pub fn len(&self) -> usize {
        self.dataset.len() + self.calibration_exclusive.len() + self.modeling_exclusive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_features(&self) -> usize {
        self.dataset
            .num_features()
            .max(self.calibration_exclusive.num_features())
            .max(self.modeling_exclusive.num_features())
    }

    /// All records, exclusive ones included.
    pub fn all_records(&self) -> impl Iterator<Item = &Record> {
        self.dataset
            .records()
            .iter()
            .chain(self.calibration_exclusive.records())
            .chain(self.modeling_exclusive.records())
    }

    /// Sorted distinct class labels over all records.
    pub fn class_labels(&self) -> Result<Vec<i64>, ConformalError> {
        let mut labels = self
            .all_records()
            .map(|r| class_label(r.label()))
            .collect::<Result<Vec<_>, _>>()?;
        labels.sort_unstable();
        labels.dedup();
        Ok(labels)
    }

    pub fn label_range(&self) -> Option<(f64, f64)> {
        let mut it = self.all_records().map(|r| r.label());
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

/// What to do with test features the model never saw during training.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum FeaturePolicy {
    /// Treat unseen features as zero.
    #[default]
    ZeroFill,
    /// Fail the prediction.
    Reject,
}

impl FeaturePolicy {
    pub fn check(&self, features: &FeatureVector, num_features: usize) -> Result<(), ConformalError> {
        if let FeaturePolicy::Reject = self {
            let unseen = features
                .iter()
                .find(|(i, v)| *i >= num_features && *v != 0.0)
                .map(|(i, _)| i);
            if let Some(index) = unseen {
                return Err(ConformalError::FeatureOutOfRange { index, num_features });
            }
        }
        Ok(())
    }
}

/// A line skipped while loading.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLine {
    pub line: usize,
    pub reason: String,
}

/// Outcome of a load, counting the records kept and the lines skipped.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<SkippedLine>,
}

#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    pub report: LoadReport,
}

fn parse_sparse_tokens<'a, I: Iterator<Item = &'a str>>(tokens: I) -> Result<FeatureVector, String> {
    let mut entries = Vec::new();
    for token in tokens {
        let (idx, val) = token
            .split_once(':')
            .ok_or_else(|| format!("expected index:value, found '{}'", token))?;
        let idx = idx
            .parse::<usize>()
            .map_err(|_| format!("invalid feature index '{}'", idx))?;
        let val = val
            .parse::<f64>()
            .map_err(|_| format!("invalid feature value '{}'", val))?;
        if !val.is_finite() {
            return Err(format!("non finite value for feature {}", idx));
        }
        if let Some((last, _)) = entries.last() {
            if *last >= idx {
                return Err(format!("feature indices must be increasing, {} follows {}", idx, last));
            }
        }
        entries.push((idx, val));
    }
    Ok(FeatureVector::Sparse(entries))
}

fn parse_libsvm_line(line: &str) -> Result<Record, String> {
    let mut tokens = line.split_whitespace();
    let label_token = tokens.next().ok_or_else(|| "missing label".to_string())?;
    if label_token.contains(':') {
        return Err("missing label".to_string());
    }
    let label = label_token
        .parse::<f64>()
        .map_err(|_| format!("invalid label '{}'", label_token))?;
    if !label.is_finite() {
        return Err(format!("non finite label '{}'", label_token));
    }
    Ok(Record::new(parse_sparse_tokens(tokens)?, label))
}

/// Read LIBSVM formatted records: `label index:value index:value ...`.
///
/// Blank lines and `#` comments are ignored. Lines that cannot be parsed
/// are skipped and reported in the [`LoadReport`], so a few bad records do
/// not abort the whole load. A source without any valid record is an error.
pub fn read_libsvm<R: BufRead>(reader: R) -> Result<LoadedDataset, ConformalError> {
    let mut records = Vec::new();
    let mut report = LoadReport::default();
    for (n, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ConformalError::UnableToRead(e.to_string()))?;
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        match parse_libsvm_line(content) {
            Ok(record) => records.push(record),
            Err(reason) => {
                warn!("Skipping line {}: {}", n + 1, reason);
                report.skipped.push(SkippedLine { line: n + 1, reason });
            }
        }
    }
    if records.is_empty() {
        return Err(ConformalError::EmptyDataset);
    }
    report.loaded = records.len();
    if !report.skipped.is_empty() {
        warn!(
            "Loaded {} record(s), skipped {} malformed line(s).",
            report.loaded,
            report.skipped.len()
        );
    }
    Ok(LoadedDataset {
        dataset: Dataset::new(records),
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "1 1:0.5 3:1.5\n\
                          0 2:2.0\n\
                          # a comment line\n\
                          \n\
                          1 1:0.1 2:0.2 3:0.3\n";

    #[test]
    fn test_read_libsvm() {
        let loaded = read_libsvm(Cursor::new(SAMPLE)).unwrap();
        assert_eq!(loaded.report.loaded, 3);
        assert!(loaded.report.skipped.is_empty());
        let ds = loaded.dataset;
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.num_features(), 4);
        assert_eq!(ds.records()[0].features().get(3), 1.5);
        assert_eq!(ds.records()[1].label(), 0.0);
        assert_eq!(ds.class_labels().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_read_libsvm_skips_malformed() {
        let text = "1 1:0.5\nabc 1:1\n0 1:x\n1 3:1 2:1\n0 2:1.0\n1:1\n";
        let loaded = read_libsvm(Cursor::new(text)).unwrap();
        assert_eq!(loaded.dataset.len(), 2);
        assert_eq!(loaded.report.skipped.len(), 4);
        let lines: Vec<usize> = loaded.report.skipped.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![2, 3, 4, 6]);
    }

    #[test]
    fn test_read_libsvm_empty() {
        let res = read_libsvm(Cursor::new("# nothing\n\n"));
        assert!(matches!(res, Err(ConformalError::EmptyDataset)));
    }

    #[test]
    fn test_write_and_read_back() {
        let ds = Dataset::from_libsvm(Cursor::new(SAMPLE)).unwrap();
        let mut buf = Vec::new();
        ds.write_libsvm(&mut buf).unwrap();
        let ds2 = Dataset::from_libsvm(Cursor::new(buf)).unwrap();
        assert_eq!(ds, ds2);
    }

    #[test]
    fn test_copy_on_split() {
        let ds: Dataset = (0..10)
            .map(|i| Record::new(FeatureVector::dense(vec![i as f64]), (i % 2) as f64))
            .collect();
        let original = ds.clone();
        let (a, b) = ds.split_static(3);
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 7);
        let (c, d) = ds.split_random(0.3, 7).unwrap();
        assert_eq!(c.len(), 3);
        assert_eq!(d.len(), 7);
        let shuffled = ds.shuffled(1);
        assert_ne!(shuffled, ds);
        assert_eq!(ds, original);
        assert_eq!(a.join(&b), ds);
        assert!(ds.split_static_fraction(1.5).is_err());
    }

    #[test]
    fn test_feature_vector_ops() {
        let v = FeatureVector::sparse(vec![(3, 2.0), (1, 1.0), (3, 4.0)]);
        assert_eq!(v, FeatureVector::Sparse(vec![(1, 1.0), (3, 4.0)]));
        assert_eq!(v.dot(&[1.0, 1.0, 1.0, 0.5]), 3.0);
        // Indices beyond the weights are ignored.
        assert_eq!(v.dot(&[1.0, 2.0]), 2.0);
        assert_eq!(v.squared_norm(), 17.0);
        let mut w = vec![0.0; 4];
        v.add_scaled_to(0.5, &mut w);
        assert_eq!(w, vec![0.0, 0.5, 0.0, 2.0]);
        let d = v.to_dense(5);
        assert_eq!(d, FeatureVector::Dense(vec![0.0, 1.0, 0.0, 4.0, 0.0]));
        assert_eq!(d.to_sparse(), v);
        assert!(FeatureVector::parse_sparse("1:1 x").is_err());
    }

    #[test]
    fn test_unordered_sparse_entries() {
        let v = FeatureVector::Sparse(vec![(5, 1.0), (0, 2.0)]);
        assert_eq!(v.max_index(), Some(5));
        assert_eq!(v.get(5), 1.0);
        assert_eq!(v.get(0), 2.0);
        assert_eq!(v.to_dense(0), FeatureVector::Dense(vec![2.0, 0.0, 0.0, 0.0, 0.0, 1.0]));
        assert_eq!(v.to_sparse(), FeatureVector::Sparse(vec![(0, 2.0), (5, 1.0)]));

        let ds: Dataset = [3.0, -3.0]
            .iter()
            .map(|x| Record::new(FeatureVector::Sparse(vec![(3, *x), (0, 0.1)]), 0.0))
            .collect();
        assert_eq!(ds.num_features(), 4);
        assert!(FeaturePolicy::Reject.check(ds.records()[0].features(), 3).is_err());

        let json = r#"{"Sparse":[[3,1.0],[0,2.0],[3,4.0]]}"#;
        let parsed: FeatureVector = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, FeatureVector::Sparse(vec![(0, 2.0), (3, 4.0)]));
        let back: FeatureVector = serde_json::from_str(&serde_json::to_string(&parsed).unwrap()).unwrap();
        assert_eq!(back, parsed);
    }

    #[test]
    fn test_feature_policy() {
        let v = FeatureVector::parse_sparse("1:1 7:2").unwrap();
        assert!(FeaturePolicy::ZeroFill.check(&v, 4).is_ok());
        assert!(matches!(
            FeaturePolicy::Reject.check(&v, 4),
            Err(ConformalError::FeatureOutOfRange { index: 7, num_features: 4 })
        ));
        assert!(FeaturePolicy::Reject.check(&v, 8).is_ok());
    }

    #[test]
    fn test_training_data() {
        let ds = Dataset::from_libsvm(Cursor::new(SAMPLE)).unwrap();
        let extra = Dataset::new(vec![Record::new(FeatureVector::parse_sparse("9:1").unwrap(), 2.0)]);
        let data = TrainingData::new(ds).with_calibration_exclusive(extra);
        assert_eq!(data.len(), 4);
        assert_eq!(data.num_features(), 10);
        assert_eq!(data.class_labels().unwrap(), vec![0, 1, 2]);
        assert_eq!(data.label_range(), Some((0.0, 2.0)));
    }
}
