//! Grid Search
//!
//! Every point of a [`ParameterGrid`] is applied to a copy of the
//! predictor, evaluated with a [`TestRunner`] and ranked by a metric.
//! Points that cannot be applied or evaluated are skipped, conformal
//! predictors that miss the requested confidence by more than the tolerance
//! are marked invalid.
use crate::constants::DEFAULT_RESULT_COUNT;
use crate::cp::Predictor;
use crate::data::TrainingData;
use crate::errors::ConformalError;
use crate::metrics::{is_comparison_better, Metric};
use crate::tuning::test_runner::TestRunner;
use crate::tuning::testing::TestingStrategy;
use crate::tuning::{Configurable, ParameterGrid};
use crate::utils::validate_float_parameter;
use log::{info, warn};
use std::cmp::Ordering;
use std::fmt;
use std::io::Write;

/// Progress of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Expanding,
    /// Evaluating point `index` (zero based) of `total`.
    Evaluating { index: usize, total: usize },
    Ranking,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointStatus {
    Valid,
    /// The predictor was less accurate than the confidence allows.
    Invalid,
    /// The point could not be applied or evaluated.
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridSearchResult {
    pub parameters: Vec<(String, f64)>,
    /// Metric value, NaN for skipped points.
    pub score: f64,
    /// Accuracy of a conformal predictor at the search confidence.
    pub accuracy: Option<f64>,
    pub status: PointStatus,
}

impl fmt::Display for GridSearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parameters: Vec<String> = self.parameters.iter().map(|(n, v)| format!("{}={}", n, v)).collect();
        write!(f, "{}\t{:.4}", parameters.join(","), self.score)?;
        if let Some(accuracy) = self.accuracy {
            write!(f, "\t{:.4}", accuracy)?;
        }
        match &self.status {
            PointStatus::Valid => write!(f, "\tvalid"),
            PointStatus::Invalid => write!(f, "\tinvalid"),
            PointStatus::Skipped(reason) => write!(f, "\tskipped: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridSearchReport {
    pub metric: Metric,
    /// Best valid points, best first; ties keep grid order.
    pub best: Vec<GridSearchResult>,
    /// Every point, in grid order.
    pub all: Vec<GridSearchResult>,
}

impl GridSearchReport {
    /// Parameters of the best point, if any point was valid.
    pub fn best_parameters(&self) -> Option<&[(String, f64)]> {
        self.best.first().map(|r| r.parameters.as_slice())
    }
}

pub struct GridSearch {
    pub strategy: TestingStrategy,
    pub confidence: f64,
    /// Allowed shortfall of the accuracy below `confidence`.
    pub tolerance: f64,
    pub result_count: usize,
    writer: Option<Box<dyn Write + Send>>,
    phase: SearchPhase,
}

impl GridSearch {
    pub fn new(strategy: TestingStrategy, confidence: f64, tolerance: f64) -> Result<Self, ConformalError> {
        strategy.validate_parameters()?;
        validate_float_parameter(confidence, 0.0, 1.0, "confidence")?;
        validate_float_parameter(tolerance, 0.0, 1.0, "tolerance")?;
        Ok(GridSearch {
            strategy,
            confidence,
            tolerance,
            result_count: DEFAULT_RESULT_COUNT,
            writer: None,
            phase: SearchPhase::Idle,
        })
    }

    /// Number of best results kept.
    pub fn with_result_count(mut self, result_count: usize) -> Self {
        self.result_count = result_count;
        self
    }

    /// Write one line per evaluated point.
    pub fn with_result_writer<W: Write + Send + 'static>(mut self, writer: W) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    fn evaluate_point<P: Predictor + Configurable>(
        &self,
        runner: &TestRunner,
        predictor: &P,
        data: &TrainingData,
        metric: Metric,
        parameters: &[(String, f64)],
    ) -> Result<(f64, Option<f64>), ConformalError> {
        let mut candidate = predictor.clone();
        for (name, value) in parameters {
            candidate.set_config_parameter(name, *value)?;
        }
        let evaluation = runner.evaluation_data(&candidate, data)?;
        let score = metric.compute(&evaluation, self.confidence)?;
        let accuracy = if candidate.is_conformal() {
            Some(Metric::CPAccuracy.compute(&evaluation, self.confidence)?)
        } else {
            None
        };
        Ok((score, accuracy))
    }

    fn write_result(&mut self, result: &GridSearchResult) -> Result<(), ConformalError> {
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{}", result).map_err(|e| ConformalError::UnableToWrite(e.to_string()))?;
        }
        Ok(())
    }

    /// Evaluate every point of `grid` and rank the valid ones by `metric`.
    pub fn search<P: Predictor + Configurable>(
        &mut self,
        predictor: &P,
        data: &TrainingData,
        metric: Metric,
        grid: &ParameterGrid,
    ) -> Result<GridSearchReport, ConformalError> {
        self.phase = SearchPhase::Expanding;
        let points = grid.points();
        if points.is_empty() {
            self.phase = SearchPhase::Idle;
            return Err(ConformalError::InvalidParameter(
                "grid".to_string(),
                "at least one value per parameter".to_string(),
                format!("{:?}", grid.names()),
            ));
        }
        let runner = TestRunner::new(self.strategy.clone(), self.confidence)?;

        let total = points.len();
        let mut all = Vec::with_capacity(total);
        for (index, parameters) in points.into_iter().enumerate() {
            self.phase = SearchPhase::Evaluating { index, total };
            let result = match self.evaluate_point(&runner, predictor, data, metric, &parameters) {
                Ok((score, accuracy)) => {
                    let status = match accuracy {
                        Some(a) if a < self.confidence - self.tolerance => PointStatus::Invalid,
                        _ => PointStatus::Valid,
                    };
                    GridSearchResult {
                        parameters,
                        score,
                        accuracy,
                        status,
                    }
                }
                Err(e) => {
                    warn!("Skipping grid point {} of {}: {}", index + 1, total, e);
                    GridSearchResult {
                        parameters,
                        score: f64::NAN,
                        accuracy: None,
                        status: PointStatus::Skipped(e.to_string()),
                    }
                }
            };
            info!("Grid point {} of {}: {}", index + 1, total, result);
            self.write_result(&result)?;
            all.push(result);
        }

        self.phase = SearchPhase::Ranking;
        let maximize = metric.maximize();
        let mut best: Vec<GridSearchResult> = all.iter().filter(|r| r.status == PointStatus::Valid).cloned().collect();
        // Stable, so the first seen of equal scores stays first.
        best.sort_by(|a, b| {
            if is_comparison_better(a.score, b.score, maximize) {
                Ordering::Greater
            } else if is_comparison_better(b.score, a.score, maximize) {
                Ordering::Less
            } else {
                Ordering::Equal
            }
        });
        best.truncate(self.result_count);

        self.phase = SearchPhase::Done;
        Ok(GridSearchReport { metric, best, all })
    }
}
