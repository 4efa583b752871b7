use crate::cp::Predictor;
use crate::data::TrainingData;
use crate::errors::ConformalError;
use crate::metrics::{EvaluationData, Metric};
use crate::tuning::testing::TestingStrategy;
use crate::utils::validate_float_parameter;
use log::debug;

/// Trains a fresh copy of a predictor on every training set of a testing
/// strategy and pools the predictions on the test sets.
#[derive(Debug, Clone)]
pub struct TestRunner {
    pub strategy: TestingStrategy,
    pub confidence: f64,
}

impl TestRunner {
    pub fn new(strategy: TestingStrategy, confidence: f64) -> Result<Self, ConformalError> {
        strategy.validate_parameters()?;
        validate_float_parameter(confidence, 0.0, 1.0, "confidence")?;
        Ok(TestRunner { strategy, confidence })
    }

    /// Pooled evaluation data over all test sets.
    ///
    /// Exclusive records of `data` join every training set and are never tested.
    pub fn evaluation_data<P: Predictor>(
        &self,
        predictor: &P,
        data: &TrainingData,
    ) -> Result<EvaluationData, ConformalError> {
        let mut pooled: Option<EvaluationData> = None;
        for (k, (train, test)) in self.strategy.splits(&data.dataset)?.into_iter().enumerate() {
            let training = TrainingData {
                dataset: train,
                calibration_exclusive: data.calibration_exclusive.clone(),
                modeling_exclusive: data.modeling_exclusive.clone(),
            };
            let mut model = predictor.clone();
            model.train(&training)?;
            let evaluation = model.evaluate(&test, self.confidence)?;
            debug!("Test split {}: evaluated {} record(s).", k, evaluation.len());
            match pooled.as_mut() {
                Some(p) => p.extend(evaluation)?,
                None => pooled = Some(evaluation),
            }
        }
        pooled.ok_or(ConformalError::EmptyDataset)
    }

    /// Value of each metric over the pooled test predictions.
    pub fn evaluate<P: Predictor>(
        &self,
        predictor: &P,
        data: &TrainingData,
        metrics: &[Metric],
    ) -> Result<Vec<f64>, ConformalError> {
        let evaluation = self.evaluation_data(predictor, data)?;
        metrics.iter().map(|m| m.compute(&evaluation, self.confidence)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{Classifier, LinearSVR, Regressor};
    use crate::cp::{ACPClassification, ACPRegression};
    use crate::data::{Dataset, FeatureVector, Record};
    use crate::ncm::{ClassificationNcm, RegressionNcm};
    use crate::sampling::{RandomSampling, Sampling};

    #[test]
    fn test_runner_classification() {
        let data: Dataset = (0..80)
            .map(|i| {
                let sign = if i % 2 == 0 { -1.0 } else { 1.0 };
                let jitter = ((i * 31) % 9) as f64 / 9.0;
                Record::new(FeatureVector::dense(vec![sign * (0.3 + jitter)]), (i % 2) as f64)
            })
            .collect();
        let acp = ACPClassification::new(
            ClassificationNcm::default(),
            Classifier::default(),
            RandomSampling::new(5, 0.25).unwrap().into(),
        )
        .unwrap();
        let runner = TestRunner::new(TestingStrategy::KFoldCV { folds: 4, seed: 0 }, 0.8).unwrap();
        let pooled = runner.evaluation_data(&acp, &data.clone().into()).unwrap();
        assert_eq!(pooled.len(), 80);
        let values = runner
            .evaluate(&acp, &data.into(), &[Metric::CPAccuracy, Metric::ObservedFuzziness])
            .unwrap();
        assert!((0.0..=1.0).contains(&values[0]));
        assert!(values[1] >= 0.0);
        assert!(runner.evaluate(&acp, &small_data(), &[Metric::LogLoss]).is_err());
    }

    fn small_data() -> TrainingData {
        (0..20)
            .map(|i| Record::new(FeatureVector::dense(vec![i as f64]), (i % 2) as f64))
            .collect::<Dataset>()
            .into()
    }

    #[test]
    fn test_runner_regression() {
        let data: Dataset = (0..60)
            .map(|i| {
                let x = i as f64 / 30.0 - 1.0;
                Record::new(FeatureVector::dense(vec![x]), x * 2.0 + ((i * 7) % 5) as f64 / 10.0)
            })
            .collect();
        let acp = ACPRegression::new(
            RegressionNcm::AbsoluteDifference,
            Regressor::LinearSVR(LinearSVR::default()),
            Sampling::default(),
        )
        .unwrap();
        let runner = TestRunner::new(
            TestingStrategy::RandomSplit {
                test_fraction: 0.3,
                seed: 2,
            },
            0.8,
        )
        .unwrap();
        let values = runner
            .evaluate(&acp, &data.into(), &[Metric::MeanIntervalWidth, Metric::RootMeanSquaredError])
            .unwrap();
        assert!(values[0] > 0.0 && values[0].is_finite());
        assert!(values[1] < 1.0);
        assert!(TestRunner::new(TestingStrategy::LeaveOneOut, 1.5).is_err());
    }
}
