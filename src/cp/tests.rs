use crate::algorithm::{Classifier, LinearSVR, PlattScaledSVC, Regressor};
use crate::config::{Aggregation, PredictorConfig};
use crate::cp::{train_splits, ACPClassification, ACPRegression, Predictor};
use crate::data::{Dataset, FeaturePolicy, FeatureVector, Record, TrainingData};
use crate::errors::ConformalError;
use crate::io::ModelIO;
use crate::ncm::{ClassificationNcm, RegressionNcm};
use crate::sampling::{FoldedSampling, RandomSampling, Sampling, SamplingStrategy, Split};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::tempdir;

fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-12);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Two overlapping gaussian classes, drawn with equal probability.
fn two_classes(n: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let label = if rng.gen::<f64>() < 0.5 { 0.0 } else { 1.0 };
            let center = if label == 1.0 { 1.0 } else { -1.0 };
            let x0 = center + gaussian(&mut rng);
            let x1 = 0.5 * center + gaussian(&mut rng);
            Record::new(FeatureVector::dense(vec![x0, x1]), label)
        })
        .collect()
}

/// A noisy line with noise growing in |x|.
fn heteroscedastic_line(n: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let x: f64 = rng.gen::<f64>() * 4.0 - 2.0;
            let y = 2.0 * x - 1.0 + (0.2 + 0.5 * x.abs()) * gaussian(&mut rng);
            Record::new(FeatureVector::dense(vec![x]), y)
        })
        .collect()
}

fn acp_classification(sampling: Sampling) -> ACPClassification {
    ACPClassification::new(ClassificationNcm::default(), Classifier::default(), sampling).unwrap()
}

fn svr() -> Regressor {
    Regressor::LinearSVR(LinearSVR::new(1.0, 0.05).unwrap())
}

#[test]
fn test_classification_validity() {
    let train = two_classes(300, 1);
    let test = two_classes(600, 2);
    for sampling in [
        Sampling::default(),
        FoldedSampling::new(5).unwrap().into(),
    ] {
        let mut acp = acp_classification(sampling);
        acp.train(&train.clone().into()).unwrap();
        for significance in [0.1, 0.2, 0.3] {
            let errors = test
                .records()
                .iter()
                .filter(|r| {
                    let set = acp.predict_set(r.features(), significance).unwrap();
                    !set.contains(&(r.label() as i64))
                })
                .count();
            let error_rate = errors as f64 / test.len() as f64;
            assert!(
                error_rate <= significance + 0.05,
                "error rate {} at significance {}",
                error_rate,
                significance
            );
        }
    }
}

#[test]
fn test_regression_validity() {
    let train = heteroscedastic_line(300, 3);
    let test = heteroscedastic_line(500, 4);
    for ncm in [RegressionNcm::AbsoluteDifference, RegressionNcm::Normalized { beta: 0.05 }] {
        let mut acp = ACPRegression::new(ncm, svr(), Sampling::default()).unwrap();
        acp.train(&train.clone().into()).unwrap();
        for confidence in [0.7, 0.8, 0.9] {
            let covered = test
                .records()
                .iter()
                .filter(|r| {
                    let p = acp.predict(r.features(), &[confidence]).unwrap();
                    let (lo, hi) = p.intervals[0].interval;
                    lo <= r.label() && r.label() <= hi
                })
                .count();
            let coverage = covered as f64 / test.len() as f64;
            assert!(coverage >= confidence - 0.05, "coverage {} at {}", coverage, confidence);
        }
    }
}

#[test]
fn test_balanced_scenario() {
    let records: Vec<Record> = (0..100)
        .map(|i| {
            let label = if i < 50 { 0.0 } else { 1.0 };
            let offset = ((i * 29) % 13) as f64 / 13.0;
            let x = if label == 1.0 { 0.5 + offset } else { -0.5 - offset };
            Record::new(FeatureVector::sparse(vec![(0, x), (3, offset)]), label)
        })
        .collect();
    let mut acp = acp_classification(RandomSampling::new(10, 0.2).unwrap().into());
    acp.train(&Dataset::new(records).into()).unwrap();
    assert_eq!(acp.num_models(), 10);

    let held_out = FeatureVector::parse_sparse("0:0.7 3:0.2").unwrap();
    let p = acp.predict(&held_out).unwrap();
    assert_eq!(p.len(), 2);
    assert!(p.values().all(|v| (0.0..=1.0).contains(v)));
    assert!(p.values().any(|v| *v >= 0.2));
}

#[test]
fn test_argmax_stable_and_aggregation() {
    let train = two_classes(120, 5);
    for aggregation in [Aggregation::Mean, Aggregation::Median] {
        let mut acp = acp_classification(Sampling::default())
            .set_config(PredictorConfig::default().set_aggregation(aggregation));
        acp.train(&train.clone().into()).unwrap();
        for r in two_classes(20, 6).records() {
            let first = acp.predict(r.features()).unwrap();
            let second = acp.predict(r.features()).unwrap();
            assert_eq!(first, second);
            assert!(first.values().all(|v| (0.0..=1.0).contains(v)));
        }
    }
}

#[test]
fn test_thread_count_does_not_change_model() {
    let train: TrainingData = two_classes(100, 7).into();
    let mut single = acp_classification(Sampling::default())
        .set_config(PredictorConfig::default().set_num_threads(Some(1)));
    let mut multi = acp_classification(Sampling::default())
        .set_config(PredictorConfig::default().set_num_threads(Some(4)));
    single.train(&train).unwrap();
    multi.train(&train).unwrap();
    let x = FeatureVector::dense(vec![0.2, -0.1]);
    assert_eq!(single.predict(&x).unwrap(), multi.predict(&x).unwrap());
}

#[test]
fn test_classification_round_trip() {
    let mut acp = ACPClassification::new(
        ClassificationNcm::InverseProbability,
        Classifier::PlattScaledSVC(PlattScaledSVC::default()),
        FoldedSampling::new(4).unwrap().into(),
    )
    .unwrap();
    acp.train(&two_classes(80, 8).into()).unwrap();
    acp.insert_metadata("name".to_string(), "two classes".to_string());

    let loaded = ACPClassification::from_json(&acp.json_dump().unwrap()).unwrap();
    assert_eq!(loaded.get_metadata(&"name".to_string()), Some("two classes".to_string()));
    for r in two_classes(25, 9).records() {
        assert_eq!(acp.predict(r.features()).unwrap(), loaded.predict(r.features()).unwrap());
    }
}

#[test]
fn test_regression_round_trip() {
    let mut acp = ACPRegression::new(RegressionNcm::LogNormalized { beta: 0.1 }, svr(), Sampling::default()).unwrap();
    acp.train(&heteroscedastic_line(100, 10).into()).unwrap();

    let dir = tempdir().unwrap();
    let file_path = dir.path().join("acp_regression.json");
    acp.save_model(&file_path).unwrap();
    let loaded = ACPRegression::load_model(&file_path).unwrap();
    let confidences = [0.5, 0.8, 0.95];
    for r in heteroscedastic_line(25, 11).records() {
        assert_eq!(
            acp.predict(r.features(), &confidences).unwrap(),
            loaded.predict(r.features(), &confidences).unwrap()
        );
    }
}

#[test]
fn test_cancel_between_splits_stops_remaining_splits() {
    let cfg = PredictorConfig::default().set_num_threads(Some(1));
    let splits: Vec<Split> = (0..6)
        .map(|k| Split {
            proper_training: vec![k],
            calibration: vec![k + 6],
        })
        .collect();

    let cancel = AtomicBool::new(false);
    let started = AtomicUsize::new(0);
    let result = train_splits(&cfg, &splits, &cancel, |k, _| {
        started.fetch_add(1, Ordering::SeqCst);
        if k == 1 {
            cancel.store(true, Ordering::SeqCst);
        }
        Ok(k)
    });
    assert!(matches!(result, Err(ConformalError::Cancelled)));
    // Splits 0 and 1 ran, none started after the flag was raised.
    assert_eq!(started.load(Ordering::SeqCst), 2);

    let cancel = AtomicBool::new(false);
    let trained = train_splits(&cfg, &splits, &cancel, |k, _| Ok(k)).unwrap();
    assert_eq!(trained, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_cancelled_training_leaves_predictor_untrained() {
    let data: TrainingData = two_classes(60, 12).into();
    let mut acp = acp_classification(Sampling::default());
    acp.train(&data).unwrap();
    assert!(acp.is_trained());

    let cancel = AtomicBool::new(true);
    assert!(matches!(acp.train_with_cancel(&data, &cancel), Err(ConformalError::Cancelled)));
    assert!(!acp.is_trained());
    assert!(matches!(
        acp.predict(&FeatureVector::dense(vec![0.0, 0.0])),
        Err(ConformalError::NotTrained(_))
    ));

    let mut acr = ACPRegression::new(RegressionNcm::default(), svr(), Sampling::default()).unwrap();
    assert!(matches!(
        acr.train_with_cancel(&heteroscedastic_line(60, 13).into(), &cancel),
        Err(ConformalError::Cancelled)
    ));
    assert!(!acr.is_trained());
}

#[test]
fn test_degenerate_splits_excluded() {
    let mut records: Vec<Record> = (0..20)
        .map(|i| Record::new(FeatureVector::dense(vec![-1.0 - i as f64 / 20.0]), 0.0))
        .collect();
    records.push(Record::new(FeatureVector::dense(vec![1.0]), 1.0));
    records.push(Record::new(FeatureVector::dense(vec![1.5]), 1.0));
    let dataset = Dataset::new(records);
    let sampling = RandomSampling::new(20, 0.5).unwrap();

    // A split is degenerate when both class 1 records land in calibration.
    let degenerate = sampling
        .splits(&dataset.labels(), 0)
        .unwrap()
        .iter()
        .filter(|s| s.calibration.contains(&20) && s.calibration.contains(&21))
        .count();

    let mut acp = acp_classification(sampling.into());
    let result = acp.train(&dataset.into());
    if degenerate == 20 {
        assert!(matches!(result, Err(ConformalError::NoValidSplits(20))));
    } else {
        result.unwrap();
        assert_eq!(acp.num_models(), 20 - degenerate);
    }
}

#[test]
fn test_no_valid_splits() {
    let only_zeros: Dataset = (0..20)
        .map(|i| Record::new(FeatureVector::dense(vec![i as f64]), 0.0))
        .collect();
    let ones: Dataset = (0..5)
        .map(|i| Record::new(FeatureVector::dense(vec![-(i as f64)]), 1.0))
        .collect();
    let data = TrainingData::new(only_zeros).with_calibration_exclusive(ones);
    let mut acp = acp_classification(Sampling::default());
    assert!(matches!(acp.train(&data), Err(ConformalError::NoValidSplits(10))));
    assert!(!acp.is_trained());
}

#[test]
fn test_feature_policy() {
    let data: TrainingData = two_classes(60, 14).into();
    let unseen = FeatureVector::sparse(vec![(0, 0.5), (7, 1.0)]);

    let mut zero_fill = acp_classification(Sampling::default());
    zero_fill.train(&data).unwrap();
    let filled = zero_fill.predict(&unseen).unwrap();
    assert_eq!(filled, zero_fill.predict(&FeatureVector::sparse(vec![(0, 0.5)])).unwrap());

    let mut reject = acp_classification(Sampling::default())
        .set_config(PredictorConfig::default().set_feature_policy(FeaturePolicy::Reject));
    reject.train(&data).unwrap();
    assert!(matches!(
        reject.predict(&unseen),
        Err(ConformalError::FeatureOutOfRange { index: 7, num_features: 2 })
    ));
}
