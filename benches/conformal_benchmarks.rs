use conformist::utils::{conformal_p_value, conformal_quantile, sort_scores};
use conformist::venn_abers::IsotonicCalibrator;
use conformist::{
    ACPClassification, ACPRegression, Classifier, ClassificationNcm, Dataset, FoldedSampling, LinearSVR, Predictor,
    PredictorConfig, RandomSampling, Regressor, RegressionNcm, TrainingData,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

pub fn conformal_benchmarks(c: &mut Criterion) {
    let classification =
        Dataset::from_libsvm_file("resources/classification.svm").expect("Unable to read classification data");
    let regression = Dataset::from_libsvm_file("resources/regression.svm").expect("Unable to read regression data");

    let mut scores: Vec<f64> = (0..10_000).map(|i| ((i * 7919) % 10_007) as f64 / 10_007.0).collect();
    sort_scores(&mut scores);
    c.bench_function("p-value", |b| b.iter(|| conformal_p_value(black_box(&scores), black_box(0.42))));
    c.bench_function("quantile", |b| b.iter(|| conformal_quantile(black_box(&scores), black_box(0.9))));

    let points: Vec<(f64, f64)> = scores.iter().enumerate().map(|(i, s)| (*s, (i % 3 == 0) as u8 as f64)).collect();
    c.bench_function("isotonic fit", |b| b.iter(|| IsotonicCalibrator::new(black_box(&points))));

    // Training
    let mut train = c.benchmark_group("train_predictor");
    train.warm_up_time(Duration::from_secs(5));
    train.sample_size(20);
    for threads in [1, 4] {
        let cfg = PredictorConfig::default().set_num_threads(Some(threads));
        let data = TrainingData::new(classification.clone());
        train.bench_function(format!("acp_classification_{}_threads", threads), |b| {
            b.iter(|| {
                let mut acp = ACPClassification::new(
                    ClassificationNcm::default(),
                    Classifier::default(),
                    RandomSampling::new(10, 0.2).unwrap().into(),
                )
                .unwrap()
                .set_config(cfg.clone());
                acp.train(black_box(&data)).unwrap();
            })
        });
    }
    let data = TrainingData::new(regression.clone());
    train.bench_function("acp_regression_folded", |b| {
        b.iter(|| {
            let mut acp = ACPRegression::new(
                RegressionNcm::Normalized { beta: 0.01 },
                Regressor::LinearSVR(LinearSVR::default()),
                FoldedSampling::new(10).unwrap().into(),
            )
            .unwrap();
            acp.train(black_box(&data)).unwrap();
        })
    });
    train.finish();

    // Prediction
    let mut acp =
        ACPClassification::new(ClassificationNcm::default(), Classifier::default(), Default::default()).unwrap();
    acp.train(&TrainingData::new(classification.clone())).unwrap();
    let x = classification.records()[0].features().clone();
    c.bench_function("acp_classification_predict", |b| b.iter(|| acp.predict(black_box(&x))));

    let mut acp = ACPRegression::new(
        RegressionNcm::AbsoluteDifference,
        Regressor::LinearSVR(LinearSVR::default()),
        Default::default(),
    )
    .unwrap();
    acp.train(&TrainingData::new(regression.clone())).unwrap();
    let x = regression.records()[0].features().clone();
    c.bench_function("acp_regression_predict", |b| {
        b.iter(|| acp.predict(black_box(&x), black_box(&[0.8, 0.9, 0.95])))
    });
}

criterion_group!(benches, conformal_benchmarks);
criterion_main!(benches);
