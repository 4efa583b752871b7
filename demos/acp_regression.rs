//! Aggregated Conformal Regression
//! ===============================
//! Fit an aggregated conformal regressor with a normalized nonconformity
//! measure, so interval widths follow the difficulty of each record, and
//! check the empirical coverage at a few confidence levels.
//!
//! ```bash
//! cargo run --release --example acp_regression
//! ```

use conformist::{
    ACPRegression, Aggregation, FoldedSampling, LinearSVR, Metric, Predictor, PredictorConfig, Regressor,
    RegressionNcm,
};
use conformist::{Dataset, TrainingData};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let data = Dataset::from_libsvm_file("resources/regression.svm")?;
    let (test, train) = data.split_random(0.25, 7)?;

    // Cross-conformal: every record calibrates exactly one of the ten models.
    let mut acp = ACPRegression::new(
        RegressionNcm::Normalized { beta: 0.01 },
        Regressor::LinearSVR(LinearSVR::new(1.0, 0.1)?),
        FoldedSampling::new(10)?.into(),
    )?
    .set_config(PredictorConfig::default().set_aggregation(Aggregation::Median));
    acp.train(&TrainingData::new(train))?;
    println!("Trained {} models, label range {:?}.", acp.num_models(), acp.label_range());

    let confidences = [0.5, 0.8, 0.9, 0.95];
    let record = &test.records()[0];
    let prediction = acp.predict(record.features(), &confidences)?;
    println!("y = {:.3}, y_hat = {:.3}", record.label(), prediction.y_hat);
    for interval in &prediction.intervals {
        println!(
            "  {:.2}: [{:.3}, {:.3}] capped [{:.3}, {:.3}]",
            interval.confidence,
            interval.interval.0,
            interval.interval.1,
            interval.capped_interval.0,
            interval.capped_interval.1
        );
    }
    for d in acp.predict_for_distances(record.features(), &[0.25, 0.5, 1.0])? {
        println!("  half-width {:.2} reached at confidence {:.3}", d.distance, d.confidence);
    }

    for confidence in confidences {
        let evaluation = acp.evaluate(&test, confidence)?;
        println!(
            "confidence {:.2}: coverage {:.3}, median width {:.3}",
            confidence,
            Metric::CPAccuracy.compute(&evaluation, confidence)?,
            Metric::MedianIntervalWidth.compute(&evaluation, confidence)?
        );
    }
    Ok(())
}
