//! Venn-ABERS Probabilities
//! ========================
//! Calibrated probabilities for a two class problem, with the width of the
//! multiprobability interval as a measure of how certain each one is.
//!
//! ```bash
//! cargo run --release --example venn_abers
//! ```

use conformist::{AVAPClassification, Classifier, Dataset, FoldedSampling, Metric, Predictor};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let data = Dataset::from_libsvm_file("resources/binary.svm")?;
    let (test, train) = data.split_random(0.25, 3)?;

    let mut avap = AVAPClassification::new(Classifier::default(), FoldedSampling::new(5)?.set_stratified(true).into())?;
    avap.train(&train.into())?;

    for record in test.records().iter().take(5) {
        let prediction = avap.predict(record.features())?;
        println!(
            "label {}: p(1) = {:.3} in [{:.3}, {:.3}], width {:.3}",
            record.label(),
            prediction.probabilities[&1],
            prediction.lower,
            prediction.upper,
            prediction.mean_interval_width
        );
    }

    let evaluation = avap.evaluate(&test, 0.0)?;
    for metric in [Metric::LogLoss, Metric::BrierScore, Metric::MeanVennAbersWidth] {
        println!("{}: {:.4}", metric, metric.compute(&evaluation, 0.0)?);
    }
    Ok(())
}
