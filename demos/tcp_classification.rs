//! Transductive Conformal Classification
//! =====================================
//! Use every training record for both fitting and calibration: the scoring
//! model is refit for each test record and candidate label, so keep the
//! training set small.
//!
//! ```bash
//! cargo run --release --example tcp_classification
//! ```

use conformist::{Classifier, ClassificationNcm, Dataset, Metric, Predictor, PredictorConfig, TCPClassification};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let data = Dataset::from_libsvm_file("resources/classification.svm")?.shuffled(7);
    let (train, rest) = data.split_static(90);
    let (test, _) = rest.split_static(20);
    println!("Training on {} records, testing on {}.", train.len(), test.len());

    let mut tcp = TCPClassification::new(ClassificationNcm::default(), Classifier::default())?
        .set_config(PredictorConfig::default().set_seed(7));
    tcp.train(&train.into())?;
    println!("Stored training records for labels {:?}.", tcp.labels());

    let significance = 0.2;
    for record in test.records().iter().take(5) {
        let p_values = tcp.predict(record.features())?;
        let set = tcp.predict_set(record.features(), significance)?;
        println!("label {} p-values {:?} set {:?}", record.label(), p_values, set);
    }

    let confidence = 1.0 - significance;
    let evaluation = tcp.evaluate(&test, confidence)?;
    for metric in [Metric::CPAccuracy, Metric::ProportionSingleLabel, Metric::ObservedFuzziness] {
        println!("{}: {:.4}", metric, metric.compute(&evaluation, confidence)?);
    }
    Ok(())
}
