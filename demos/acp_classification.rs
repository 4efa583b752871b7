//! Aggregated Conformal Classification
//! ===================================
//! Train an aggregated conformal classifier on three Gaussian classes and
//! report the p-values, prediction sets and the efficiency of the sets on
//! held out records.
//!
//! ```bash
//! cargo run --release --example acp_classification
//! ```

use conformist::metrics::EvaluationData;
use conformist::{
    ACPClassification, Classifier, ClassificationNcm, Dataset, Metric, ModelIO, Predictor, PredictorConfig,
    RandomSampling,
};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    // ------------------------------------------------------------------
    // 1. Load and split the data
    // ------------------------------------------------------------------
    let data = Dataset::from_libsvm_file("resources/classification.svm")?;
    let (test, train) = data.split_random(0.2, 42)?;
    println!("Training on {} records, testing on {}.", train.len(), test.len());

    // ------------------------------------------------------------------
    // 2. Train ten ICPs on random 80/20 splits
    // ------------------------------------------------------------------
    let sampling = RandomSampling::new(10, 0.2)?.set_stratified(true);
    let mut acp = ACPClassification::new(ClassificationNcm::default(), Classifier::default(), sampling.into())?
        .set_config(PredictorConfig::default().set_seed(42));
    acp.train(&train.into())?;
    println!("Trained {} models for labels {:?}.", acp.num_models(), acp.labels());

    // ------------------------------------------------------------------
    // 3. Predict a few records
    // ------------------------------------------------------------------
    let significance = 0.1;
    for record in test.records().iter().take(5) {
        let p_values = acp.predict(record.features())?;
        let set = acp.predict_set(record.features(), significance)?;
        println!("label {} p-values {:?} set {:?}", record.label(), p_values, set);
    }

    // ------------------------------------------------------------------
    // 4. Evaluate on the test set
    // ------------------------------------------------------------------
    let confidence = 1.0 - significance;
    let evaluation: EvaluationData = acp.evaluate(&test, confidence)?;
    for metric in [
        Metric::CPAccuracy,
        Metric::ObservedFuzziness,
        Metric::ProportionSingleLabel,
        Metric::ProportionEmpty,
    ] {
        println!("{}: {:.4}", metric, metric.compute(&evaluation, confidence)?);
    }

    // ------------------------------------------------------------------
    // 5. Save and reload
    // ------------------------------------------------------------------
    let path = std::env::temp_dir().join("acp_classification.json");
    acp.save_model(&path)?;
    let loaded = ACPClassification::load_model(&path)?;
    assert_eq!(loaded.predict(test.records()[0].features())?, acp.predict(test.records()[0].features())?);
    println!("Model saved to {}.", path.display());
    Ok(())
}
