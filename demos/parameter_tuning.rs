//! Parameter Tuning
//! ================
//! Search a grid of SVM costs for the most efficient aggregated conformal
//! classifier, rejecting settings whose accuracy falls below the requested
//! confidence. Every evaluated point is also written to standard output.
//!
//! ```bash
//! cargo run --release --example parameter_tuning
//! ```

use conformist::tuning::PointStatus;
use conformist::{
    ACPClassification, Classifier, ClassificationNcm, Dataset, GridSearch, Metric, ParameterGrid, Sampling,
    TestingStrategy, TrainingData,
};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let data = TrainingData::new(Dataset::from_libsvm_file("resources/binary.svm")?);
    let acp = ACPClassification::new(ClassificationNcm::default(), Classifier::default(), Sampling::default())?;

    let grid = ParameterGrid::new()
        .add("cost", vec![0.01, 0.1, 1.0, 10.0, 100.0])
        .add("tolerance", vec![0.001, 0.01]);
    let mut search = GridSearch::new(TestingStrategy::KFoldCV { folds: 5, seed: 1 }, 0.8, 0.05)?
        .with_result_count(3)
        .with_result_writer(std::io::stdout());
    let report = search.search(&acp, &data, Metric::ObservedFuzziness, &grid)?;

    let invalid = report.all.iter().filter(|r| r.status == PointStatus::Invalid).count();
    println!("{} of {} points were invalid.", invalid, report.all.len());
    for (rank, result) in report.best.iter().enumerate() {
        println!("{}. {}", rank + 1, result);
    }
    if let Some(best) = report.best_parameters() {
        println!("Best parameters: {:?}", best);
    }
    Ok(())
}
