//! Datasets
//! ========
//! Load LIBSVM files, report skipped lines, split and scale the records,
//! select features and write the result back out.
//!
//! ```bash
//! cargo run --release --example datasets
//! ```

use conformist::data::read_libsvm;
use conformist::transform::{
    DropMissingData, MinMaxScaler, RobustScaler, Standardizer, SvrWeightSelector, Transformation, Transformer,
    TransformerChain,
};
use conformist::Dataset;
use std::error::Error;
use std::fs::File;
use std::io::{BufReader, Cursor};

fn main() -> Result<(), Box<dyn Error>> {
    let loaded = read_libsvm(BufReader::new(File::open("resources/classification.svm")?))?;
    println!(
        "Loaded {} records with {} features, {} line(s) skipped.",
        loaded.report.loaded,
        loaded.dataset.num_features(),
        loaded.report.skipped.len()
    );
    println!("Classes: {:?}", loaded.dataset.class_labels()?);

    // Malformed lines are reported, not fatal.
    let messy = "1 1:0.5 2:1.5\nnot a record\n0 1:oops\n# comment\n0 2:3.0\n";
    let partial = read_libsvm(Cursor::new(messy))?;
    for skipped in &partial.report.skipped {
        println!("line {}: {}", skipped.line, skipped.reason);
    }

    let (train, test) = loaded.dataset.split_random(0.7, 11)?;
    let mut standardizer = Standardizer::new();
    let train = standardizer.fit_transform(&train)?;
    let test = standardizer.transform(&test)?;
    println!("Feature means before scaling: {:?}", standardizer.means());

    let mut scaler = MinMaxScaler::new();
    scaler.fit(&train.join(&test))?;
    println!("Ranges after standardizing: {:?}", scaler.ranges());

    // Clean, scale and select features of the regression data in one go.
    let regression = Dataset::from_libsvm_file("resources/regression.svm")?;
    let mut chain = TransformerChain::default()
        .push(DropMissingData::new())
        .push(RobustScaler::new())
        .push(SvrWeightSelector::new().set_max_features(Some(3)));
    let selected = chain.fit_transform(&regression)?;
    if let Some(Transformation::SvrWeightSelector(selector)) = chain.steps().last() {
        println!("Selected features {:?} of {}.", selector.selected(), regression.num_features());
    }
    println!("Regression data now has {} features.", selected.num_features());

    let path = std::env::temp_dir().join("standardized.svm");
    train.write_libsvm(File::create(&path)?)?;
    let reloaded = Dataset::from_libsvm_file(&path)?;
    println!("Wrote and reloaded {} records from {}.", reloaded.len(), path.display());
    Ok(())
}
