//! Nonconformity Measures
//!
//! A nonconformity measure turns the output of a trained scoring model into
//! a score telling how unusual a record is, higher meaning more unusual.
//!
//! # Submodules
//!
//! * `classification`: Mondrian (class-conditional) measures, one score per candidate label.
//! * `regression`: Absolute residual measures, optionally normalized by a predicted difficulty.

pub mod classification;
pub mod regression;

pub use classification::ClassificationNcm;
pub use regression::RegressionNcm;
