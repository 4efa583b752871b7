//! Tuning
//!
//! Evaluation of predictors with a testing strategy, and exhaustive search
//! over a grid of hyper-parameters.
//!
//! # Submodules
//!
//! * `testing`: Strategies producing train and test sets.
//! * `test_runner`: Trains and evaluates a predictor over a testing strategy.
//! * `grid_search`: Ranks the points of a [`ParameterGrid`].

pub mod grid_search;
pub mod test_runner;
pub mod testing;

pub use grid_search::{GridSearch, GridSearchReport, GridSearchResult, PointStatus, SearchPhase};
pub use test_runner::TestRunner;
pub use testing::TestingStrategy;

use crate::errors::ConformalError;

/// A predictor whose hyper-parameters can be changed by name.
pub trait Configurable {
    /// Names of the parameters meaningful to this predictor.
    fn config_parameters(&self) -> Vec<&'static str>;

    /// Set a parameter, failing for names meaningless to the predictor or invalid values.
    fn set_config_parameter(&mut self, name: &str, value: f64) -> Result<(), ConformalError>;
}

/// Candidate values per parameter, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterGrid {
    parameters: Vec<(String, Vec<f64>)>,
}

impl ParameterGrid {
    pub fn new() -> Self {
        ParameterGrid::default()
    }

    /// Add a parameter, replacing the values of one already present.
    pub fn add(mut self, name: &str, values: Vec<f64>) -> Self {
        match self.parameters.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = values,
            None => self.parameters.push((name.to_string(), values)),
        }
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.parameters.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Number of points in the grid.
    pub fn len(&self) -> usize {
        self.parameters.iter().map(|(_, v)| v.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The Cartesian product of the values, the first parameter varying slowest.
    ///
    /// A grid without parameters has a single empty point.
    pub fn points(&self) -> Vec<Vec<(String, f64)>> {
        let mut points: Vec<Vec<(String, f64)>> = vec![Vec::new()];
        for (name, values) in &self.parameters {
            points = points
                .into_iter()
                .flat_map(|point| {
                    values.iter().map(move |v| {
                        let mut p = point.clone();
                        p.push((name.clone(), *v));
                        p
                    })
                })
                .collect();
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_grid_order() {
        let grid = ParameterGrid::new()
            .add("cost", vec![1.0, 10.0])
            .add("ncmBeta", vec![0.0, 0.1, 0.5]);
        assert_eq!(grid.len(), 6);
        let points = grid.points();
        assert_eq!(points.len(), 6);
        assert_eq!(points[0], vec![("cost".to_string(), 1.0), ("ncmBeta".to_string(), 0.0)]);
        assert_eq!(points[2], vec![("cost".to_string(), 1.0), ("ncmBeta".to_string(), 0.5)]);
        assert_eq!(points[3], vec![("cost".to_string(), 10.0), ("ncmBeta".to_string(), 0.0)]);
    }

    #[test]
    fn test_parameter_grid_replace_and_empty() {
        let grid = ParameterGrid::new().add("cost", vec![1.0]).add("cost", vec![2.0, 3.0]);
        assert_eq!(grid.names(), vec!["cost"]);
        assert_eq!(grid.len(), 2);
        assert_eq!(ParameterGrid::new().points(), vec![Vec::<(String, f64)>::new()]);
        assert!(ParameterGrid::new().add("cost", vec![]).is_empty());
    }
}
