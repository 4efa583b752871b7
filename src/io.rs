//! Persistence
//!
//! Models and configurations are stored as JSON. Floats are written with
//! enough digits to be read back bit for bit, so a reloaded predictor makes
//! exactly the same predictions.
use crate::errors::ConformalError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

pub trait ModelIO: Serialize + DeserializeOwned + Sized {
    /// Save a model as a json object to a file.
    ///
    /// * `path` - Path to save model.
    fn save_model<P: AsRef<Path>>(&self, path: P) -> Result<(), ConformalError> {
        fs::write(path, self.json_dump()?).map_err(|e| ConformalError::UnableToWrite(e.to_string()))
    }

    /// Dump a model as a json object
    fn json_dump(&self) -> Result<String, ConformalError> {
        serde_json::to_string(self).map_err(|e| ConformalError::UnableToWrite(e.to_string()))
    }

    /// Load a model from Json string
    ///
    /// * `json_str` - String object, which can be serialized to json.
    fn from_json(json_str: &str) -> Result<Self, ConformalError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| ConformalError::UnableToRead(e.to_string()))
    }

    /// Load a model from a path to a json model object.
    ///
    /// * `path` - Path to load model from.
    fn load_model<P: AsRef<Path>>(path: P) -> Result<Self, ConformalError> {
        let json_str = fs::read_to_string(path).map_err(|e| ConformalError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}
