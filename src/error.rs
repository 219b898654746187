use std::path::PathBuf;

use thiserror::Error;

use crate::forge::{ForgeError, ItemKind};
use crate::input::InputError;

/// Minimum number of records an export needs before it is usable for training.
pub const MIN_TRAINING_RECORDS: usize = 10;

#[derive(Debug, Error)]
pub enum LabelerError {
    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Forge error: {0}")]
    Forge(#[from] ForgeError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failures of the scoring backend.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("model endpoint returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to parse model response: {0}")]
    Parse(String),

    #[error("no model configured for {0}")]
    NoModel(ItemKind),
}

/// Faults in tabular export files.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("data file '{}' does not exist", .0.display())]
    MissingFile(PathBuf),

    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "'{}' contains {found} records; at least {minimum} are required",
        path.display()
    )]
    InsufficientRecords {
        path: PathBuf,
        found: usize,
        minimum: usize,
    },

    #[error("line {line}: expected {expected} tab-separated columns, found {found}")]
    MalformedRow {
        line: usize,
        expected: usize,
        found: usize,
    },
}
