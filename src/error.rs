use std::{io, path::PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors from fetching data, training, and model persistence.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] ureq::Error),

    #[error("Malformed ChEMBL payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unable to encode model: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Unable to decode model {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::error::DecodeError,
    },

    #[error("Invalid config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("No usable rows: every record was missing data or failed descriptor calculation")]
    EmptyDataset,

    #[error("Too few usable rows to train and evaluate: found {found}, need at least {required}")]
    TooFewSamples { found: usize, required: usize },
}
