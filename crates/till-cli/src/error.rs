use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] till_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No operations found in {0}")]
    EmptyBatch(String),
    #[error("Expected an operation object or an array of operations")]
    InvalidBatch,
    #[error("{0} ID cannot be empty")]
    EmptyId(&'static str),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}
