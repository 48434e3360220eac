use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpsboardError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
