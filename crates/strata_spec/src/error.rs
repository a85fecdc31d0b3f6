//! Error types for environment loading.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for spec operations.
pub type SpecResult<T> = Result<T, SpecError>;

/// Errors that can occur while loading or validating an environment descriptor.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("Environment file not found at path: {0}")]
    NotFound(PathBuf),

    #[error("Invalid environment format in file {path}: {message}")]
    InvalidFormat { path: PathBuf, message: String },

    #[error("Environment validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
