//! Error types for IaC module.

use std::path::PathBuf;

use thiserror::Error;

use strata_spec::SpecError;

/// Result type alias for IaC operations.
pub type IacResult<T> = Result<T, IacError>;

/// Errors that can occur while declaring or synthesizing resources.
#[derive(Error, Debug)]
pub enum IacError {
    #[error("Configuration error: {0}")]
    Spec(#[from] SpecError),

    #[error("Invalid CIDR block '{cidr}': {message}")]
    InvalidCidr { cidr: String, message: String },

    #[error("User data script not found: {0}")]
    ScriptNotFound(PathBuf),

    #[error("Invalid name '{name}': {message}")]
    InvalidName { name: String, message: String },

    #[error("Missing credential: environment variable {variable} is not set")]
    MissingCredential { variable: String },

    #[error("{kind} not found: {id}")]
    ResourceNotFound { kind: String, id: String },

    #[error("Duplicate {kind}: {id}")]
    Duplicate { kind: String, id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Coarse error classes surfaced to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    MissingCredential,
    ResourceNotFound,
    Other,
}

impl IacError {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        IacError::ResourceNotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            IacError::Spec(_)
            | IacError::InvalidCidr { .. }
            | IacError::ScriptNotFound(_)
            | IacError::InvalidName { .. }
            | IacError::Duplicate { .. }
            | IacError::Yaml(_) => ErrorCategory::Config,
            IacError::MissingCredential { .. } => ErrorCategory::MissingCredential,
            IacError::ResourceNotFound { .. } => ErrorCategory::ResourceNotFound,
            IacError::Io(_) | IacError::Json(_) => ErrorCategory::Other,
        }
    }
}
