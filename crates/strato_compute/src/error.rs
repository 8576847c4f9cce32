//! Error types for compute context collection.

use thiserror::Error;

/// Result type alias for compute operations.
pub type ComputeResult<T> = Result<T, ComputeError>;

/// Errors that can occur while binding cross-stack resources.
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("Required output '{export_key}' of {reference} is missing or empty")]
    EmptyRequiredOutput {
        export_key: String,
        reference: String,
    },

    #[error("Invalid stack reference '{0}': expected organization/project/stackName")]
    InvalidReference(String),

    #[error("No compute processor registered for resource type: {0}")]
    ProcessorNotFound(String),

    #[error("State backend failed for {reference}: {message}")]
    StateBackend { reference: String, message: String },

    #[error("Remote command against {endpoint} failed: {message}")]
    RemoteCommand { endpoint: String, message: String },

    #[error("Template error: {0}")]
    Template(#[from] strato_template::TemplateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
