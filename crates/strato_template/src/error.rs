//! Error types for placeholder resolution.

use thiserror::Error;

/// Result type alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while resolving placeholders.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Unresolved placeholder: {token}")]
    UnresolvedPlaceholder { token: String },

    #[error("Malformed placeholder {token}: expected {expected} path segment(s), got {actual}")]
    MalformedPlaceholder {
        token: String,
        expected: usize,
        actual: usize,
    },

    #[error("Extension '{namespace}' failed for {token}: {message}")]
    Extension {
        namespace: String,
        token: String,
        message: String,
    },
}
