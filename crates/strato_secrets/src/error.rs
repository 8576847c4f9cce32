//! Error types for the secrets store.

use thiserror::Error;

/// Result type alias for secrets operations.
pub type SecretsResult<T> = Result<T, SecretsError>;

/// Errors that can occur during secret lookup and administration.
#[derive(Error, Debug)]
pub enum SecretsError {
    #[error("Secret not found: '{name}' (searched: {})", searched.join(", "))]
    SecretNotFound { name: String, searched: Vec<String> },

    #[error("Environment not found in secrets descriptor: {0}")]
    EnvironmentNotFound(String),

    #[error("Unsupported secrets schema version: {0}")]
    UnsupportedSchemaVersion(String),

    #[error("Invalid encrypted value for secret '{name}': {message}")]
    InvalidValue { name: String, message: String },

    #[error("Crypto error: {0}")]
    Crypto(#[from] strato_crypto::CryptoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
