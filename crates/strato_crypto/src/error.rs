//! Error types for the crypto provider.

use thiserror::Error;

/// Result type alias for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while encrypting or decrypting secret payloads.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Failed to parse key: {0}")]
    KeyParse(String),

    #[error("RSA key too small: {bits} bits (minimum {minimum})")]
    KeyTooSmall { bits: usize, minimum: usize },

    #[error("Key family mismatch: ciphertext was produced for a {expected} key")]
    KeyMismatch { expected: &'static str },

    #[error("Ciphertext truncated: need at least {expected} bytes, got {actual}")]
    TruncatedPayload { expected: usize, actual: usize },

    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Decryption failed: {0}")]
    Decrypt(String),
}
