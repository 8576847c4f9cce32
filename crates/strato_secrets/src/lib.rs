//! # strato_secrets
//!
//! Versioned, environment-scoped, encrypted secrets for strato stacks.
//!
//! The descriptor file (`secrets.yaml`) holds shared and per-environment
//! values encrypted with the stack's public key. Lookup order is fixed:
//! an explicit environment override beats the ambient environment, which
//! beats the shared values; shared values are a fallback only.
//!
//! Administrative operations (add/list/delete) touch only the affected
//! ciphertext so descriptor diffs stay minimal.

pub mod descriptor;
pub mod error;
pub mod extension;
pub mod store;

pub use descriptor::{EnvironmentSecrets, SecretsDescriptor, SCHEMA_V1, SCHEMA_V2};
pub use error::{SecretsError, SecretsResult};
pub use extension::SecretExtension;
pub use store::{get_secret_value, SecretsListing, SecretsStore};
