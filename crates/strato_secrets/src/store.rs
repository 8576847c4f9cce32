//! File-backed secrets store and administrative operations.
//!
//! The descriptor file is a single-writer resource per stack: callers
//! serialize administrative edits (one CLI invocation at a time against one
//! checkout); the store itself does not lock.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::{debug, info};

use strato_crypto::{decrypt, encrypt, PrivateKey, PublicKey};

use crate::descriptor::{EnvironmentSecrets, SecretsDescriptor, SCHEMA_V2};
use crate::error::{SecretsError, SecretsResult};

/// Decrypt the value of one secret, applying the environment lookup order.
///
/// `explicit_env` (the `${secret:NAME:ENV}` form) restricts the search to
/// that environment; otherwise `ambient_env` takes precedence over the
/// shared values.
pub fn get_secret_value(
    descriptor: &SecretsDescriptor,
    name: &str,
    ambient_env: Option<&str>,
    explicit_env: Option<&str>,
    private_key: &PrivateKey,
) -> SecretsResult<String> {
    let encrypted = descriptor.lookup(name, ambient_env, explicit_env)?;
    let ciphertext = BASE64
        .decode(encrypted)
        .map_err(|e| SecretsError::InvalidValue {
            name: name.to_string(),
            message: format!("not valid base64: {e}"),
        })?;
    let plaintext = decrypt(private_key, &ciphertext)?;
    String::from_utf8(plaintext).map_err(|e| SecretsError::InvalidValue {
        name: name.to_string(),
        message: format!("decrypted payload is not UTF-8: {e}"),
    })
}

/// Listing of secret names grouped by scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretsListing {
    pub shared: Vec<String>,
    pub environments: BTreeMap<String, Vec<String>>,
}

/// A secrets descriptor persisted as a YAML file.
#[derive(Debug, Clone)]
pub struct SecretsStore {
    path: PathBuf,
}

impl SecretsStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the descriptor; a missing file is an empty v2.0 descriptor.
    pub fn load(&self) -> SecretsResult<SecretsDescriptor> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No secrets file, starting empty");
            return Ok(SecretsDescriptor::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let descriptor: SecretsDescriptor = serde_yaml::from_str(&content)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Persist the descriptor atomically (write sibling + rename).
    pub fn save(&self, descriptor: &SecretsDescriptor) -> SecretsResult<()> {
        let content = serde_yaml::to_string(descriptor)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "Saved secrets descriptor");
        Ok(())
    }

    /// Add or replace one secret, optionally environment-scoped.
    ///
    /// Only the touched value is encrypted; every other ciphertext in the
    /// descriptor is left byte-identical. Adding the first
    /// environment-scoped secret upgrades the document to schema 2.0.
    pub fn add_secret(
        &self,
        name: &str,
        plaintext: &str,
        environment: Option<&str>,
        public_key: &PublicKey,
    ) -> SecretsResult<()> {
        let mut descriptor = self.load()?;
        let encrypted = BASE64.encode(encrypt(public_key, plaintext.as_bytes())?);

        match environment {
            Some(env) => {
                descriptor.schema_version = SCHEMA_V2.to_string();
                descriptor
                    .environments
                    .entry(env.to_string())
                    .or_insert_with(EnvironmentSecrets::default)
                    .values
                    .insert(name.to_string(), encrypted);
                info!(secret = name, environment = env, "Added secret");
            }
            None => {
                descriptor.values.insert(name.to_string(), encrypted);
                info!(secret = name, "Added shared secret");
            }
        }

        self.save(&descriptor)
    }

    /// Delete one secret, optionally environment-scoped.
    ///
    /// Removing the last value of an environment removes the environment
    /// entry entirely rather than leaving an empty map.
    pub fn delete_secret(&self, name: &str, environment: Option<&str>) -> SecretsResult<()> {
        let mut descriptor = self.load()?;

        match environment {
            Some(env) => {
                let scope = descriptor
                    .environments
                    .get_mut(env)
                    .ok_or_else(|| SecretsError::EnvironmentNotFound(env.to_string()))?;
                if scope.values.remove(name).is_none() {
                    return Err(SecretsError::SecretNotFound {
                        name: name.to_string(),
                        searched: vec![env.to_string()],
                    });
                }
                if scope.values.is_empty() {
                    descriptor.environments.remove(env);
                    debug!(environment = env, "Removed now-empty environment entry");
                }
                info!(secret = name, environment = env, "Deleted secret");
            }
            None => {
                if descriptor.values.remove(name).is_none() {
                    return Err(SecretsError::SecretNotFound {
                        name: name.to_string(),
                        searched: vec!["(shared)".to_string()],
                    });
                }
                info!(secret = name, "Deleted shared secret");
            }
        }

        self.save(&descriptor)
    }

    /// List secret names grouped by scope.
    pub fn list_secrets(&self) -> SecretsResult<SecretsListing> {
        let descriptor = self.load()?;
        Ok(SecretsListing {
            shared: descriptor.values.keys().cloned().collect(),
            environments: descriptor
                .environments
                .iter()
                .map(|(env, scope)| (env.clone(), scope.values.keys().cloned().collect()))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strato_crypto::generate_curve_keypair;

    fn store() -> (tempfile::TempDir, SecretsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SecretsStore::new(dir.path().join("secrets.yaml"));
        (dir, store)
    }

    #[test]
    fn add_and_resolve_round_trip() {
        let (_dir, store) = store();
        let (public, private) = generate_curve_keypair();

        store.add_secret("API_KEY", "shared-value", None, &public).unwrap();
        store
            .add_secret("API_KEY", "prod-value", Some("prod"), &public)
            .unwrap();

        let desc = store.load().unwrap();
        assert_eq!(
            get_secret_value(&desc, "API_KEY", Some("prod"), None, &private).unwrap(),
            "prod-value"
        );
        assert_eq!(
            get_secret_value(&desc, "API_KEY", Some("staging"), None, &private).unwrap(),
            "shared-value"
        );
        assert_eq!(
            get_secret_value(&desc, "API_KEY", Some("staging"), Some("prod"), &private).unwrap(),
            "prod-value"
        );
    }

    #[test]
    fn adding_a_secret_does_not_reencrypt_others() {
        let (_dir, store) = store();
        let (public, _) = generate_curve_keypair();

        store.add_secret("FIRST", "one", None, &public).unwrap();
        let before = store.load().unwrap().values.get("FIRST").cloned().unwrap();

        store.add_secret("SECOND", "two", None, &public).unwrap();
        store.add_secret("THIRD", "three", Some("prod"), &public).unwrap();

        let after = store.load().unwrap().values.get("FIRST").cloned().unwrap();
        assert_eq!(before, after, "untouched ciphertext must not churn");
    }

    #[test]
    fn deleting_last_env_value_removes_the_environment() {
        let (_dir, store) = store();
        let (public, _) = generate_curve_keypair();

        store.add_secret("ONLY", "v", Some("beta"), &public).unwrap();
        assert!(store.load().unwrap().environments.contains_key("beta"));

        store.delete_secret("ONLY", Some("beta")).unwrap();
        let desc = store.load().unwrap();
        assert!(!desc.environments.contains_key("beta"));
    }

    #[test]
    fn deleting_unknown_secret_is_an_error() {
        let (_dir, store) = store();
        let (public, _) = generate_curve_keypair();
        store.add_secret("A", "v", None, &public).unwrap();

        assert!(matches!(
            store.delete_secret("B", None).unwrap_err(),
            SecretsError::SecretNotFound { .. }
        ));
        assert!(matches!(
            store.delete_secret("A", Some("prod")).unwrap_err(),
            SecretsError::EnvironmentNotFound(_)
        ));
    }

    #[test]
    fn listing_groups_by_scope() {
        let (_dir, store) = store();
        let (public, _) = generate_curve_keypair();

        store.add_secret("SHARED", "v", None, &public).unwrap();
        store.add_secret("PROD_ONLY", "v", Some("prod"), &public).unwrap();

        let listing = store.list_secrets().unwrap();
        assert_eq!(listing.shared, vec!["SHARED".to_string()]);
        assert_eq!(
            listing.environments.get("prod").unwrap(),
            &vec!["PROD_ONLY".to_string()]
        );
    }
}
