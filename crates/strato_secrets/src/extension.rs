//! The `secret` placeholder namespace.

use std::sync::Arc;

use strato_crypto::PrivateKey;
use strato_template::{bag_keys, bag_str, DataBag, Extension, TemplateResult, Token};

use crate::descriptor::SecretsDescriptor;
use crate::store::get_secret_value;

/// `${secret:NAME}` / `${secret:NAME:ENVIRONMENT}`.
///
/// The third segment is an explicit environment override, not a default:
/// `${secret:API_KEY:prod}` resolves `API_KEY` from the `prod` environment
/// even when the ambient environment differs. The ambient environment comes
/// from the data bag.
pub struct SecretExtension {
    descriptor: SecretsDescriptor,
    private_key: Arc<PrivateKey>,
}

impl SecretExtension {
    pub fn new(descriptor: SecretsDescriptor, private_key: Arc<PrivateKey>) -> Self {
        Self {
            descriptor,
            private_key,
        }
    }
}

impl Extension for SecretExtension {
    fn namespace(&self) -> &str {
        "secret"
    }

    fn resolve(&self, token: &Token, bag: &DataBag) -> TemplateResult<Option<String>> {
        token.require_segments(1)?;
        let name = &token.path[0];
        let ambient_env = bag_str(bag, bag_keys::ENVIRONMENT);
        let explicit_env = token.default.as_deref();

        get_secret_value(
            &self.descriptor,
            name,
            ambient_env,
            explicit_env,
            &self.private_key,
        )
        .map(Some)
        .map_err(|e| token.extension_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use strato_crypto::generate_curve_keypair;
    use strato_template::{resolve, ExtensionRegistry};

    use crate::store::SecretsStore;

    fn fixture() -> (ExtensionRegistry, Arc<PrivateKey>) {
        let dir = tempfile::tempdir().unwrap();
        let store = SecretsStore::new(dir.path().join("secrets.yaml"));
        let (public, private) = generate_curve_keypair();

        store.add_secret("TOKEN", "shared-token", None, &public).unwrap();
        store.add_secret("TOKEN", "e1-token", Some("e1"), &public).unwrap();
        store.add_secret("TOKEN", "e2-token", Some("e2"), &public).unwrap();

        let private = Arc::new(private);
        let mut registry = ExtensionRegistry::new();
        registry.register(Arc::new(SecretExtension::new(
            store.load().unwrap(),
            private.clone(),
        )));
        (registry, private)
    }

    fn bag_for(env: &str) -> DataBag {
        let mut bag = DataBag::new();
        bag.insert(
            bag_keys::ENVIRONMENT.to_string(),
            Value::String(env.to_string()),
        );
        bag
    }

    #[test]
    fn ambient_environments_resolve_different_values() {
        let (registry, _) = fixture();
        let v1 = resolve("${secret:TOKEN}", &bag_for("e1"), &registry).unwrap();
        let v2 = resolve("${secret:TOKEN}", &bag_for("e2"), &registry).unwrap();
        assert_eq!(v1, "e1-token");
        assert_eq!(v2, "e2-token");
        assert_ne!(v1, v2);
    }

    #[test]
    fn explicit_override_beats_ambient_environment() {
        let (registry, _) = fixture();
        let out = resolve("${secret:TOKEN:e2}", &bag_for("e1"), &registry).unwrap();
        assert_eq!(out, "e2-token");
    }

    #[test]
    fn missing_secret_surfaces_searched_scopes() {
        let (registry, _) = fixture();
        let err = resolve("${secret:ABSENT}", &bag_for("e1"), &registry).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("ABSENT"), "got: {message}");
        assert!(message.contains("(shared)"), "got: {message}");
    }
}
