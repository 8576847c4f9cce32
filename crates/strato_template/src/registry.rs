//! Extension registry and request-scoped data bag.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::TemplateResult;
use crate::token::Token;

/// Request-scoped values available to extensions during one resolution pass.
///
/// Well-known keys used by the built-in extensions and the crates layered on
/// top of this engine:
/// - [`bag_keys::ENVIRONMENT`] — ambient deploy environment
/// - [`bag_keys::STACK_NAME`] — name of the stack being resolved
/// - [`bag_keys::PROJECT_DIR`] — directory the `git`/`project` namespaces
///   operate in (defaults to the process working directory)
pub type DataBag = HashMap<String, Value>;

/// Well-known [`DataBag`] keys.
pub mod bag_keys {
    pub const ENVIRONMENT: &str = "environment";
    pub const STACK_NAME: &str = "stack_name";
    pub const PROJECT_DIR: &str = "project_dir";
}

/// Read a string value out of the data bag.
pub fn bag_str<'a>(bag: &'a DataBag, key: &str) -> Option<&'a str> {
    bag.get(key).and_then(Value::as_str)
}

/// A named resolver for one placeholder namespace.
pub trait Extension: Send + Sync {
    /// The namespace this extension answers to (e.g. `secret`, `env`).
    fn namespace(&self) -> &str;

    /// Resolve one token.
    ///
    /// Returns `Ok(Some(value))` when resolved, `Ok(None)` when the token is
    /// not applicable to this extension and should be left intact for
    /// another engine pass, or an error for malformed/unresolvable tokens.
    fn resolve(&self, token: &Token, bag: &DataBag) -> TemplateResult<Option<String>>;
}

/// A registry of placeholder extensions.
///
/// Constructed explicitly at process start and passed by reference into the
/// resolution pipeline; there is no global registry.
#[derive(Default, Clone)]
pub struct ExtensionRegistry {
    extensions: HashMap<String, Arc<dyn Extension>>,
}

impl ExtensionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            extensions: HashMap::new(),
        }
    }

    /// Register an extension under its `namespace()` identifier.
    ///
    /// A later registration for the same namespace replaces the earlier one.
    pub fn register(&mut self, extension: Arc<dyn Extension>) {
        let namespace = extension.namespace().to_string();
        debug!("Registering template extension: {}", namespace);
        self.extensions.insert(namespace, extension);
    }

    /// Get the extension for a namespace.
    pub fn get(&self, namespace: &str) -> Option<Arc<dyn Extension>> {
        self.extensions.get(namespace).cloned()
    }

    /// Check whether a namespace is registered.
    pub fn contains(&self, namespace: &str) -> bool {
        self.extensions.contains_key(namespace)
    }

    /// All registered namespaces.
    pub fn namespaces(&self) -> Vec<&str> {
        self.extensions.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}
