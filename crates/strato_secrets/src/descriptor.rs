//! Versioned secrets descriptor models and lookup order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{SecretsError, SecretsResult};

pub const SCHEMA_V1: &str = "1.0";
pub const SCHEMA_V2: &str = "2.0";

/// Pseudo-environment name used in "searched" diagnostics for the shared
/// values map.
const SHARED_SCOPE: &str = "(shared)";

/// Secrets scoped to one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSecrets {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// The versioned secrets document.
///
/// A v1.0 document holds only shared `values`; v2.0 adds per-environment
/// maps. A v1.0 document is a valid v2.0 document with an empty
/// `environments` map, so the field is never required on read and is
/// omitted on write while empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretsDescriptor {
    #[serde(rename = "schemaVersion", default = "default_schema_version")]
    pub schema_version: String,

    /// Shared encrypted values, the fallback for every environment.
    #[serde(default)]
    pub values: BTreeMap<String, String>,

    /// Environment-scoped encrypted values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: BTreeMap<String, EnvironmentSecrets>,
}

fn default_schema_version() -> String {
    SCHEMA_V1.to_string()
}

impl Default for SecretsDescriptor {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_V2.to_string(),
            values: BTreeMap::new(),
            environments: BTreeMap::new(),
        }
    }
}

impl SecretsDescriptor {
    /// Validate the schema version.
    pub fn validate(&self) -> SecretsResult<()> {
        match self.schema_version.as_str() {
            SCHEMA_V1 | SCHEMA_V2 => Ok(()),
            other => Err(SecretsError::UnsupportedSchemaVersion(other.to_string())),
        }
    }

    /// Look up the encrypted value for `name`.
    ///
    /// Order: an explicit environment restricts the search to that
    /// environment only; otherwise the ambient environment's values take
    /// precedence and the shared map is the fallback. The error lists every
    /// scope that was searched.
    pub fn lookup<'a>(
        &'a self,
        name: &str,
        ambient_env: Option<&str>,
        explicit_env: Option<&str>,
    ) -> SecretsResult<&'a str> {
        let mut searched = Vec::new();

        if let Some(env) = explicit_env {
            searched.push(env.to_string());
            return self
                .environments
                .get(env)
                .and_then(|scope| scope.values.get(name))
                .map(String::as_str)
                .ok_or(SecretsError::SecretNotFound {
                    name: name.to_string(),
                    searched,
                });
        }

        if let Some(env) = ambient_env {
            if let Some(scope) = self.environments.get(env) {
                searched.push(env.to_string());
                if let Some(value) = scope.values.get(name) {
                    return Ok(value);
                }
            }
        }

        searched.push(SHARED_SCOPE.to_string());
        self.values
            .get(name)
            .map(String::as_str)
            .ok_or(SecretsError::SecretNotFound {
                name: name.to_string(),
                searched,
            })
    }
}
