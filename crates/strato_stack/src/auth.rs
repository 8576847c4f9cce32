//! The `auth` placeholder namespace.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use strato_template::{DataBag, Extension, TemplateResult, Token};

/// Per-provider credential properties, e.g.
/// `aws: { access-key: ..., secret-key: ... }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub providers: BTreeMap<String, BTreeMap<String, String>>,
}

/// `${auth:provider.property}` — provider credential lookup.
pub struct AuthExtension {
    config: AuthConfig,
}

impl AuthExtension {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }
}

impl Extension for AuthExtension {
    fn namespace(&self) -> &str {
        "auth"
    }

    fn resolve(&self, token: &Token, _bag: &DataBag) -> TemplateResult<Option<String>> {
        token.require_segments(2)?;
        let provider = &token.path[0];
        let property = &token.path[1];

        let value = self
            .config
            .providers
            .get(provider)
            .and_then(|props| props.get(property));

        match value {
            Some(value) => Ok(Some(value.clone())),
            None => match &token.default {
                Some(default) => Ok(Some(default.clone())),
                None => Err(token.extension_error(format!(
                    "no credential '{property}' for provider '{provider}'"
                ))),
            },
        }
    }
}
