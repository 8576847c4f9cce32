//! Placeholder token parsing.

use crate::error::{TemplateError, TemplateResult};

/// One parsed `${namespace:path[:default]}` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The full token text including `${` and `}`.
    pub raw: String,
    /// Namespace before the first `:`.
    pub namespace: String,
    /// Dotted path segments between the first and second `:`.
    pub path: Vec<String>,
    /// Everything after the second `:`, if present. Most namespaces treat
    /// this as a literal default; `secret` interprets it as an explicit
    /// environment override.
    pub default: Option<String>,
}

impl Token {
    /// Parse the inside of a `${...}` token.
    ///
    /// Returns `None` for content that is not in `namespace:path` form
    /// (no colon); such text is passed through verbatim so inputs using a
    /// different `${...}` dialect are not mangled.
    pub fn parse(content: &str) -> Option<Self> {
        let mut parts = content.splitn(3, ':');
        let namespace = parts.next()?.trim();
        let path = parts.next()?.trim();
        if namespace.is_empty() || path.is_empty() {
            return None;
        }
        let default = parts.next().map(|s| s.to_string());

        Some(Self {
            raw: format!("${{{content}}}"),
            namespace: namespace.to_string(),
            path: path.split('.').map(|s| s.to_string()).collect(),
            default,
        })
    }

    /// Path segments as string slices.
    pub fn segments(&self) -> Vec<&str> {
        self.path.iter().map(|s| s.as_str()).collect()
    }

    /// Require an exact number of path segments.
    ///
    /// Wrong segment counts are a typed error, never an index panic further
    /// down the line.
    pub fn require_segments(&self, expected: usize) -> TemplateResult<()> {
        if self.path.len() != expected {
            return Err(TemplateError::MalformedPlaceholder {
                token: self.raw.clone(),
                expected,
                actual: self.path.len(),
            });
        }
        Ok(())
    }

    /// Build an unresolved-placeholder error naming this exact token.
    pub fn unresolved(&self) -> TemplateError {
        TemplateError::UnresolvedPlaceholder {
            token: self.raw.clone(),
        }
    }

    /// Build an extension error for this token.
    pub fn extension_error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Extension {
            namespace: self.namespace.clone(),
            token: self.raw.clone(),
            message: message.into(),
        }
    }
}
