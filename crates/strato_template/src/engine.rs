//! Single-pass placeholder resolution.

use tracing::{debug, trace};

use crate::error::TemplateResult;
use crate::registry::{DataBag, ExtensionRegistry};
use crate::token::Token;

/// Resolve every well-formed `${namespace:path[:default]}` token in `input`.
///
/// Resolution is one pass, left to right, non-recursive: substituted values
/// are never re-scanned, so re-resolving an already-resolved string is a
/// no-op. Tokens an extension declares not applicable are left intact for a
/// later pass by another engine over the same input.
///
/// A token whose namespace has no registered extension resolves to its
/// literal default when one is present, and fails with an
/// unresolved-placeholder error otherwise.
pub fn resolve(
    input: &str,
    bag: &DataBag,
    registry: &ExtensionRegistry,
) -> TemplateResult<String> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        let Some(end) = after_open.find('}') else {
            // Unterminated token; pass the tail through verbatim.
            output.push_str(&rest[start..]);
            return Ok(output);
        };

        let content = &after_open[..end];
        match Token::parse(content) {
            Some(token) => {
                let resolved = resolve_token(&token, bag, registry)?;
                output.push_str(&resolved);
            }
            None => {
                // Not our dialect (no namespace separator); keep verbatim.
                output.push_str(&rest[start..start + 2 + end + 1]);
            }
        }

        rest = &after_open[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

fn resolve_token(
    token: &Token,
    bag: &DataBag,
    registry: &ExtensionRegistry,
) -> TemplateResult<String> {
    match registry.get(&token.namespace) {
        Some(extension) => match extension.resolve(token, bag)? {
            Some(value) => {
                trace!(token = %token.raw, "Resolved placeholder");
                Ok(value)
            }
            // Not applicable to this extension set; leave for another pass.
            None => {
                debug!(token = %token.raw, "Placeholder left for another pass");
                Ok(token.raw.clone())
            }
        },
        None => match &token.default {
            Some(default) => {
                debug!(
                    token = %token.raw,
                    "No extension for namespace, using literal default"
                );
                Ok(default.clone())
            }
            None => Err(token.unresolved()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TemplateError;
    use crate::registry::Extension;
    use std::sync::Arc;

    struct MapExtension {
        namespace: &'static str,
        entries: Vec<(&'static str, &'static str)>,
    }

    impl Extension for MapExtension {
        fn namespace(&self) -> &str {
            self.namespace
        }

        fn resolve(&self, token: &Token, _bag: &DataBag) -> TemplateResult<Option<String>> {
            let key = token.path.join(".");
            Ok(self
                .entries
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string()))
        }
    }

    fn registry_with(ext: MapExtension) -> ExtensionRegistry {
        let mut registry = ExtensionRegistry::new();
        registry.register(Arc::new(ext));
        registry
    }

    #[test]
    fn resolves_registered_namespace() {
        let registry = registry_with(MapExtension {
            namespace: "resource",
            entries: vec![("db.endpoint", "pg.internal:5432")],
        });

        let out = resolve(
            "host=${resource:db.endpoint} tail",
            &DataBag::new(),
            &registry,
        )
        .unwrap();
        assert_eq!(out, "host=pg.internal:5432 tail");
    }

    #[test]
    fn unregistered_namespace_with_default_never_errors() {
        let registry = ExtensionRegistry::new();
        let out = resolve("${nothere:some.path:fallback}", &DataBag::new(), &registry).unwrap();
        assert_eq!(out, "fallback");
    }

    #[test]
    fn unregistered_namespace_without_default_fails_naming_the_token() {
        let registry = ExtensionRegistry::new();
        let err = resolve("${nothere:some.path}", &DataBag::new(), &registry).unwrap_err();
        match err {
            TemplateError::UnresolvedPlaceholder { token } => {
                assert_eq!(token, "${nothere:some.path}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn not_applicable_token_is_left_for_another_pass() {
        let registry = registry_with(MapExtension {
            namespace: "resource",
            entries: vec![],
        });

        let out = resolve("${resource:other.engine}", &DataBag::new(), &registry).unwrap();
        assert_eq!(out, "${resource:other.engine}");
    }

    #[test]
    fn resolution_is_idempotent() {
        let registry = registry_with(MapExtension {
            namespace: "resource",
            entries: vec![("db.pass", "p$w{d}")],
        });

        let once = resolve("v=${resource:db.pass}", &DataBag::new(), &registry).unwrap();
        let twice = resolve(&once, &DataBag::new(), &registry).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        // A resolved value that itself looks like a token must not be
        // resolved recursively.
        let registry = registry_with(MapExtension {
            namespace: "resource",
            entries: vec![("a.b", "${resource:a.b}")],
        });

        let out = resolve("${resource:a.b}", &DataBag::new(), &registry).unwrap();
        assert_eq!(out, "${resource:a.b}");
    }

    #[test]
    fn foreign_dialect_tokens_pass_through() {
        let registry = ExtensionRegistry::new();
        let input = "name=${metadata.name} {{ jinja }} $HOME";
        assert_eq!(resolve(input, &DataBag::new(), &registry).unwrap(), input);
    }

    #[test]
    fn unterminated_token_passes_through() {
        let registry = ExtensionRegistry::new();
        let input = "prefix ${env:HOME";
        assert_eq!(resolve(input, &DataBag::new(), &registry).unwrap(), input);
    }

    #[test]
    fn multiple_tokens_resolve_left_to_right() {
        let registry = registry_with(MapExtension {
            namespace: "resource",
            entries: vec![("a.x", "1"), ("b.y", "2")],
        });

        let out = resolve(
            "${resource:a.x}-${resource:b.y}-${missing:z:3}",
            &DataBag::new(),
            &registry,
        )
        .unwrap();
        assert_eq!(out, "1-2-3");
    }
}
