//! The `resource` and `dependency` placeholder namespaces.

use std::collections::BTreeMap;
use std::sync::Arc;

use strato_stack::DeployParams;
use strato_template::{DataBag, Extension, TemplateResult, Token};

use crate::collector::ComputeContextCollector;

/// `${resource:<resourceName>.<fieldName>}` — fields registered on the
/// current deploy's collector by compute processors.
pub struct ResourceExtension {
    collector: Arc<ComputeContextCollector>,
}

impl ResourceExtension {
    pub fn new(collector: Arc<ComputeContextCollector>) -> Self {
        Self { collector }
    }
}

impl Extension for ResourceExtension {
    fn namespace(&self) -> &str {
        "resource"
    }

    fn resolve(&self, token: &Token, _bag: &DataBag) -> TemplateResult<Option<String>> {
        token.require_segments(2)?;
        let resource = &token.path[0];
        let field = &token.path[1];

        let extensions = self.collector.tpl_extensions();
        match extensions.get(resource).and_then(|fields| fields.get(field)) {
            Some(value) => Ok(Some(value.clone())),
            None => match &token.default {
                Some(default) => Ok(Some(default.clone())),
                None => Err(token.extension_error(format!(
                    "no template extension registered for '{resource}.{field}'"
                ))),
            },
        }
    }
}

/// One named dependency's exported compute context.
#[derive(Debug, Clone)]
pub struct DependencyOutputs {
    pub stack_name: String,
    pub outputs: Arc<BTreeMap<String, String>>,
}

/// `${dependency:<name>.<resource>.<property>}` — outputs another stack
/// exported, addressed by dependency name and the deterministic export key
/// `{stackName}-{resource}-{property}`.
#[derive(Default)]
pub struct DependencyExtension {
    entries: BTreeMap<String, DependencyOutputs>,
}

impl DependencyExtension {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        name: impl Into<String>,
        stack_name: impl Into<String>,
        outputs: Arc<BTreeMap<String, String>>,
    ) {
        self.entries.insert(
            name.into(),
            DependencyOutputs {
                stack_name: stack_name.into(),
                outputs,
            },
        );
    }
}

impl Extension for DependencyExtension {
    fn namespace(&self) -> &str {
        "dependency"
    }

    fn resolve(&self, token: &Token, _bag: &DataBag) -> TemplateResult<Option<String>> {
        token.require_segments(3)?;
        let name = &token.path[0];
        let resource = &token.path[1];
        let property = &token.path[2];

        let Some(dependency) = self.entries.get(name) else {
            return match &token.default {
                Some(default) => Ok(Some(default.clone())),
                None => Err(token.extension_error(format!("unknown dependency '{name}'"))),
            };
        };

        let export_key = DeployParams::export_key(&dependency.stack_name, resource, property);
        match dependency.outputs.get(&export_key) {
            Some(value) if !value.is_empty() => Ok(Some(value.clone())),
            _ => match &token.default {
                Some(default) => Ok(Some(default.clone())),
                None => Err(token.extension_error(format!(
                    "required output '{export_key}' is missing or empty"
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::MemoryStateBackend;
    use strato_template::{resolve, ExtensionRegistry, TemplateError};

    fn dependency_registry() -> ExtensionRegistry {
        let outputs = Arc::new(BTreeMap::from([
            ("infra-db-endpoint".to_string(), "pg.internal:5432".to_string()),
            ("infra-db-password".to_string(), String::new()),
        ]));
        let mut extension = DependencyExtension::new();
        extension.add("infra", "infra", outputs);

        let mut registry = ExtensionRegistry::new();
        registry.register(Arc::new(extension));
        registry
    }

    #[test]
    fn dependency_resolves_through_export_keys() {
        let out = resolve(
            "${dependency:infra.db.endpoint}",
            &DataBag::new(),
            &dependency_registry(),
        )
        .unwrap();
        assert_eq!(out, "pg.internal:5432");
    }

    #[test]
    fn dependency_with_too_few_segments_is_malformed() {
        let err = resolve(
            "${dependency:infra.db}",
            &DataBag::new(),
            &dependency_registry(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TemplateError::MalformedPlaceholder {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn empty_dependency_output_is_an_error_naming_the_key() {
        let err = resolve(
            "${dependency:infra.db.password}",
            &DataBag::new(),
            &dependency_registry(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("infra-db-password"), "{err}");
    }

    #[test]
    fn resource_extension_reads_collector_registrations() {
        let collector = Arc::new(ComputeContextCollector::new(Arc::new(
            MemoryStateBackend::new(),
        )));
        collector.add_resource_tpl_extension(
            "logs",
            BTreeMap::from([("bucket".to_string(), "acme-logs".to_string())]),
        );

        let mut registry = ExtensionRegistry::new();
        registry.register(Arc::new(ResourceExtension::new(collector)));

        let out = resolve("${resource:logs.bucket}", &DataBag::new(), &registry).unwrap();
        assert_eq!(out, "acme-logs");

        let err = resolve("${resource:logs}", &DataBag::new(), &registry).unwrap_err();
        assert!(matches!(err, TemplateError::MalformedPlaceholder { .. }));
    }
}
