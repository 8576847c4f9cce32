//! Compute processor trait and registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use strato_stack::{DeployParams, ResourceDescriptor};

use crate::collector::ComputeContextCollector;
use crate::error::{ComputeError, ComputeResult};
use crate::reference::StackReference;

/// Provider-specific code that turns a *used* resource's published outputs
/// into environment variables and template extensions for the consuming
/// stack.
///
/// Invoked once per resource the current deploy uses. Missing or empty
/// required outputs are returned as errors, never panics, and never
/// silently defaulted.
#[async_trait]
pub trait ComputeProcessor: Send + Sync {
    /// The resource `type` tag this processor handles.
    fn resource_type(&self) -> &str;

    async fn process(
        &self,
        descriptor: &ResourceDescriptor,
        owner: &StackReference,
        params: &DeployParams,
        collector: &ComputeContextCollector,
    ) -> ComputeResult<()>;
}

impl std::fmt::Debug for dyn ComputeProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeProcessor")
            .field("resource_type", &self.resource_type())
            .finish()
    }
}

/// A registry of compute processors, keyed by resource type.
///
/// Constructed explicitly at process start and passed into the
/// orchestrator; no init-time side effects.
#[derive(Default, Clone)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn ComputeProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    pub fn register(&mut self, processor: Arc<dyn ComputeProcessor>) {
        let resource_type = processor.resource_type().to_string();
        debug!("Registering compute processor: {}", resource_type);
        self.processors.insert(resource_type, processor);
    }

    pub fn get(&self, resource_type: &str) -> Option<Arc<dyn ComputeProcessor>> {
        self.processors.get(resource_type).cloned()
    }

    pub fn get_required(&self, resource_type: &str) -> ComputeResult<Arc<dyn ComputeProcessor>> {
        self.get(resource_type)
            .ok_or_else(|| ComputeError::ProcessorNotFound(resource_type.to_string()))
    }

    pub fn contains(&self, resource_type: &str) -> bool {
        self.processors.contains_key(resource_type)
    }

    pub fn types(&self) -> Vec<&str> {
        self.processors.keys().map(|s| s.as_str()).collect()
    }
}

/// Deterministic env-var name for one resource field.
///
/// `qualified("BUCKET_NAME", "logs")` is `BUCKET_NAME_LOGS`; the generic
/// form is the bare prefix, claimed first-wins when several resources of
/// one kind are in scope.
pub fn qualified_env_name(prefix: &str, resource_name: &str) -> String {
    let mut suffix = String::with_capacity(resource_name.len());
    for c in resource_name.chars() {
        if c.is_ascii_alphanumeric() {
            suffix.push(c.to_ascii_uppercase());
        } else {
            suffix.push('_');
        }
    }
    format!("{prefix}_{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names_are_deterministic_and_distinct() {
        assert_eq!(qualified_env_name("BUCKET_NAME", "logs"), "BUCKET_NAME_LOGS");
        assert_eq!(
            qualified_env_name("BUCKET_NAME", "user-assets"),
            "BUCKET_NAME_USER_ASSETS"
        );
        assert_ne!(
            qualified_env_name("BUCKET_NAME", "logs"),
            qualified_env_name("BUCKET_NAME", "assets")
        );
    }

    #[test]
    fn registry_reports_missing_processor_types() {
        let registry = ProcessorRegistry::new();
        assert!(matches!(
            registry.get_required("bucket").unwrap_err(),
            ComputeError::ProcessorNotFound(_)
        ));
    }
}
