//! Resource-type registry.
//!
//! Maps each resource `type` tag to a decode+validate function so adding a
//! provider is a registration, not a `match` sprinkled through the engine.
//! Constructed explicitly at process start; no package-level state.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StackError, StackResult};
use crate::model::ResourceDescriptor;

/// Decode+validate function for one resource type's `config` payload.
pub type ConfigValidator = Box<dyn Fn(&serde_json::Value) -> Result<(), String> + Send + Sync>;

/// A registry of resource types known to this process.
#[derive(Default)]
pub struct ResourceTypeRegistry {
    validators: HashMap<String, ConfigValidator>,
}

impl ResourceTypeRegistry {
    pub fn new() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    /// Register a resource type with its config validator.
    pub fn register(&mut self, resource_type: impl Into<String>, validator: ConfigValidator) {
        let resource_type = resource_type.into();
        debug!("Registering resource type: {}", resource_type);
        self.validators.insert(resource_type, validator);
    }

    /// Register a resource type whose config decodes into `T`.
    pub fn register_typed<T: DeserializeOwned>(&mut self, resource_type: impl Into<String>) {
        self.register(
            resource_type,
            Box::new(|config| {
                serde_json::from_value::<T>(config.clone())
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }),
        );
    }

    pub fn contains(&self, resource_type: &str) -> bool {
        self.validators.contains_key(resource_type)
    }

    pub fn types(&self) -> Vec<&str> {
        self.validators.keys().map(|s| s.as_str()).collect()
    }

    /// Validate one descriptor against its registered type.
    pub fn validate(&self, descriptor: &ResourceDescriptor) -> StackResult<()> {
        let validator = self
            .validators
            .get(&descriptor.resource_type)
            .ok_or_else(|| StackError::UnknownResourceType(descriptor.resource_type.clone()))?;

        validator(&descriptor.config).map_err(|message| StackError::InvalidResourceConfig {
            resource_type: descriptor.resource_type.clone(),
            name: descriptor.name.clone(),
            message,
        })
    }

    /// Validate every descriptor in an environment.
    pub fn validate_all(&self, descriptors: &[ResourceDescriptor]) -> StackResult<()> {
        for descriptor in descriptors {
            self.validate(descriptor)?;
        }
        Ok(())
    }
}
