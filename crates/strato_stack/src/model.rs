//! Stack, deploy and resource models.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StackError, StackResult};

/// One provider-specific resource declaration.
///
/// `config` is a polymorphic payload keyed by `type`; decoding and
/// validation go through the [`ResourceTypeRegistry`](crate::ResourceTypeRegistry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

/// Per-environment configuration of a stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackEnvironment {
    /// Resources this environment provisions (owns).
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,

    /// Names of parent resources this environment consumes (uses).
    #[serde(default)]
    pub uses: Vec<String>,

    /// Workload environment variable templates, resolved before flush.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// A named deployable unit. Immutable for the duration of one operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    #[serde(default)]
    pub name: String,

    /// Parent stack reference in `org/project` form.
    #[serde(default, rename = "parentStack", skip_serializing_if = "Option::is_none")]
    pub parent_stack: Option<String>,

    /// Explicit parent environment override; when unset, the child's own
    /// target environment is used to resolve the parent.
    #[serde(default, rename = "parentEnv", skip_serializing_if = "Option::is_none")]
    pub parent_env: Option<String>,

    #[serde(default)]
    pub environments: BTreeMap<String, StackEnvironment>,
}

impl Stack {
    /// The configuration for one environment.
    pub fn environment(&self, name: &str) -> StackResult<&StackEnvironment> {
        self.environments
            .get(name)
            .ok_or_else(|| StackError::EnvironmentNotFound {
                stack: self.name.clone(),
                environment: name.to_string(),
            })
    }
}

/// The resolved identity of one deploy.
///
/// Seed for every deterministic name derived during the deploy (secret
/// names, export keys, env-var names); stable across repeated applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployParams {
    pub stack_name: String,
    pub environment: String,
    pub version: String,
}

impl DeployParams {
    pub fn new(
        stack_name: impl Into<String>,
        environment: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            stack_name: stack_name.into(),
            environment: environment.into(),
            version: version.into(),
        }
    }

    /// Deterministic export key for one resource field:
    /// `{stackName}-{resourceName}-{field}`. A stable contract between
    /// provisioning and consumption.
    pub fn export_key(stack_name: &str, resource_name: &str, field: &str) -> String {
        format!("{stack_name}-{resource_name}-{field}")
    }
}

/// The declarative stacks document (`stacks.yaml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StacksConfig {
    pub organization: String,
    #[serde(default)]
    pub stacks: BTreeMap<String, Stack>,
}

impl StacksConfig {
    /// Load from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> StackResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = serde_yaml::from_str(&content)?;
        // The map key is authoritative for the stack name.
        for (name, stack) in config.stacks.iter_mut() {
            if stack.name.is_empty() {
                stack.name = name.clone();
            }
        }
        Ok(config)
    }

    pub fn stack(&self, name: &str) -> StackResult<&Stack> {
        self.stacks
            .get(name)
            .ok_or_else(|| StackError::StackNotFound(name.to_string()))
    }
}
