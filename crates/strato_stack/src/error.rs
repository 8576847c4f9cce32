//! Error types for the stack model.

use thiserror::Error;

/// Result type alias for stack operations.
pub type StackResult<T> = Result<T, StackError>;

/// Errors that can occur while loading and reconciling stacks.
#[derive(Error, Debug)]
pub enum StackError {
    #[error("Stack not found: {0}")]
    StackNotFound(String),

    #[error("Environment not found for stack '{stack}': {environment}")]
    EnvironmentNotFound { stack: String, environment: String },

    #[error("Missing parent stack for '{child}': {parent} ({reason})")]
    MissingParentStack {
        child: String,
        parent: String,
        reason: String,
    },

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Invalid config for resource '{name}' (type {resource_type}): {message}")]
    InvalidResourceConfig {
        resource_type: String,
        name: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
