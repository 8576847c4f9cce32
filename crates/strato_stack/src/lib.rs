//! # strato_stack
//!
//! Stack data model and pre-deploy reconciliation for strato.
//!
//! - Declarative [`Stack`]/[`StacksConfig`] models with per-environment
//!   resource and workload configuration
//! - [`ResourceTypeRegistry`]: tagged decode+validate functions for
//!   provider-specific resource config payloads
//! - [`reconcile`]: parent/child resolution, including environment
//!   propagation and the `parentEnv` override
//! - The `auth` placeholder namespace

pub mod auth;
pub mod error;
pub mod model;
pub mod reconciler;
pub mod registry;

pub use auth::{AuthConfig, AuthExtension};
pub use error::{StackError, StackResult};
pub use model::{DeployParams, ResourceDescriptor, Stack, StackEnvironment, StacksConfig};
pub use reconciler::{reconcile, ParentLink, ReconciledStack};
pub use registry::{ConfigValidator, ResourceTypeRegistry};
