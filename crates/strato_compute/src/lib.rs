//! Compute context collection and cross-stack resource binding.
//!
//! Turns the persisted outputs of parent stacks into the environment
//! variables, template extensions, and dependency edges a consuming
//! workload needs. Provider-specific [`ComputeProcessor`]s do the
//! per-resource work; a shared [`ComputeContextCollector`] aggregates it
//! under first-wins semantics.

pub mod collector;
pub mod error;
pub mod extensions;
pub mod processor;
pub mod processors;
pub mod reference;

pub use collector::{ComputeContextCollector, ComputeEnvVariable, DependencyRef};
pub use error::{ComputeError, ComputeResult};
pub use extensions::{DependencyExtension, DependencyOutputs, ResourceExtension};
pub use processor::{qualified_env_name, ComputeProcessor, ProcessorRegistry};
pub use processors::{
    BucketProcessor, DryRunRemoteRunner, PostgresProcessor, PsqlRemoteRunner,
    RecordingRemoteRunner, RemoteCommand, RemoteCommandRunner,
};
pub use reference::{FileStateBackend, MemoryStateBackend, StackReference, StateBackend};
