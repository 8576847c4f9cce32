//! # strato_deploy
//!
//! The provisioning orchestrator: drives one deploy through
//! `Reconcile → ResolvePlaceholders → Provision → CollectComputeContext →
//! Flush → Done`, with `Aborted` reachable from every step.
//!
//! Every step runs inside a panic-recovery boundary; a recovered panic
//! becomes a [`DeployError::ProvisioningPanic`] carrying the original
//! message, one alert goes out through the configured [`AlertSink`], and
//! the deploy aborts without a partial flush. Preview mode skips the
//! Provision step only.
//!
//! Sequencing parent deploys before child deploys is the caller's job; the
//! orchestrator treats already-published parent outputs as a precondition.

pub mod error;
pub mod mock;
pub mod orchestrator;
pub mod report;
pub mod traits;

pub use error::{DeployError, DeployFailure, DeployResult};
pub use mock::{AppliedConfig, CollectingWorkloadTarget, RecordingAlertSink, StaticProvisioner};
pub use orchestrator::Orchestrator;
pub use report::{DeployReport, DeployStatus, DeployStep, StepReport};
pub use traits::{AlertSink, DeployAlert, LogAlertSink, Provisioner, WorkloadTarget};
