//! Error types for the provisioning orchestrator.

use thiserror::Error;

use crate::report::{DeployReport, DeployStep};

/// Result type alias for deploy operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors that can abort a deploy.
#[derive(Error, Debug)]
pub enum DeployError {
    /// A recovered panic from inside a deploy step, original message
    /// preserved.
    #[error("Step {step} panicked: {message}")]
    ProvisioningPanic { step: DeployStep, message: String },

    #[error("Deploy cancelled at step {step}")]
    Cancelled { step: DeployStep },

    #[error("Provisioning failed: {message}")]
    Provisioner { message: String },

    #[error("Workload flush failed: {message}")]
    Workload { message: String },

    #[error(transparent)]
    Stack(#[from] strato_stack::StackError),

    #[error(transparent)]
    Template(#[from] strato_template::TemplateError),

    #[error(transparent)]
    Compute(#[from] strato_compute::ComputeError),
}

/// An aborted deploy: the report of what ran plus the error that stopped it.
///
/// Aborted deploys are reported distinctly from done deploys so automation
/// can tell "nothing changed because of an error" from "successfully did
/// nothing to change".
#[derive(Debug)]
pub struct DeployFailure {
    pub report: DeployReport,
    pub error: DeployError,
}

impl std::fmt::Display for DeployFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Deploy of {}/{} aborted: {}",
            self.report.stack_name, self.report.environment, self.error
        )
    }
}

impl std::error::Error for DeployFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
