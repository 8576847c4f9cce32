//! Collaborator traits the orchestrator drives.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::error;

use strato_stack::{DeployParams, ResourceDescriptor};

use crate::error::DeployResult;
use crate::report::DeployStep;

/// Creates the resources a stack owns and returns their published outputs,
/// keyed by export key (`{stackName}-{resourceName}-{field}`).
///
/// Provisioning itself is provider territory; the orchestrator only
/// sequences it and contains its failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(
        &self,
        params: &DeployParams,
        resources: &[ResourceDescriptor],
    ) -> DeployResult<BTreeMap<String, String>>;
}

/// The destination the collected context is flushed into: the workload's
/// runtime configuration on whatever platform runs it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkloadTarget: Send + Sync {
    async fn apply(
        &self,
        params: &DeployParams,
        env: &BTreeMap<String, String>,
        secrets: &BTreeMap<String, String>,
    ) -> DeployResult<()>;
}

/// A failure notification for one aborted deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployAlert {
    pub stack_name: String,
    pub environment: String,
    pub step: DeployStep,
    pub message: String,
}

/// Receives exactly one alert per aborted deploy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, alert: &DeployAlert);
}

/// Alert sink that writes to the log.
#[derive(Debug, Default, Clone)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn notify(&self, alert: &DeployAlert) {
        error!(
            stack = %alert.stack_name,
            environment = %alert.environment,
            step = %alert.step,
            "Deploy aborted: {}",
            alert.message
        );
    }
}
