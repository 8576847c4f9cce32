//! Inert collaborators for previews and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use strato_stack::{DeployParams, ResourceDescriptor};

use crate::error::DeployResult;
use crate::traits::{AlertSink, DeployAlert, Provisioner, WorkloadTarget};

/// Provisioner that returns a fixed outputs map and touches nothing.
///
/// Used for previews and for deploys whose provisioning already happened
/// through provider tooling, with the outputs supplied out of band.
#[derive(Debug, Default, Clone)]
pub struct StaticProvisioner {
    outputs: BTreeMap<String, String>,
}

impl StaticProvisioner {
    pub fn new(outputs: BTreeMap<String, String>) -> Self {
        Self { outputs }
    }
}

#[async_trait]
impl Provisioner for StaticProvisioner {
    async fn provision(
        &self,
        _params: &DeployParams,
        _resources: &[ResourceDescriptor],
    ) -> DeployResult<BTreeMap<String, String>> {
        Ok(self.outputs.clone())
    }
}

/// The configuration one flush would have applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedConfig {
    pub env: BTreeMap<String, String>,
    pub secrets: BTreeMap<String, String>,
}

/// Workload target that records the flush instead of applying it.
///
/// Backs the preview command: operators see the exact env vars and secret
/// names a real deploy would push, without side effects.
#[derive(Debug, Default)]
pub struct CollectingWorkloadTarget {
    applied: Mutex<Option<AppliedConfig>>,
}

impl CollectingWorkloadTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded flush, if one happened.
    pub async fn applied(&self) -> Option<AppliedConfig> {
        self.applied.lock().await.clone()
    }
}

#[async_trait]
impl WorkloadTarget for CollectingWorkloadTarget {
    async fn apply(
        &self,
        _params: &DeployParams,
        env: &BTreeMap<String, String>,
        secrets: &BTreeMap<String, String>,
    ) -> DeployResult<()> {
        *self.applied.lock().await = Some(AppliedConfig {
            env: env.clone(),
            secrets: secrets.clone(),
        });
        Ok(())
    }
}

/// Alert sink that records every alert it receives.
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<DeployAlert>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn alerts(&self) -> Vec<DeployAlert> {
        self.alerts.lock().await.clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn notify(&self, alert: &DeployAlert) {
        self.alerts.lock().await.push(alert.clone());
    }
}
