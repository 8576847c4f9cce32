//! Deploy state machine steps and the per-deploy report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One step of the deploy state machine, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployStep {
    Reconcile,
    ResolvePlaceholders,
    Provision,
    CollectComputeContext,
    Flush,
}

impl std::fmt::Display for DeployStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeployStep::Reconcile => "Reconcile",
            DeployStep::ResolvePlaceholders => "ResolvePlaceholders",
            DeployStep::Provision => "Provision",
            DeployStep::CollectComputeContext => "CollectComputeContext",
            DeployStep::Flush => "Flush",
        };
        write!(f, "{name}")
    }
}

/// Terminal state of one deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployStatus {
    Done,
    Aborted,
}

/// Timing for one executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub step: DeployStep,
    pub duration_ms: u64,
}

/// What one deploy did, whether it finished or aborted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployReport {
    pub deploy_id: Uuid,
    pub stack_name: String,
    pub environment: String,
    pub version: String,
    pub preview: bool,
    pub status: DeployStatus,
    /// The step the deploy aborted in, when status is `Aborted`.
    pub failing_step: Option<DeployStep>,
    pub steps: Vec<StepReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl DeployReport {
    pub fn succeeded(&self) -> bool {
        self.status == DeployStatus::Done
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }
}
