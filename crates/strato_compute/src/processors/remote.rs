//! One-shot remote command execution for processors with ephemeral side
//! effects (e.g. creating a scoped database role inside a shared instance).

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::ComputeResult;

/// A single command to run against a remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub endpoint: String,
    pub command: String,
}

/// Executes one-shot commands against provisioned infrastructure.
///
/// Runs synchronously inside the calling processor; a failure here fails
/// the whole deploy, there is no partial binding.
#[async_trait]
pub trait RemoteCommandRunner: Send + Sync {
    async fn run(&self, endpoint: &str, admin_credential: &str, command: &str)
        -> ComputeResult<()>;
}

/// Runs commands through the `psql` client against a postgres endpoint.
#[derive(Debug, Default, Clone)]
pub struct PsqlRemoteRunner;

#[async_trait]
impl RemoteCommandRunner for PsqlRemoteRunner {
    async fn run(
        &self,
        endpoint: &str,
        admin_credential: &str,
        command: &str,
    ) -> ComputeResult<()> {
        let url = format!("postgresql://postgres:{admin_credential}@{endpoint}/postgres");
        let output = tokio::process::Command::new("psql")
            .arg(url)
            .arg("-v")
            .arg("ON_ERROR_STOP=1")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|e| crate::error::ComputeError::RemoteCommand {
                endpoint: endpoint.to_string(),
                message: format!("failed to spawn psql: {e}"),
            })?;
        if !output.status.success() {
            return Err(crate::error::ComputeError::RemoteCommand {
                endpoint: endpoint.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Runner for previews: logs the command that would run and touches
/// nothing. Previews still need the processor to bind outputs, but must
/// not leave a role behind on the live instance.
#[derive(Debug, Default, Clone)]
pub struct DryRunRemoteRunner;

#[async_trait]
impl RemoteCommandRunner for DryRunRemoteRunner {
    async fn run(
        &self,
        endpoint: &str,
        _admin_credential: &str,
        command: &str,
    ) -> ComputeResult<()> {
        tracing::info!(endpoint, command, "Dry run, skipping remote command");
        Ok(())
    }
}

/// Test double that records every command it is asked to run.
#[derive(Default)]
pub struct RecordingRemoteRunner {
    calls: Mutex<Vec<RemoteCommand>>,
    /// When set, every run fails with this message.
    fail_with: Option<String>,
}

impl RecordingRemoteRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_with: Some(message.into()),
        }
    }

    pub async fn calls(&self) -> Vec<RemoteCommand> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl RemoteCommandRunner for RecordingRemoteRunner {
    async fn run(
        &self,
        endpoint: &str,
        _admin_credential: &str,
        command: &str,
    ) -> ComputeResult<()> {
        self.calls.lock().await.push(RemoteCommand {
            endpoint: endpoint.to_string(),
            command: command.to_string(),
        });
        match &self.fail_with {
            Some(message) => Err(crate::error::ComputeError::RemoteCommand {
                endpoint: endpoint.to_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}
