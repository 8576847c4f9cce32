//! Integration tests for the full deploy pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use tempfile::tempdir;

use strato_compute::{BucketProcessor, FileStateBackend, ProcessorRegistry};
use strato_crypto::generate_curve_keypair;
use strato_deploy::{
    CollectingWorkloadTarget, DeployStatus, Orchestrator, RecordingAlertSink, StaticProvisioner,
};
use strato_secrets::{SecretExtension, SecretsStore};
use strato_stack::{DeployParams, StacksConfig};
use strato_template::ExtensionRegistry;

fn stacks_config() -> StacksConfig {
    serde_yaml::from_str(
        r#"
organization: acme
stacks:
  infra:
    name: infra
    environments:
      prod:
        resources:
          - type: bucket
            name: logs
  api:
    name: api
    parentStack: acme/infra
    environments:
      prod:
        uses: [logs]
        env:
          LOG_BUCKET: "${resource:logs.bucket}"
          UPSTREAM_BUCKET: "${dependency:infra.logs.bucket-name}"
          API_TOKEN: "${secret:API_TOKEN}"
"#,
    )
    .unwrap()
}

fn processors() -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    registry.register(Arc::new(BucketProcessor));
    registry
}

/// Parent deploy publishes outputs; child deploy binds them, resolves
/// secrets, and flushes a complete workload configuration.
#[tokio::test]
async fn test_parent_then_child_deploy() {
    let temp = tempdir().unwrap();
    let config = stacks_config();

    // Secrets for the child stack.
    let secrets_store = SecretsStore::new(temp.path().join("secrets.yaml"));
    let (public, private) = generate_curve_keypair();
    secrets_store
        .add_secret("API_TOKEN", "prod-token", Some("prod"), &public)
        .unwrap();
    let mut extensions = ExtensionRegistry::new();
    extensions.register(Arc::new(SecretExtension::new(
        secrets_store.load().unwrap(),
        Arc::new(private),
    )));

    let state_dir = temp.path().join("state");
    let alerts = Arc::new(RecordingAlertSink::new());

    // Parent deploy: provisioning outputs come from provider tooling.
    let parent_outputs = BTreeMap::from([(
        "infra-logs-bucket-name".to_string(),
        "acme-logs-prod".to_string(),
    )]);
    let report = Orchestrator::new(
        Arc::new(StaticProvisioner::new(parent_outputs)),
        Arc::new(CollectingWorkloadTarget::new()),
        alerts.clone(),
        Arc::new(FileStateBackend::new(&state_dir)),
        processors(),
        ExtensionRegistry::new(),
    )
    .run(&config, "infra", &DeployParams::new("infra", "prod", "1.0.0"))
    .await
    .unwrap();
    assert_eq!(report.status, DeployStatus::Done);

    // The parent's outputs are now persisted under its reference, scoped
    // to the environment it deployed to.
    let persisted = state_dir.join("acme/infra/infra/prod.json");
    assert!(persisted.exists());

    // Child deploy binds the published outputs.
    let workload = Arc::new(CollectingWorkloadTarget::new());
    let report = Orchestrator::new(
        Arc::new(StaticProvisioner::default()),
        workload.clone(),
        alerts.clone(),
        Arc::new(FileStateBackend::new(&state_dir)),
        processors(),
        extensions,
    )
    .run(&config, "api", &DeployParams::new("api", "prod", "1.0.0"))
    .await
    .unwrap();
    assert_eq!(report.status, DeployStatus::Done);

    let applied = workload.applied().await.unwrap();
    assert_eq!(applied.env["LOG_BUCKET"], "acme-logs-prod");
    assert_eq!(applied.env["UPSTREAM_BUCKET"], "acme-logs-prod");
    assert_eq!(applied.env["API_TOKEN"], "prod-token");
    // Harvested variables landed alongside the explicit templates.
    assert_eq!(applied.env["BUCKET_NAME"], "acme-logs-prod");
    assert_eq!(applied.env["BUCKET_NAME_LOGS"], "acme-logs-prod");

    assert!(alerts.alerts().await.is_empty());
}

/// A child deployed before its parent aborts with the export key named.
#[tokio::test]
async fn test_child_before_parent_aborts() {
    let temp = tempdir().unwrap();
    let config = stacks_config();
    let alerts = Arc::new(RecordingAlertSink::new());

    // Clear the env templates so the failure comes from the missing
    // parent output, not from the unregistered secret namespace.
    let mut config = config;
    config
        .stacks
        .get_mut("api")
        .unwrap()
        .environments
        .get_mut("prod")
        .unwrap()
        .env
        .clear();

    let failure = Orchestrator::new(
        Arc::new(StaticProvisioner::default()),
        Arc::new(CollectingWorkloadTarget::new()),
        alerts.clone(),
        Arc::new(FileStateBackend::new(temp.path().join("state"))),
        processors(),
        ExtensionRegistry::new(),
    )
    .run(&config, "api", &DeployParams::new("api", "prod", "1.0.0"))
    .await
    .unwrap_err();

    assert_eq!(failure.report.status, DeployStatus::Aborted);
    let message = failure.error.to_string();
    assert!(message.contains("infra-logs-bucket-name"), "got: {message}");
    assert_eq!(alerts.alerts().await.len(), 1);
}
