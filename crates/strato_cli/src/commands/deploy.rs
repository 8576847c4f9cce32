//! Deploy and preview commands - Drive one stack deploy.
//!
//! Provisioning itself runs through provider tooling; this command takes
//! the published outputs of that run (`--outputs`) and drives the rest of
//! the pipeline: reconcile, resolve placeholders, collect compute context,
//! and flush the result into an env file the platform picks up.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use strato_compute::{
    BucketProcessor, DryRunRemoteRunner, FileStateBackend, PostgresProcessor, ProcessorRegistry,
    PsqlRemoteRunner, RemoteCommandRunner,
};
use strato_crypto::PrivateKey;
use strato_deploy::{
    CollectingWorkloadTarget, LogAlertSink, Orchestrator, StaticProvisioner,
};
use strato_secrets::{SecretExtension, SecretsStore};
use strato_stack::{
    AuthConfig, AuthExtension, DeployParams, ResourceTypeRegistry, StacksConfig,
};
use strato_template::{register_builtins, ExtensionRegistry};

/// Config payload of a `bucket` resource.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct BucketConfig {
    #[allow(dead_code)]
    region: Option<String>,
}

/// Config payload of a `postgres` resource.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct PostgresConfig {
    #[allow(dead_code)]
    tier: Option<String>,
    #[allow(dead_code)]
    version: Option<String>,
}

#[derive(Args)]
pub struct DeployArgs {
    /// Path to the stacks configuration
    #[arg(long, default_value = "stacks.yaml")]
    stacks: PathBuf,

    /// Name of the stack to deploy
    #[arg(short, long)]
    stack: String,

    /// Target environment
    #[arg(short, long)]
    environment: String,

    /// Version label recorded on the deploy
    #[arg(long, default_value = "latest")]
    release: String,

    /// Path to the secrets descriptor
    #[arg(long, default_value = "secrets.yaml")]
    secrets: PathBuf,

    /// Path to the stack's private key (enables the secret namespace)
    #[arg(long)]
    private_key: Option<PathBuf>,

    /// Path to the provider credentials file (enables the auth namespace)
    #[arg(long)]
    auth: Option<PathBuf>,

    /// Directory holding persisted stack outputs
    #[arg(long, default_value = ".strato/state")]
    state_dir: PathBuf,

    /// JSON file of provisioning outputs published by provider tooling
    #[arg(long)]
    outputs: Option<PathBuf>,

    /// File the resolved workload configuration is written to
    #[arg(short, long, default_value = ".strato/workload.env")]
    out: PathBuf,

    /// Write the deploy report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

pub async fn execute(args: DeployArgs, preview: bool) -> Result<()> {
    let config = StacksConfig::load(&args.stacks)
        .with_context(|| format!("loading {}", args.stacks.display()))?;
    let params = DeployParams::new(&args.stack, &args.environment, &args.release);

    // Reject unknown resource types and malformed configs before anything
    // touches state.
    let resource_types = build_resource_types();
    let stack = config.stack(&args.stack)?;
    resource_types.validate_all(&stack.environment(&args.environment)?.resources)?;

    let extensions = build_extensions(&args)?;
    let processors = build_processors(preview);
    let backend = Arc::new(FileStateBackend::new(&args.state_dir));
    let provisioner = Arc::new(StaticProvisioner::new(load_outputs(&args)?));
    let workload = Arc::new(CollectingWorkloadTarget::new());

    // Operator interrupt aborts at the next step boundary.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling deploy");
                cancel.cancel();
            }
        });
    }

    let orchestrator = Orchestrator::new(
        provisioner,
        workload.clone(),
        Arc::new(LogAlertSink),
        backend,
        processors,
        extensions,
    )
    .with_preview(preview)
    .with_cancellation(cancel);

    let report = match orchestrator.run(&config, &args.stack, &params).await {
        Ok(report) => report,
        Err(failure) => {
            if let Some(path) = &args.report {
                write_report(path, &failure.report)?;
            }
            return Err(anyhow::Error::new(failure));
        }
    };

    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }

    let applied = workload.applied().await.unwrap_or_default();
    if preview {
        println!("🔍 Preview of {}/{}:", args.stack, args.environment);
        for (name, value) in &applied.env {
            println!("   {name}={value}");
        }
        for name in applied.secrets.keys() {
            println!("   {name}=<secret>");
        }
        println!("Provisioning skipped; nothing changed.");
    } else {
        write_env_file(&args.out, &applied.env, &applied.secrets)?;
        info!(path = %args.out.display(), "Wrote workload configuration");
        println!(
            "✅ Deployed {}/{} ({} env vars, {} secrets) in {}ms",
            args.stack,
            args.environment,
            applied.env.len(),
            applied.secrets.len(),
            report.duration_ms()
        );
    }

    Ok(())
}

fn build_extensions(args: &DeployArgs) -> Result<ExtensionRegistry> {
    let mut registry = ExtensionRegistry::new();
    register_builtins(&mut registry);

    if let Some(key_path) = &args.private_key {
        let material = std::fs::read_to_string(key_path)
            .with_context(|| format!("reading private key {}", key_path.display()))?;
        let private_key = Arc::new(PrivateKey::parse(material.trim())?);
        let descriptor = SecretsStore::new(&args.secrets).load()?;
        registry.register(Arc::new(SecretExtension::new(descriptor, private_key)));
    }

    if let Some(auth_path) = &args.auth {
        let content = std::fs::read_to_string(auth_path)
            .with_context(|| format!("reading {}", auth_path.display()))?;
        let config: AuthConfig = serde_yaml::from_str(&content)?;
        registry.register(Arc::new(AuthExtension::new(config)));
    }

    Ok(registry)
}

fn build_resource_types() -> ResourceTypeRegistry {
    let mut registry = ResourceTypeRegistry::new();
    registry.register_typed::<BucketConfig>("bucket");
    registry.register_typed::<PostgresConfig>("postgres");
    registry
}

fn build_processors(preview: bool) -> ProcessorRegistry {
    // A preview must not create roles on the live instance; it only shows
    // what would be bound.
    let runner: Arc<dyn RemoteCommandRunner> = if preview {
        Arc::new(DryRunRemoteRunner)
    } else {
        Arc::new(PsqlRemoteRunner)
    };
    let mut registry = ProcessorRegistry::new();
    registry.register(Arc::new(BucketProcessor));
    registry.register(Arc::new(PostgresProcessor::new(runner)));
    registry
}

fn load_outputs(args: &DeployArgs) -> Result<BTreeMap<String, String>> {
    match &args.outputs {
        None => Ok(BTreeMap::new()),
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing outputs from {}", path.display()))
        }
    }
}

fn write_env_file(
    path: &PathBuf,
    env: &BTreeMap<String, String>,
    secrets: &BTreeMap<String, String>,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut content = String::new();
    for (name, value) in env {
        content.push_str(&format!("{name}={value}\n"));
    }
    for (name, value) in secrets {
        content.push_str(&format!("{name}={value}\n"));
    }
    std::fs::write(path, content)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn write_report(path: &PathBuf, report: &strato_deploy::DeployReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(report)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
