//! The per-deploy state machine.
//!
//! `Reconcile → ResolvePlaceholders → Provision → CollectComputeContext →
//! Flush → Done`, with `Aborted` reachable from every step. Each step runs
//! on a spawned task so a panic inside it is recovered at the join point,
//! converted into a structured error, and never propagates past the
//! orchestrator. An aborted deploy emits exactly one alert.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use strato_compute::{
    ComputeContextCollector, DependencyExtension, ProcessorRegistry, ResourceExtension,
    StackReference, StateBackend,
};
use strato_stack::{reconcile, DeployParams, ResourceDescriptor, StackError, StacksConfig};
use strato_template::{
    bag_keys, resolve, DataBag, Extension, ExtensionRegistry, TemplateResult, Token,
};

use crate::error::{DeployError, DeployFailure, DeployResult};
use crate::report::{DeployReport, DeployStatus, DeployStep, StepReport};
use crate::traits::{AlertSink, DeployAlert, Provisioner, WorkloadTarget};

/// Namespace placeholder that defers resolution to a later engine pass.
///
/// Registered for `resource` during the first resolution pass: the fields
/// it would resolve are only registered by compute processors, which run
/// after placeholder resolution. Returning `Ok(None)` leaves the token
/// intact for the flush-time pass.
struct DeferredNamespace(&'static str);

impl Extension for DeferredNamespace {
    fn namespace(&self) -> &str {
        self.0
    }

    fn resolve(&self, _token: &Token, _bag: &DataBag) -> TemplateResult<Option<String>> {
        Ok(None)
    }
}

/// Drives one deploy through the state machine.
pub struct Orchestrator {
    provisioner: Arc<dyn Provisioner>,
    workload: Arc<dyn WorkloadTarget>,
    alerts: Arc<dyn AlertSink>,
    backend: Arc<dyn StateBackend>,
    processors: ProcessorRegistry,
    extensions: ExtensionRegistry,
    cancel: CancellationToken,
    preview: bool,
}

/// Everything the Reconcile step resolves for the rest of the deploy.
struct Prepared {
    environment_env: BTreeMap<String, String>,
    owned_resources: Vec<ResourceDescriptor>,
    /// Parent link plus the parent resource descriptors this deploy uses.
    binding: Option<Binding>,
    /// Where this deploy's own outputs are published.
    self_reference: String,
}

struct Binding {
    owner: StackReference,
    used: Vec<ResourceDescriptor>,
}

/// Output of the first placeholder pass.
struct ResolvedTemplates {
    env: BTreeMap<String, String>,
    registry: ExtensionRegistry,
    bag: DataBag,
}

impl Orchestrator {
    pub fn new(
        provisioner: Arc<dyn Provisioner>,
        workload: Arc<dyn WorkloadTarget>,
        alerts: Arc<dyn AlertSink>,
        backend: Arc<dyn StateBackend>,
        processors: ProcessorRegistry,
        extensions: ExtensionRegistry,
    ) -> Self {
        Self {
            provisioner,
            workload,
            alerts,
            backend,
            processors,
            extensions,
            cancel: CancellationToken::new(),
            preview: false,
        }
    }

    /// Skip the Provision step; everything else runs against existing state.
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    /// Cancellation is observed at step boundaries, never mid-step.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run one deploy to completion or abort.
    ///
    /// On abort, exactly one alert has been emitted and the returned
    /// [`DeployFailure`] carries both the report and the step error.
    pub async fn run(
        &self,
        config: &StacksConfig,
        stack_name: &str,
        params: &DeployParams,
    ) -> Result<DeployReport, DeployFailure> {
        let started_at = Utc::now();
        let mut report = DeployReport {
            deploy_id: Uuid::new_v4(),
            stack_name: stack_name.to_string(),
            environment: params.environment.clone(),
            version: params.version.clone(),
            preview: self.preview,
            status: DeployStatus::Done,
            failing_step: None,
            steps: Vec::new(),
            started_at,
            finished_at: started_at,
            error: None,
        };
        info!(
            deploy_id = %report.deploy_id,
            stack = stack_name,
            environment = %params.environment,
            preview = self.preview,
            "Starting deploy"
        );

        let outcome = self.drive(config, stack_name, params, &mut report).await;
        report.finished_at = Utc::now();

        match outcome {
            Ok(()) => {
                info!(
                    deploy_id = %report.deploy_id,
                    duration_ms = report.duration_ms(),
                    "Deploy done"
                );
                Ok(report)
            }
            Err((step, error)) => {
                warn!(
                    deploy_id = %report.deploy_id,
                    step = %step,
                    "Deploy aborted: {error}"
                );
                // The single alert per aborted deploy.
                self.alerts
                    .notify(&DeployAlert {
                        stack_name: stack_name.to_string(),
                        environment: params.environment.clone(),
                        step,
                        message: error.to_string(),
                    })
                    .await;
                report.status = DeployStatus::Aborted;
                report.failing_step = Some(step);
                report.error = Some(error.to_string());
                Err(DeployFailure { report, error })
            }
        }
    }

    async fn drive(
        &self,
        config: &StacksConfig,
        stack_name: &str,
        params: &DeployParams,
        report: &mut DeployReport,
    ) -> Result<(), (DeployStep, DeployError)> {
        let collector = Arc::new(ComputeContextCollector::new(self.backend.clone()));

        let prepared = {
            let config = config.clone();
            let stack_name = stack_name.to_string();
            let params = params.clone();
            self.step(DeployStep::Reconcile, report, async move {
                prepare(&config, &stack_name, &params)
            })
            .await?
        };

        let resolved = {
            let collector = collector.clone();
            let base = self.extensions.clone();
            let parent = prepared.binding.as_ref().map(|b| b.owner.clone());
            let templates = prepared.environment_env.clone();
            let params = params.clone();
            self.step(DeployStep::ResolvePlaceholders, report, async move {
                resolve_templates(collector, base, parent, templates, &params).await
            })
            .await?
        };

        if self.preview {
            debug!("Preview mode, skipping provisioning");
        } else {
            let outputs = {
                let provisioner = self.provisioner.clone();
                let params = params.clone();
                let resources = prepared.owned_resources.clone();
                self.step(DeployStep::Provision, report, async move {
                    provisioner.provision(&params, &resources).await
                })
                .await?
            };
            for (key, value) in outputs {
                collector.add_output(key, value);
            }
        }

        {
            let collector = collector.clone();
            let processors = self.processors.clone();
            let params = params.clone();
            let binding = prepared
                .binding
                .as_ref()
                .map(|b| (b.owner.clone(), b.used.clone()));
            self.step(DeployStep::CollectComputeContext, report, async move {
                let Some((owner, used)) = binding else {
                    return Ok(());
                };
                // Independent resources run concurrently, each against a
                // staging collector sharing the reference cache.
                let mut tasks = Vec::with_capacity(used.len());
                for descriptor in used {
                    let processor = processors.get_required(&descriptor.resource_type)?;
                    let staged = collector.stage();
                    let owner = owner.clone();
                    let params = params.clone();
                    tasks.push(tokio::spawn(async move {
                        processor
                            .process(&descriptor, &owner, &params, &staged)
                            .await
                            .map(|()| staged)
                    }));
                }
                // Staged results merge in declared resource order, so the
                // first declared resource claims generic aliases no matter
                // which processor finished first.
                for task in tasks {
                    match task.await {
                        Ok(result) => collector.absorb(result?),
                        // Re-panic with the original payload so the step
                        // boundary reports it as the step's panic.
                        Err(join_error) if join_error.is_panic() => {
                            std::panic::resume_unwind(join_error.into_panic())
                        }
                        Err(join_error) => {
                            return Err(DeployError::Provisioner {
                                message: join_error.to_string(),
                            })
                        }
                    }
                }
                Ok(())
            })
            .await?;
        }

        {
            let collector = collector.clone();
            let workload = self.workload.clone();
            let backend = self.backend.clone();
            let params = params.clone();
            let self_reference = prepared.self_reference.clone();
            self.step(DeployStep::Flush, report, async move {
                flush(collector, workload, backend, &params, resolved, &self_reference).await
            })
            .await?;
        }

        Ok(())
    }

    /// Run one step inside the panic and cancellation boundary.
    async fn step<T>(
        &self,
        step: DeployStep,
        report: &mut DeployReport,
        fut: impl Future<Output = DeployResult<T>> + Send + 'static,
    ) -> Result<T, (DeployStep, DeployError)>
    where
        T: Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err((step, DeployError::Cancelled { step }));
        }
        let start = Instant::now();
        let result = match tokio::spawn(fut).await {
            Ok(result) => result,
            Err(join_error) => Err(DeployError::ProvisioningPanic {
                step,
                message: panic_message(join_error),
            }),
        };
        report.steps.push(StepReport {
            step,
            duration_ms: start.elapsed().as_millis() as u64,
        });
        result.map_err(|error| (step, error))
    }
}

/// Extract the original message from a panicked step's join error.
fn panic_message(error: tokio::task::JoinError) -> String {
    match error.try_into_panic() {
        Ok(payload) => {
            if let Some(message) = payload.downcast_ref::<&str>() {
                (*message).to_string()
            } else if let Some(message) = payload.downcast_ref::<String>() {
                message.clone()
            } else {
                "opaque panic payload".to_string()
            }
        }
        Err(error) => error.to_string(),
    }
}

/// Reconcile the stack and gather everything later steps need.
fn prepare(config: &StacksConfig, stack_name: &str, params: &DeployParams) -> DeployResult<Prepared> {
    let stack = config.stack(stack_name)?;
    let reconciled = reconcile(stack, params)?;
    let environment = stack.environment(&params.environment)?;

    let binding = match &reconciled.parent {
        Some(parent) => {
            let owner = StackReference::parse(&parent.reference, &parent.resolution_env)?;
            let used = used_resources(config, stack_name, parent, &environment.uses)?;
            Some(Binding { owner, used })
        }
        None if environment.uses.is_empty() => None,
        None => {
            return Err(StackError::MissingParentStack {
                child: stack_name.to_string(),
                parent: String::new(),
                reason: "environment consumes parent resources but the stack declares no parentStack"
                    .to_string(),
            }
            .into())
        }
    };

    // Own outputs publish under the same convention parents are addressed
    // with: the project segment doubles as the stack name.
    let self_reference = format!(
        "{}/{}/{}",
        config.organization, stack.name, stack.name
    );

    Ok(Prepared {
        environment_env: environment.env.clone(),
        owned_resources: environment.resources.clone(),
        binding,
        self_reference,
    })
}

/// Look up the descriptors of the parent resources this environment uses.
fn used_resources(
    config: &StacksConfig,
    child: &str,
    parent: &strato_stack::ParentLink,
    uses: &[String],
) -> DeployResult<Vec<ResourceDescriptor>> {
    if uses.is_empty() {
        return Ok(Vec::new());
    }
    let parent_stack = config.stacks.get(&parent.stack_name).ok_or_else(|| {
        StackError::MissingParentStack {
            child: child.to_string(),
            parent: parent.reference.clone(),
            reason: "parent stack is not present in the stacks configuration".to_string(),
        }
    })?;
    let parent_env = parent_stack.environment(&parent.resolution_env)?;

    uses.iter()
        .map(|name| {
            parent_env
                .resources
                .iter()
                .find(|r| &r.name == name)
                .cloned()
                .ok_or_else(|| {
                    StackError::MissingParentStack {
                        child: child.to_string(),
                        parent: parent.reference.clone(),
                        reason: format!(
                            "parent environment '{}' declares no resource named '{name}'",
                            parent.resolution_env
                        ),
                    }
                    .into()
                })
        })
        .collect()
}

/// First placeholder pass over the workload env templates.
///
/// The `dependency` namespace is live (parent outputs are already
/// published, a temporal precondition of child deploys); the `resource`
/// namespace is deferred until after compute context collection.
async fn resolve_templates(
    collector: Arc<ComputeContextCollector>,
    mut registry: ExtensionRegistry,
    parent: Option<StackReference>,
    templates: BTreeMap<String, String>,
    params: &DeployParams,
) -> DeployResult<ResolvedTemplates> {
    if let Some(owner) = &parent {
        let outputs = collector
            .resolve_reference(&owner.full_reference, &owner.environment)
            .await?;
        let mut dependency = DependencyExtension::new();
        dependency.add(&owner.stack_name, &owner.stack_name, outputs);
        registry.register(Arc::new(dependency));
    }
    registry.register(Arc::new(DeferredNamespace("resource")));

    let mut bag = DataBag::new();
    bag.insert(
        bag_keys::ENVIRONMENT.to_string(),
        Value::String(params.environment.clone()),
    );
    bag.insert(
        bag_keys::STACK_NAME.to_string(),
        Value::String(params.stack_name.clone()),
    );

    let mut env = BTreeMap::new();
    for (name, template) in templates {
        env.insert(name, resolve(&template, &bag, &registry)?);
    }
    Ok(ResolvedTemplates { env, registry, bag })
}

/// Second placeholder pass plus the actual flush.
async fn flush(
    collector: Arc<ComputeContextCollector>,
    workload: Arc<dyn WorkloadTarget>,
    backend: Arc<dyn StateBackend>,
    params: &DeployParams,
    resolved: ResolvedTemplates,
    self_reference: &str,
) -> DeployResult<()> {
    let mut registry = resolved.registry;
    registry.register(Arc::new(ResourceExtension::new(collector.clone())));

    let mut env = BTreeMap::new();
    for (name, value) in resolved.env {
        env.insert(name, resolve(&value, &resolved.bag, &registry)?);
    }
    // Harvested variables fill in around the stack's explicit entries.
    for variable in collector.env_variables() {
        env.entry(variable.name).or_insert(variable.value);
    }
    let secrets: BTreeMap<String, String> = collector
        .secret_env_variables()
        .into_iter()
        .map(|v| (v.name, v.value))
        .collect();

    debug!(
        env_count = env.len(),
        secret_count = secrets.len(),
        "Flushing compute context into workload"
    );
    workload.apply(params, &env, &secrets).await?;

    let outputs = collector.outputs();
    if !outputs.is_empty() {
        backend
            .publish_outputs(self_reference, &params.environment, &outputs)
            .await?;
    }
    Ok(())
}
