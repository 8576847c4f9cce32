//! Per-deploy compute context collection.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::error::{ComputeError, ComputeResult};
use crate::reference::{StackReference, StateBackend};

/// One environment variable harvested for the consuming workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeEnvVariable {
    pub name: String,
    pub value: String,
    pub is_secret: bool,
    pub source_resource_type: String,
    pub source_resource_name: String,
    pub source_stack: String,
}

/// A resource dependency edge recorded while harvesting context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRef {
    pub stack_name: String,
    pub resource_type: String,
    pub resource_name: String,
}

#[derive(Default)]
struct CollectorInner {
    /// Ordered; first registration of a name wins.
    env_variables: Vec<ComputeEnvVariable>,
    /// resourceName -> fieldName -> resolved value.
    tpl_extensions: BTreeMap<String, BTreeMap<String, String>>,
    dependencies: Vec<DependencyRef>,
    /// Named outputs to publish when the deploy flushes.
    outputs: BTreeMap<String, String>,
}

/// Mutable aggregator for one deploy.
///
/// Compute processors write into it concurrently; the orchestrator reads it
/// once at flush time. The add-if-not-exists contract is the synchronization
/// point: check-then-insert runs under one mutex, so two processors racing
/// on the same generic alias never both win.
pub struct ComputeContextCollector {
    backend: Arc<dyn StateBackend>,
    inner: Mutex<CollectorInner>,
    /// Remote-state reads are expensive; memoize per reference and
    /// environment. Shared with staging collectors so concurrent processors
    /// still hit one cache.
    reference_cache: Arc<tokio::sync::Mutex<HashMap<String, Arc<BTreeMap<String, String>>>>>,
}

impl ComputeContextCollector {
    pub fn new(backend: Arc<dyn StateBackend>) -> Self {
        Self {
            backend,
            inner: Mutex::new(CollectorInner::default()),
            reference_cache: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
        }
    }

    /// An empty collector sharing this one's backend and reference cache.
    ///
    /// Concurrent processors each write into their own staging collector;
    /// [`Self::absorb`] merges the staged registrations back in declared
    /// resource order, which keeps generic alias winners independent of
    /// completion order.
    pub fn stage(&self) -> ComputeContextCollector {
        ComputeContextCollector {
            backend: self.backend.clone(),
            inner: Mutex::new(CollectorInner::default()),
            reference_cache: self.reference_cache.clone(),
        }
    }

    /// Merge a staging collector's registrations under the same
    /// add-if-not-exists contract the direct methods enforce.
    pub fn absorb(&self, staged: ComputeContextCollector) {
        let staged = staged
            .inner
            .into_inner()
            .expect("collector mutex poisoned");
        for variable in staged.env_variables {
            self.add_variable(variable);
        }
        for (resource_name, fields) in staged.tpl_extensions {
            self.add_resource_tpl_extension(resource_name, fields);
        }
        for (export_key, value) in staged.outputs {
            self.add_output(export_key, value);
        }
        for dependency in staged.dependencies {
            self.add_dependency(dependency);
        }
    }

    /// Register a public env variable unless the name is already taken.
    ///
    /// Returns `true` when this call claimed the name. The first
    /// registration wins; generic aliases never overwrite specific ones.
    pub fn add_env_variable_if_not_exist(
        &self,
        name: impl Into<String>,
        value: impl Into<String>,
        source_resource_type: impl Into<String>,
        source_resource_name: impl Into<String>,
        source_stack: impl Into<String>,
    ) -> bool {
        self.add_variable(
            ComputeEnvVariable {
                name: name.into(),
                value: value.into(),
                is_secret: false,
                source_resource_type: source_resource_type.into(),
                source_resource_name: source_resource_name.into(),
                source_stack: source_stack.into(),
            },
        )
    }

    /// Same as [`Self::add_env_variable_if_not_exist`], flagged secret.
    pub fn add_secret_env_variable_if_not_exist(
        &self,
        name: impl Into<String>,
        value: impl Into<String>,
        source_resource_type: impl Into<String>,
        source_resource_name: impl Into<String>,
        source_stack: impl Into<String>,
    ) -> bool {
        self.add_variable(
            ComputeEnvVariable {
                name: name.into(),
                value: value.into(),
                is_secret: true,
                source_resource_type: source_resource_type.into(),
                source_resource_name: source_resource_name.into(),
                source_stack: source_stack.into(),
            },
        )
    }

    fn add_variable(&self, variable: ComputeEnvVariable) -> bool {
        let mut inner = self.inner.lock().expect("collector mutex poisoned");
        if inner.env_variables.iter().any(|v| v.name == variable.name) {
            trace!(name = %variable.name, "Env variable already registered, keeping first");
            return false;
        }
        debug!(name = %variable.name, secret = variable.is_secret, "Registered env variable");
        inner.env_variables.push(variable);
        true
    }

    /// Make a resource's resolved fields addressable as
    /// `${resource:<resourceName>.<fieldName>}`. First registration of a
    /// resource name wins.
    pub fn add_resource_tpl_extension(
        &self,
        resource_name: impl Into<String>,
        fields: BTreeMap<String, String>,
    ) {
        let resource_name = resource_name.into();
        let mut inner = self.inner.lock().expect("collector mutex poisoned");
        inner.tpl_extensions.entry(resource_name).or_insert(fields);
    }

    /// Record a named output to publish at flush time.
    pub fn add_output(&self, export_key: impl Into<String>, value: impl Into<String>) {
        let mut inner = self.inner.lock().expect("collector mutex poisoned");
        inner.outputs.insert(export_key.into(), value.into());
    }

    /// Record a dependency edge.
    pub fn add_dependency(&self, dependency: DependencyRef) {
        let mut inner = self.inner.lock().expect("collector mutex poisoned");
        if !inner.dependencies.contains(&dependency) {
            inner.dependencies.push(dependency);
        }
    }

    pub fn env_variables(&self) -> Vec<ComputeEnvVariable> {
        let inner = self.inner.lock().expect("collector mutex poisoned");
        inner
            .env_variables
            .iter()
            .filter(|v| !v.is_secret)
            .cloned()
            .collect()
    }

    pub fn secret_env_variables(&self) -> Vec<ComputeEnvVariable> {
        let inner = self.inner.lock().expect("collector mutex poisoned");
        inner
            .env_variables
            .iter()
            .filter(|v| v.is_secret)
            .cloned()
            .collect()
    }

    pub fn dependencies(&self) -> Vec<DependencyRef> {
        self.inner
            .lock()
            .expect("collector mutex poisoned")
            .dependencies
            .clone()
    }

    pub fn outputs(&self) -> BTreeMap<String, String> {
        self.inner
            .lock()
            .expect("collector mutex poisoned")
            .outputs
            .clone()
    }

    /// Snapshot of registered template extensions:
    /// resourceName -> fieldName -> value.
    pub fn tpl_extensions(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.inner
            .lock()
            .expect("collector mutex poisoned")
            .tpl_extensions
            .clone()
    }

    /// Fetch the referenced stack's outputs for one environment, memoized
    /// per reference and environment.
    pub async fn resolve_reference(
        &self,
        reference: &str,
        environment: &str,
    ) -> ComputeResult<Arc<BTreeMap<String, String>>> {
        let cache_key = format!("{reference}@{environment}");
        {
            let cache = self.reference_cache.lock().await;
            if let Some(outputs) = cache.get(&cache_key) {
                trace!(reference, environment, "Stack reference served from cache");
                return Ok(outputs.clone());
            }
        }

        let outputs = Arc::new(self.backend.fetch_outputs(reference, environment).await?);
        let mut cache = self.reference_cache.lock().await;
        let entry = cache.entry(cache_key).or_insert_with(|| outputs.clone());
        Ok(entry.clone())
    }

    /// Fetch one named output of a parent stack.
    ///
    /// An empty string is indistinguishable from "not set" and is treated
    /// as missing for required outputs.
    pub async fn get_parent_output(
        &self,
        reference: &StackReference,
        export_key: &str,
        is_secret: bool,
    ) -> ComputeResult<String> {
        let outputs = self
            .resolve_reference(&reference.full_reference, &reference.environment)
            .await?;
        match outputs.get(export_key) {
            Some(value) if !value.is_empty() => {
                if is_secret {
                    debug!(reference = %reference, export_key, "Fetched secret parent output");
                } else {
                    debug!(reference = %reference, export_key, value = %value, "Fetched parent output");
                }
                Ok(value.clone())
            }
            _ => Err(ComputeError::EmptyRequiredOutput {
                export_key: export_key.to_string(),
                reference: reference.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::MemoryStateBackend;

    fn collector() -> ComputeContextCollector {
        ComputeContextCollector::new(Arc::new(MemoryStateBackend::new()))
    }

    #[test]
    fn add_if_not_exist_keeps_the_first_value() {
        let collector = collector();
        assert!(collector.add_env_variable_if_not_exist("BUCKET_NAME", "logs", "bucket", "logs", "infra"));
        assert!(!collector.add_env_variable_if_not_exist("BUCKET_NAME", "assets", "bucket", "assets", "infra"));

        let vars = collector.env_variables();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].value, "logs");
        assert_eq!(vars[0].source_resource_name, "logs");
    }

    #[test]
    fn secret_and_public_variables_are_partitioned() {
        let collector = collector();
        collector.add_env_variable_if_not_exist("HOST", "db.internal", "postgres", "db", "infra");
        collector.add_secret_env_variable_if_not_exist("PASSWORD", "hunter2", "postgres", "db", "infra");

        assert_eq!(collector.env_variables().len(), 1);
        assert_eq!(collector.secret_env_variables().len(), 1);
        assert!(collector.secret_env_variables()[0].is_secret);
    }

    #[test]
    fn secret_flag_does_not_bypass_name_uniqueness() {
        let collector = collector();
        collector.add_env_variable_if_not_exist("KEY", "public", "t", "r", "s");
        assert!(!collector.add_secret_env_variable_if_not_exist("KEY", "secret", "t", "r", "s"));
        assert!(collector.secret_env_variables().is_empty());
    }

    #[test]
    fn racing_registrations_produce_exactly_one_winner() {
        let collector = Arc::new(collector());
        let mut handles = Vec::new();
        for i in 0..16 {
            let collector = collector.clone();
            handles.push(std::thread::spawn(move || {
                collector.add_env_variable_if_not_exist(
                    "GENERIC",
                    format!("value-{i}"),
                    "bucket",
                    format!("r{i}"),
                    "infra",
                )
            }));
        }
        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
        assert_eq!(collector.env_variables().len(), 1);
    }

    #[test]
    fn tpl_extension_first_registration_wins() {
        let collector = collector();
        collector.add_resource_tpl_extension(
            "db",
            BTreeMap::from([("endpoint".to_string(), "first".to_string())]),
        );
        collector.add_resource_tpl_extension(
            "db",
            BTreeMap::from([("endpoint".to_string(), "second".to_string())]),
        );
        assert_eq!(collector.tpl_extensions()["db"]["endpoint"], "first");
    }

    #[test]
    fn absorb_applies_staged_registrations_in_call_order() {
        let collector = collector();

        // Two staged collectors racing on the same generic alias; the one
        // absorbed first wins no matter which processor finished first.
        let second = collector.stage();
        second.add_env_variable_if_not_exist("BUCKET_NAME", "assets", "bucket", "assets", "infra");
        second.add_env_variable_if_not_exist("BUCKET_NAME_ASSETS", "assets", "bucket", "assets", "infra");

        let first = collector.stage();
        first.add_env_variable_if_not_exist("BUCKET_NAME", "logs", "bucket", "logs", "infra");
        first.add_env_variable_if_not_exist("BUCKET_NAME_LOGS", "logs", "bucket", "logs", "infra");
        first.add_dependency(DependencyRef {
            stack_name: "infra".to_string(),
            resource_type: "bucket".to_string(),
            resource_name: "logs".to_string(),
        });

        collector.absorb(first);
        collector.absorb(second);

        let vars: BTreeMap<String, String> = collector
            .env_variables()
            .into_iter()
            .map(|v| (v.name, v.value))
            .collect();
        assert_eq!(vars["BUCKET_NAME"], "logs");
        assert_eq!(vars["BUCKET_NAME_LOGS"], "logs");
        assert_eq!(vars["BUCKET_NAME_ASSETS"], "assets");
        assert_eq!(collector.dependencies().len(), 1);
    }

    #[tokio::test]
    async fn parent_outputs_are_memoized_per_reference() {
        let backend = Arc::new(MemoryStateBackend::new());
        backend
            .seed(
                "acme/infra/infra",
                "prod",
                BTreeMap::from([("infra-logs-bucket-name".to_string(), "acme-logs".to_string())]),
            )
            .await;

        let collector = ComputeContextCollector::new(backend.clone());
        let reference = StackReference::parse("acme/infra/infra", "prod").unwrap();

        let first = collector
            .get_parent_output(&reference, "infra-logs-bucket-name", false)
            .await
            .unwrap();
        assert_eq!(first, "acme-logs");

        // Mutating the backend after the first read must not be visible:
        // the collector serves the memoized snapshot. Staging collectors
        // share the same cache.
        backend
            .seed(
                "acme/infra/infra",
                "prod",
                BTreeMap::from([("infra-logs-bucket-name".to_string(), "changed".to_string())]),
            )
            .await;
        let second = collector
            .stage()
            .get_parent_output(&reference, "infra-logs-bucket-name", false)
            .await
            .unwrap();
        assert_eq!(second, "acme-logs");
    }

    #[tokio::test]
    async fn outputs_are_scoped_per_environment() {
        let backend = Arc::new(MemoryStateBackend::new());
        backend
            .seed(
                "acme/infra/infra",
                "prod",
                BTreeMap::from([("infra-logs-bucket-name".to_string(), "prod-bucket".to_string())]),
            )
            .await;
        backend
            .seed(
                "acme/infra/infra",
                "staging",
                BTreeMap::from([("infra-logs-bucket-name".to_string(), "staging-bucket".to_string())]),
            )
            .await;

        let collector = ComputeContextCollector::new(backend);
        let prod = StackReference::parse("acme/infra/infra", "prod").unwrap();
        let staging = StackReference::parse("acme/infra/infra", "staging").unwrap();

        let prod_value = collector
            .get_parent_output(&prod, "infra-logs-bucket-name", false)
            .await
            .unwrap();
        let staging_value = collector
            .get_parent_output(&staging, "infra-logs-bucket-name", false)
            .await
            .unwrap();
        assert_eq!(prod_value, "prod-bucket");
        assert_eq!(staging_value, "staging-bucket");
    }

    #[tokio::test]
    async fn missing_and_empty_outputs_are_hard_errors() {
        let backend = Arc::new(MemoryStateBackend::new());
        backend
            .seed(
                "acme/infra/infra",
                "prod",
                BTreeMap::from([("infra-db-endpoint".to_string(), String::new())]),
            )
            .await;

        let collector = ComputeContextCollector::new(backend);
        let reference = StackReference::parse("acme/infra/infra", "prod").unwrap();

        for key in ["infra-db-endpoint", "infra-db-password"] {
            let err = collector
                .get_parent_output(&reference, key, true)
                .await
                .unwrap_err();
            match err {
                ComputeError::EmptyRequiredOutput { export_key, .. } => {
                    assert_eq!(export_key, key);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }
}
