//! Cross-stack references and the persisted-outputs backend.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ComputeError, ComputeResult};

/// A read-only handle to another stack's persisted provisioning outputs.
///
/// Outputs are published per environment: the same stack deployed to `prod`
/// and `staging` has two distinct output sets, and a reference always names
/// which one it reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackReference {
    /// `organization/project/stackName`.
    pub full_reference: String,
    pub stack_name: String,
    /// Environment whose published outputs this reference reads.
    pub environment: String,
}

impl StackReference {
    /// Parse a fully-qualified reference string, scoped to one environment.
    pub fn parse(reference: &str, environment: &str) -> ComputeResult<Self> {
        if environment.is_empty() || environment.contains('/') {
            return Err(ComputeError::InvalidReference(format!(
                "{reference} (bad environment '{environment}')"
            )));
        }
        let parts: Vec<&str> = reference.split('/').collect();
        match parts.as_slice() {
            [org, project, stack] if !org.is_empty() && !project.is_empty() && !stack.is_empty() => {
                Ok(Self {
                    full_reference: reference.to_string(),
                    stack_name: stack.to_string(),
                    environment: environment.to_string(),
                })
            }
            _ => Err(ComputeError::InvalidReference(reference.to_string())),
        }
    }
}

impl std::fmt::Display for StackReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.full_reference, self.environment)
    }
}

/// Access to persisted stack outputs, keyed by reference and environment.
///
/// Remote reads inherit the caller's context deadline; the engine itself
/// imposes no timeout policy.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Fetch every output the referenced stack published for `environment`.
    async fn fetch_outputs(
        &self,
        reference: &str,
        environment: &str,
    ) -> ComputeResult<BTreeMap<String, String>>;

    /// Publish named outputs for the referenced stack and environment.
    async fn publish_outputs(
        &self,
        reference: &str,
        environment: &str,
        outputs: &BTreeMap<String, String>,
    ) -> ComputeResult<()>;
}

/// File-backed state: one JSON document per stack and environment under
/// `<root>/<organization>/<project>/<stackName>/<environment>.json`.
#[derive(Debug, Clone)]
pub struct FileStateBackend {
    root: PathBuf,
}

impl FileStateBackend {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, reference: &str, environment: &str) -> ComputeResult<PathBuf> {
        // Validates the 3-segment form and the environment as a side effect.
        StackReference::parse(reference, environment)?;
        Ok(self.root.join(reference).join(format!("{environment}.json")))
    }
}

#[async_trait]
impl StateBackend for FileStateBackend {
    async fn fetch_outputs(
        &self,
        reference: &str,
        environment: &str,
    ) -> ComputeResult<BTreeMap<String, String>> {
        let path = self.path_for(reference, environment)?;
        if !path.exists() {
            debug!(reference, environment, "No persisted outputs");
            return Ok(BTreeMap::new());
        }
        let content =
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| ComputeError::StateBackend {
                    reference: reference.to_string(),
                    message: e.to_string(),
                })?;
        serde_json::from_str(&content).map_err(|e| ComputeError::StateBackend {
            reference: reference.to_string(),
            message: format!("corrupt outputs document: {e}"),
        })
    }

    async fn publish_outputs(
        &self,
        reference: &str,
        environment: &str,
        outputs: &BTreeMap<String, String>,
    ) -> ComputeResult<()> {
        let path = self.path_for(reference, environment)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Merge so repeated applies extend rather than clobber.
        let mut merged = self.fetch_outputs(reference, environment).await?;
        merged.extend(outputs.iter().map(|(k, v)| (k.clone(), v.clone())));
        let content = serde_json::to_string_pretty(&merged)?;
        tokio::fs::write(&path, content).await?;
        debug!(reference, environment, count = outputs.len(), "Published outputs");
        Ok(())
    }
}

/// In-memory state backend for tests and previews.
#[derive(Debug, Default)]
pub struct MemoryStateBackend {
    stacks: RwLock<BTreeMap<String, BTreeMap<String, String>>>,
}

impl MemoryStateBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(reference: &str, environment: &str) -> String {
        format!("{reference}@{environment}")
    }

    /// Seed the outputs of one stack in one environment.
    pub async fn seed(&self, reference: &str, environment: &str, outputs: BTreeMap<String, String>) {
        self.stacks
            .write()
            .await
            .insert(Self::key(reference, environment), outputs);
    }
}

#[async_trait]
impl StateBackend for MemoryStateBackend {
    async fn fetch_outputs(
        &self,
        reference: &str,
        environment: &str,
    ) -> ComputeResult<BTreeMap<String, String>> {
        StackReference::parse(reference, environment)?;
        Ok(self
            .stacks
            .read()
            .await
            .get(&Self::key(reference, environment))
            .cloned()
            .unwrap_or_default())
    }

    async fn publish_outputs(
        &self,
        reference: &str,
        environment: &str,
        outputs: &BTreeMap<String, String>,
    ) -> ComputeResult<()> {
        StackReference::parse(reference, environment)?;
        self.stacks
            .write()
            .await
            .entry(Self::key(reference, environment))
            .or_default()
            .extend(outputs.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_segment_references() {
        let reference = StackReference::parse("acme/infra/infra", "prod").unwrap();
        assert_eq!(reference.stack_name, "infra");
        assert_eq!(reference.full_reference, "acme/infra/infra");
        assert_eq!(reference.environment, "prod");
    }

    #[test]
    fn rejects_malformed_references() {
        for bad in ["", "acme", "acme/infra", "acme/infra/infra/extra", "a//b"] {
            assert!(
                matches!(
                    StackReference::parse(bad, "prod"),
                    Err(ComputeError::InvalidReference(_))
                ),
                "expected InvalidReference for {bad:?}"
            );
        }
        for bad_env in ["", "pr/od"] {
            assert!(matches!(
                StackReference::parse("acme/infra/infra", bad_env),
                Err(ComputeError::InvalidReference(_))
            ));
        }
    }

    #[tokio::test]
    async fn file_backend_round_trips_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStateBackend::new(dir.path());

        let outputs =
            BTreeMap::from([("infra-logs-bucket-name".to_string(), "acme-logs".to_string())]);
        backend
            .publish_outputs("acme/infra/infra", "prod", &outputs)
            .await
            .unwrap();

        let fetched = backend
            .fetch_outputs("acme/infra/infra", "prod")
            .await
            .unwrap();
        assert_eq!(fetched, outputs);
    }

    #[tokio::test]
    async fn file_backend_merges_on_republish() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStateBackend::new(dir.path());

        backend
            .publish_outputs(
                "acme/infra/infra",
                "prod",
                &BTreeMap::from([("a".to_string(), "1".to_string())]),
            )
            .await
            .unwrap();
        backend
            .publish_outputs(
                "acme/infra/infra",
                "prod",
                &BTreeMap::from([("b".to_string(), "2".to_string())]),
            )
            .await
            .unwrap();

        let fetched = backend
            .fetch_outputs("acme/infra/infra", "prod")
            .await
            .unwrap();
        assert_eq!(fetched.len(), 2);
    }

    #[tokio::test]
    async fn environments_publish_to_disjoint_documents() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStateBackend::new(dir.path());

        backend
            .publish_outputs(
                "acme/infra/infra",
                "prod",
                &BTreeMap::from([("infra-logs-bucket-name".to_string(), "prod-bucket".to_string())]),
            )
            .await
            .unwrap();
        backend
            .publish_outputs(
                "acme/infra/infra",
                "staging",
                &BTreeMap::from([("infra-logs-bucket-name".to_string(), "staging-bucket".to_string())]),
            )
            .await
            .unwrap();

        let prod = backend
            .fetch_outputs("acme/infra/infra", "prod")
            .await
            .unwrap();
        let staging = backend
            .fetch_outputs("acme/infra/infra", "staging")
            .await
            .unwrap();
        assert_eq!(prod["infra-logs-bucket-name"], "prod-bucket");
        assert_eq!(staging["infra-logs-bucket-name"], "staging-bucket");
    }

    #[tokio::test]
    async fn missing_outputs_fetch_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStateBackend::new(dir.path());
        let fetched = backend
            .fetch_outputs("acme/ghost/ghost", "prod")
            .await
            .unwrap();
        assert!(fetched.is_empty());
    }
}
