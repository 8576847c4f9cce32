//! Compute processor for object-storage buckets.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;

use strato_stack::{DeployParams, ResourceDescriptor};

use crate::collector::{ComputeContextCollector, DependencyRef};
use crate::error::ComputeResult;
use crate::processor::{qualified_env_name, ComputeProcessor};
use crate::reference::StackReference;

const ENV_PREFIX: &str = "BUCKET_NAME";

/// Binds a bucket owned by the parent stack into the consuming workload.
///
/// Registers both the resource-qualified env name (`BUCKET_NAME_<RES>`) and
/// the generic alias (`BUCKET_NAME`, claimed first-wins), plus a `resource`
/// template extension with the bucket's fields.
pub struct BucketProcessor;

#[async_trait]
impl ComputeProcessor for BucketProcessor {
    fn resource_type(&self) -> &str {
        "bucket"
    }

    async fn process(
        &self,
        descriptor: &ResourceDescriptor,
        owner: &StackReference,
        _params: &DeployParams,
        collector: &ComputeContextCollector,
    ) -> ComputeResult<()> {
        let bucket_key =
            DeployParams::export_key(&owner.stack_name, &descriptor.name, "bucket-name");
        let bucket_name = collector
            .get_parent_output(owner, &bucket_key, false)
            .await?;

        let region_key = DeployParams::export_key(&owner.stack_name, &descriptor.name, "region");
        // Region is optional; only the bucket name is a required output.
        let region = collector
            .get_parent_output(owner, &region_key, false)
            .await
            .ok();

        collector.add_env_variable_if_not_exist(
            qualified_env_name(ENV_PREFIX, &descriptor.name),
            &bucket_name,
            self.resource_type(),
            &descriptor.name,
            &owner.stack_name,
        );
        let claimed_generic = collector.add_env_variable_if_not_exist(
            ENV_PREFIX,
            &bucket_name,
            self.resource_type(),
            &descriptor.name,
            &owner.stack_name,
        );
        debug!(
            resource = %descriptor.name,
            bucket = %bucket_name,
            claimed_generic,
            "Bound bucket outputs"
        );

        let mut fields = BTreeMap::from([("bucket".to_string(), bucket_name)]);
        if let Some(region) = region {
            fields.insert("region".to_string(), region);
        }
        collector.add_resource_tpl_extension(&descriptor.name, fields);

        collector.add_dependency(DependencyRef {
            stack_name: owner.stack_name.clone(),
            resource_type: self.resource_type().to_string(),
            resource_name: descriptor.name.clone(),
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComputeError;
    use crate::reference::MemoryStateBackend;
    use std::sync::Arc;

    fn descriptor(name: &str) -> ResourceDescriptor {
        ResourceDescriptor {
            resource_type: "bucket".to_string(),
            name: name.to_string(),
            config: serde_json::json!({}),
        }
    }

    async fn seeded_collector() -> (ComputeContextCollector, StackReference) {
        let backend = Arc::new(MemoryStateBackend::new());
        backend
            .seed(
                "acme/infra/infra",
                "prod",
                BTreeMap::from([
                    ("infra-logs-bucket-name".to_string(), "acme-logs".to_string()),
                    ("infra-assets-bucket-name".to_string(), "acme-assets".to_string()),
                    ("infra-logs-region".to_string(), "eu-west-1".to_string()),
                ]),
            )
            .await;
        (
            ComputeContextCollector::new(backend),
            StackReference::parse("acme/infra/infra", "prod").unwrap(),
        )
    }

    #[tokio::test]
    async fn first_declared_bucket_claims_the_generic_alias() {
        let (collector, owner) = seeded_collector().await;
        let params = DeployParams::new("api", "prod", "1.0.0");

        BucketProcessor
            .process(&descriptor("logs"), &owner, &params, &collector)
            .await
            .unwrap();
        BucketProcessor
            .process(&descriptor("assets"), &owner, &params, &collector)
            .await
            .unwrap();

        let vars: BTreeMap<String, String> = collector
            .env_variables()
            .into_iter()
            .map(|v| (v.name, v.value))
            .collect();

        assert_eq!(vars["BUCKET_NAME"], "acme-logs");
        assert_eq!(vars["BUCKET_NAME_LOGS"], "acme-logs");
        assert_eq!(vars["BUCKET_NAME_ASSETS"], "acme-assets");
        assert_ne!(vars["BUCKET_NAME_LOGS"], vars["BUCKET_NAME_ASSETS"]);
    }

    #[tokio::test]
    async fn registers_resource_template_extension() {
        let (collector, owner) = seeded_collector().await;
        let params = DeployParams::new("api", "prod", "1.0.0");

        BucketProcessor
            .process(&descriptor("logs"), &owner, &params, &collector)
            .await
            .unwrap();

        let extensions = collector.tpl_extensions();
        assert_eq!(extensions["logs"]["bucket"], "acme-logs");
        assert_eq!(extensions["logs"]["region"], "eu-west-1");
    }

    #[tokio::test]
    async fn missing_bucket_output_fails_with_the_export_key() {
        let (collector, owner) = seeded_collector().await;
        let params = DeployParams::new("api", "prod", "1.0.0");

        let err = BucketProcessor
            .process(&descriptor("ghost"), &owner, &params, &collector)
            .await
            .unwrap_err();
        match err {
            ComputeError::EmptyRequiredOutput { export_key, .. } => {
                assert_eq!(export_key, "infra-ghost-bucket-name");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
