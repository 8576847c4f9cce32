//! Compute processor for shared postgres instances.
//!
//! Beyond harvesting outputs, this processor provisions an ephemeral side
//! effect: a role and schema scoped to the consuming stack, created inside
//! the parent-owned instance with a fresh random credential. The role is
//! created synchronously before the processor returns; failure fails the
//! whole deploy.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, info};

use strato_stack::{DeployParams, ResourceDescriptor};

use crate::collector::{ComputeContextCollector, DependencyRef};
use crate::error::ComputeResult;
use crate::processor::{qualified_env_name, ComputeProcessor};
use crate::processors::remote::RemoteCommandRunner;
use crate::reference::StackReference;

const CREDENTIAL_LEN: usize = 24;

pub struct PostgresProcessor {
    runner: Arc<dyn RemoteCommandRunner>,
}

impl PostgresProcessor {
    pub fn new(runner: Arc<dyn RemoteCommandRunner>) -> Self {
        Self { runner }
    }

    /// Role/schema name scoped to the consuming stack and environment.
    fn role_name(params: &DeployParams) -> String {
        let mut role = String::with_capacity(params.stack_name.len() + params.environment.len() + 1);
        for c in format!("{}_{}", params.stack_name, params.environment).chars() {
            if c.is_ascii_alphanumeric() || c == '_' {
                role.push(c.to_ascii_lowercase());
            } else {
                role.push('_');
            }
        }
        role
    }
}

#[async_trait]
impl ComputeProcessor for PostgresProcessor {
    fn resource_type(&self) -> &str {
        "postgres"
    }

    async fn process(
        &self,
        descriptor: &ResourceDescriptor,
        owner: &StackReference,
        params: &DeployParams,
        collector: &ComputeContextCollector,
    ) -> ComputeResult<()> {
        let endpoint_key =
            DeployParams::export_key(&owner.stack_name, &descriptor.name, "endpoint");
        let password_key =
            DeployParams::export_key(&owner.stack_name, &descriptor.name, "password");

        let endpoint = collector
            .get_parent_output(owner, &endpoint_key, false)
            .await?;
        let admin_password = collector
            .get_parent_output(owner, &password_key, true)
            .await?;

        let role = Self::role_name(params);
        let credential: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CREDENTIAL_LEN)
            .map(char::from)
            .collect();

        let command = format!(
            "CREATE ROLE {role} LOGIN PASSWORD '{credential}'; \
             CREATE SCHEMA IF NOT EXISTS {role} AUTHORIZATION {role};"
        );
        info!(
            resource = %descriptor.name,
            role = %role,
            "Provisioning scoped database role"
        );
        self.runner.run(&endpoint, &admin_password, &command).await?;

        collector.add_env_variable_if_not_exist(
            qualified_env_name("POSTGRES_HOST", &descriptor.name),
            &endpoint,
            self.resource_type(),
            &descriptor.name,
            &owner.stack_name,
        );
        collector.add_env_variable_if_not_exist(
            "POSTGRES_HOST",
            &endpoint,
            self.resource_type(),
            &descriptor.name,
            &owner.stack_name,
        );
        collector.add_env_variable_if_not_exist(
            "POSTGRES_USER",
            &role,
            self.resource_type(),
            &descriptor.name,
            &owner.stack_name,
        );
        collector.add_secret_env_variable_if_not_exist(
            "POSTGRES_PASSWORD",
            &credential,
            self.resource_type(),
            &descriptor.name,
            &owner.stack_name,
        );
        debug!(resource = %descriptor.name, "Bound postgres outputs");

        collector.add_resource_tpl_extension(
            &descriptor.name,
            BTreeMap::from([
                ("endpoint".to_string(), endpoint),
                ("user".to_string(), role.clone()),
                ("password".to_string(), credential),
                ("schema".to_string(), role),
            ]),
        );

        collector.add_dependency(DependencyRef {
            stack_name: owner.stack_name.clone(),
            resource_type: self.resource_type().to_string(),
            resource_name: descriptor.name.clone(),
        });

        Ok(())
    }
}
