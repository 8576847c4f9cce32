//! Parent/child stack reconciliation.
//!
//! Runs before a deploy: resolves the parent reference and decides which
//! environment the parent's secrets and outputs are resolved with. The
//! child's own target environment propagates to the parent unless the stack
//! declares an explicit `parentEnv` override (e.g. a `beta` child reusing
//! `prod` parent secrets).

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{StackError, StackResult};
use crate::model::{DeployParams, Stack};

/// A resolved link to the parent stack for one deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLink {
    /// Fully-qualified reference, `organization/project/stackName`.
    pub reference: String,
    /// The parent stack's name.
    pub stack_name: String,
    /// Environment used when resolving the parent's environment-scoped
    /// secrets and outputs.
    pub resolution_env: String,
}

/// A stack whose parent relationship has been resolved for one deploy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledStack {
    pub stack: Stack,
    pub params: DeployParams,
    pub parent: Option<ParentLink>,
}

/// Resolve the parent/child relationship for one deploy.
pub fn reconcile(stack: &Stack, params: &DeployParams) -> StackResult<ReconciledStack> {
    let parent = match &stack.parent_stack {
        None => None,
        Some(reference) => {
            let (org, project) = split_parent_reference(&stack.name, reference)?;
            let resolution_env = stack
                .parent_env
                .clone()
                .unwrap_or_else(|| params.environment.clone());

            if stack.parent_env.is_some() {
                info!(
                    stack = %stack.name,
                    parent = %reference,
                    environment = %resolution_env,
                    "Parent environment explicitly overridden"
                );
            } else {
                debug!(
                    stack = %stack.name,
                    parent = %reference,
                    environment = %resolution_env,
                    "Propagating child environment to parent"
                );
            }

            Some(ParentLink {
                // By convention the parent's stack name is its project name.
                reference: format!("{org}/{project}/{project}"),
                stack_name: project.to_string(),
                resolution_env,
            })
        }
    };

    Ok(ReconciledStack {
        stack: stack.clone(),
        params: params.clone(),
        parent,
    })
}

fn split_parent_reference<'a>(child: &str, reference: &'a str) -> StackResult<(&'a str, &'a str)> {
    let mut parts = reference.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(org), Some(project), None) if !org.is_empty() && !project.is_empty() => {
            Ok((org, project))
        }
        _ => Err(StackError::MissingParentStack {
            child: child.to_string(),
            parent: reference.to_string(),
            reason: "expected an 'org/project' reference".to_string(),
        }),
    }
}
