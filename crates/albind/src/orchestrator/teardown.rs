//! Teardown coordinator
//!
//! Locates and deletes the routing rule, target group, and invoke-permission
//! statement belonging to a deployment identity, in dependency order. There
//! is no compensation: a failure partway leaves the earlier deletions in
//! place and the operator finishes by hand.

use crate::aws::api::{FunctionsApi, LoadBalancingApi};
use crate::identity::DeploymentIdentity;
use crate::lookup::{require, Lookup, LookupError};
use crate::orchestrator::deploy::require_binding;
use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

/// Deregister `version`/`stage` for the project's configured binding.
pub async fn deregister(
    project_dir: &Path,
    stage: &str,
    version: &str,
    elb: &impl LoadBalancingApi,
    functions: &impl FunctionsApi,
) -> Result<()> {
    let binding = require_binding(project_dir)?;
    let identity = DeploymentIdentity::new(&binding.service_name, version, stage)?;
    unregister(
        elb,
        functions,
        &binding.lambda.name,
        &binding.load_balancer,
        &identity,
    )
    .await
}

/// Remove the rule, target group, and permission for `identity`.
///
/// Multiplicity is handled explicitly: zero matching rules degrades to a
/// warning (an earlier run may have died before routing), while several
/// matching rules abort - deleting a guessed rule could break an unrelated
/// deployment. The balancer and its listener are never touched.
pub async fn unregister(
    elb: &impl LoadBalancingApi,
    functions: &impl FunctionsApi,
    function_name: &str,
    load_balancer_name: &str,
    identity: &DeploymentIdentity,
) -> Result<()> {
    let safe_name = identity.safe_name();

    let lb = require(
        elb.find_load_balancer(load_balancer_name).await?,
        "load balancer",
        load_balancer_name,
    )?;
    let listeners = elb.listeners(&lb.arn).await?;
    let listener = require(listeners.into_iter().next(), "listener", load_balancer_name)?;

    match elb.find_target_group(safe_name).await? {
        Some(target_group) => {
            let rules = elb.rules(&listener.arn).await?;
            let matches = rules
                .into_iter()
                .filter(|r| r.forward_target_groups.contains(&target_group.arn));

            match Lookup::from_matches(matches) {
                Lookup::One(rule) => {
                    elb.delete_rule(&rule.arn).await?;
                    info!(priority = ?rule.priority, "Routing rule deleted");
                }
                Lookup::NotFound => {
                    warn!(
                        target_group = %target_group.name,
                        "No routing rule references the target group, continuing teardown"
                    );
                }
                Lookup::Ambiguous(all) => {
                    return Err(LookupError::Ambiguous {
                        what: "routing rule",
                        key: target_group.name.clone(),
                        count: all.len(),
                    }
                    .into());
                }
            }

            elb.delete_target_group(&target_group.arn).await?;
            info!(target_group = %target_group.name, "Target group deleted");
        }
        None => {
            warn!(
                name = %safe_name,
                "Target group not found, removing the invoke permission only"
            );
        }
    }

    functions
        .remove_invoke_permission(function_name, safe_name, &identity.statement_id())
        .await?;

    info!(deployment = %safe_name, "Deployment unregistered");
    Ok(())
}
