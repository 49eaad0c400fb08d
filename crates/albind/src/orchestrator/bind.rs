//! Permission and target binder
//!
//! Makes the invoke permission and target group exist exactly once for a
//! deployment identity and registers the alias as the sole target. The
//! invoke-permission statement is the authoritative "already bound" signal;
//! when it is present the whole sequence short-circuits with zero mutations.

use crate::aws::api::{FunctionsApi, LoadBalancingApi, PublishedVersion, TargetGroup};
use crate::identity::DeploymentIdentity;
use anyhow::{bail, Context, Result};
use tracing::{debug, info};

/// Principal the invoke permission is restricted to
pub const LOAD_BALANCER_PRINCIPAL: &str = "elasticloadbalancing.amazonaws.com";

/// What the binder did for this deployment
#[derive(Debug, Clone)]
pub enum BindingOutcome {
    /// The permission statement already existed; nothing was touched
    AlreadyBound,
    /// Fresh binding: the new target group still needs a routing rule
    Created { target_group: TargetGroup },
}

/// Ensure the binding for `identity` exists exactly once.
///
/// The policy read distinguishes three cases: statement present (bound),
/// policy absent (unbound), and a read failure, which aborts the command
/// rather than being treated as "unbound", so a transient failure can never
/// trigger duplicate creation.
pub async fn ensure_binding(
    functions: &impl FunctionsApi,
    elb: &impl LoadBalancingApi,
    function_name: &str,
    identity: &DeploymentIdentity,
    published: &PublishedVersion,
) -> Result<BindingOutcome> {
    let safe_name = identity.safe_name();
    let statement_id = identity.statement_id();

    debug!(function = %function_name, qualifier = %safe_name, "Checking for existing binding");
    let bound = functions
        .invoke_policy_sids(function_name, safe_name)
        .await
        .context("checking current invoke permissions")?
        .is_some_and(|sids| sids.iter().any(|sid| sid == &statement_id));

    if bound {
        info!(statement_id = %statement_id, "Binding already exists, skipping target group and rule setup");
        return Ok(BindingOutcome::AlreadyBound);
    }

    // The permission statement is the only existence marker, so a target
    // group under this name without one means an earlier run died partway.
    if let Some(stale) = elb.find_target_group(safe_name).await? {
        bail!(
            "target group '{}' already exists without a matching invoke permission; \
             a previous run likely failed partway - deregister this deployment or \
             delete the target group, then retry",
            stale.name
        );
    }

    let target_group = elb.create_lambda_target_group(safe_name).await?;

    functions
        .add_invoke_permission(
            function_name,
            safe_name,
            &statement_id,
            LOAD_BALANCER_PRINCIPAL,
            &target_group.arn,
        )
        .await?;

    let alias_arn = published.alias_arn(safe_name);
    elb.register_function_target(&target_group.arn, &alias_arn)
        .await?;

    info!(target_group = %target_group.name, target = %alias_arn, "Deployment bound");
    Ok(BindingOutcome::Created { target_group })
}
