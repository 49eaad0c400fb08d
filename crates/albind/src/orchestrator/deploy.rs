//! The update flow
//!
//! Publish a new version for a (version, stage) pair, reconcile its binding,
//! and - only when the binding is fresh - install the routing rule. Repeat
//! deploys of an existing binding move the alias and nothing else.

use crate::aws::api::{FunctionsApi, LoadBalancingApi};
use crate::config::{self, BindingConfig};
use crate::identity::DeploymentIdentity;
use crate::orchestrator::bind::{self, BindingOutcome};
use crate::orchestrator::publish;
use crate::orchestrator::route::{self, InstalledRoute};
use crate::template::{self, RouteVars};
use anyhow::{bail, Result};
use std::path::Path;
use tracing::info;

/// What one `update` run did
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub version: String,
    pub route_path: String,
    /// Present only when this run created the binding and installed a rule
    pub route: Option<InstalledRoute>,
}

/// Load the project's binding configuration or fail with a pointer to `init`.
pub fn require_binding(project_dir: &Path) -> Result<BindingConfig> {
    match config::load_binding(project_dir)? {
        Some(binding) => Ok(binding),
        None => bail!(
            "project '{}' has no binding configuration; run init first",
            project_dir.display()
        ),
    }
}

/// Deploy `version` of the configured service to `stage`.
pub async fn deploy(
    project_dir: &Path,
    stage: &str,
    version: &str,
    elb: &impl LoadBalancingApi,
    functions: &impl FunctionsApi,
) -> Result<DeployOutcome> {
    let binding = require_binding(project_dir)?;
    let identity = DeploymentIdentity::new(&binding.service_name, version, stage)?;
    let route_path = template::render(
        &binding.path_template,
        &RouteVars {
            service: &binding.service_name,
            stage,
            version,
        },
    )?;

    info!(
        deployment = %identity.safe_name(),
        path = %route_path,
        "Deploying version"
    );

    let package_dir = project_dir.join(&binding.lambda.dir);
    let published = publish::deploy_version(
        functions,
        &binding.lambda,
        &package_dir,
        identity.safe_name(),
        &route_path,
    )
    .await?;

    let outcome = bind::ensure_binding(
        functions,
        elb,
        &binding.lambda.name,
        &identity,
        &published,
    )
    .await?;

    let route = match outcome {
        BindingOutcome::Created { target_group } => Some(
            route::install_route(elb, &binding.load_balancer, &route_path, &target_group).await?,
        ),
        BindingOutcome::AlreadyBound => {
            info!(version = %published.version, "Existing route now serves the new version");
            None
        }
    };

    Ok(DeployOutcome {
        version: published.version,
        route_path,
        route,
    })
}
