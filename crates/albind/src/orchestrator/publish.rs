//! Function publisher
//!
//! First-time creation of the function and its execution role, and the
//! per-deploy path: configure the route prefix, publish an immutable version,
//! and point the deployment alias at it.

use crate::aws::api::{CreateFunctionError, CreateFunctionSpec, FunctionsApi, IamApi, PublishedVersion};
use crate::config::FunctionConfig;
use crate::pack;
use crate::wait::RetryPolicy;
use anyhow::{Context, Result};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Environment variable carrying the resolved route path to the function
pub const ROUTE_ENV_VAR: &str = "PATH_PREFIX";

/// The retry budget for role propagation ran out
#[derive(Debug, Error)]
#[error("execution role '{role}' was not assumable after {attempts} attempts")]
pub struct RoleNotReadyError {
    pub role: String,
    pub attempts: u32,
}

/// Result of first-time function creation
#[derive(Debug, Clone)]
pub struct FunctionStack {
    pub published: PublishedVersion,
    pub role_arn: String,
}

/// Create the execution role and the function itself.
///
/// Role propagation through the identity system is eventually consistent, so
/// creation is retried under `retry` while the control plane reports the role
/// as not yet assumable. The budget is bounded; exhaustion is an error, not
/// an endless wait.
pub async fn create_function_stack(
    iam: &impl IamApi,
    functions: &impl FunctionsApi,
    lambda: &FunctionConfig,
    package_dir: &Path,
    retry: &RetryPolicy,
) -> Result<FunctionStack> {
    let role_name = format!("{}-execution", lambda.name);
    let role_arn = iam.create_execution_role(&role_name).await?;

    let archive = pack::pack_directory(package_dir)?;
    let spec = CreateFunctionSpec {
        name: lambda.name.clone(),
        role_arn: role_arn.clone(),
        handler: lambda.handler(),
        runtime: lambda.runtime.clone(),
        archive,
    };

    info!(function = %lambda.name, role = %role_name, "Creating function");
    let max_attempts = retry.max_attempts.max(1);
    let mut delays = retry.delays();
    for attempt in 1..=max_attempts {
        match functions.create_function(&spec).await {
            Ok(published) => {
                return Ok(FunctionStack {
                    published,
                    role_arn,
                });
            }
            Err(CreateFunctionError::RoleNotReady) if attempt < max_attempts => {
                let delay = delays.next().unwrap_or(retry.max_delay);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis(),
                    "Execution role not yet assumable, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(CreateFunctionError::RoleNotReady) => {
                warn!(role = %role_name, attempts = max_attempts, "Role propagation budget exhausted");
                return Err(RoleNotReadyError {
                    role: role_name,
                    attempts: max_attempts,
                }
                .into());
            }
            Err(CreateFunctionError::Other(e)) => return Err(e),
        }
    }

    unreachable!("retry loop returns on every arm");
}

/// Deploy a new version for one deployment identity.
///
/// Always: set the route path on the function configuration, publish a
/// version from the packed artifact, and point the `alias` at it. The alias
/// is probed explicitly; update-vs-create follows the probe, never a failed
/// update.
pub async fn deploy_version(
    functions: &impl FunctionsApi,
    lambda: &FunctionConfig,
    package_dir: &Path,
    alias: &str,
    route_path: &str,
) -> Result<PublishedVersion> {
    functions
        .set_environment_variable(&lambda.name, ROUTE_ENV_VAR, route_path)
        .await?;

    let archive = pack::pack_directory(package_dir)?;
    let published = functions.publish_version(&lambda.name, &archive).await?;

    match functions
        .find_alias(&lambda.name, alias)
        .await
        .context("probing deployment alias")?
    {
        Some(existing) => {
            debug!(alias = %alias, from = %existing.function_version, to = %published.version, "Moving alias");
            functions
                .update_alias(&lambda.name, alias, &published.version)
                .await?;
        }
        None => {
            functions
                .create_alias(&lambda.name, alias, &published.version)
                .await?;
        }
    }

    Ok(published)
}
