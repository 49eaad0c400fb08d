//! Function control plane client
//!
//! Wraps the Lambda SDK client behind [`FunctionsApi`]. The policy and alias
//! reads are explicit probes: "not found" comes back as `Ok(None)` and never
//! masks a transport failure.

use crate::aws::api::{CreateFunctionError, CreateFunctionSpec, FunctionAlias, FunctionsApi, PublishedVersion};
use crate::aws::context::AwsContext;
use crate::aws::error::{classify_sdk_error, is_not_found};
use anyhow::{Context, Result};
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{Environment, FunctionCode, Runtime};
use aws_sdk_lambda::Client;
use tracing::{debug, info};

/// Lambda client for publishing, aliases, and invoke permissions
pub struct LambdaClient {
    client: Client,
}

impl LambdaClient {
    pub async fn new(region: &str) -> Self {
        let ctx = AwsContext::new(region).await;
        Self::from_context(&ctx)
    }

    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.lambda_client(),
        }
    }
}

/// Strip a trailing `:{version}` qualifier so callers can re-qualify by alias.
fn unqualified_arn(arn: &str, version: &str) -> String {
    match arn.strip_suffix(&format!(":{version}")) {
        Some(base) => base.to_string(),
        None => arn.to_string(),
    }
}

impl FunctionsApi for LambdaClient {
    async fn create_function(
        &self,
        spec: &CreateFunctionSpec,
    ) -> Result<PublishedVersion, CreateFunctionError> {
        let code = FunctionCode::builder()
            .zip_file(Blob::new(spec.archive.clone()))
            .build();

        match self
            .client
            .create_function()
            .function_name(&spec.name)
            .role(&spec.role_arn)
            .handler(&spec.handler)
            .runtime(Runtime::from(spec.runtime.as_str()))
            .code(code)
            .publish(true)
            .send()
            .await
        {
            Ok(out) => {
                let version = out.version().unwrap_or("1").to_string();
                let arn = out.function_arn().unwrap_or_default();
                info!(function = %spec.name, version = %version, "Function created");
                Ok(PublishedVersion {
                    function_arn: unqualified_arn(arn, &version),
                    version,
                })
            }
            Err(e) if classify_sdk_error(&e).is_role_not_ready() => {
                Err(CreateFunctionError::RoleNotReady)
            }
            Err(e) => Err(CreateFunctionError::Other(
                anyhow::Error::from(e).context(format!("creating function '{}'", spec.name)),
            )),
        }
    }

    async fn set_environment_variable(
        &self,
        function: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.client
            .update_function_configuration()
            .function_name(function)
            .environment(Environment::builder().variables(key, value).build())
            .send()
            .await
            .with_context(|| format!("setting {key} on function '{function}'"))?;

        debug!(function = %function, key = %key, value = %value, "Function environment updated");
        Ok(())
    }

    async fn publish_version(&self, function: &str, archive: &[u8]) -> Result<PublishedVersion> {
        let out = self
            .client
            .update_function_code()
            .function_name(function)
            .publish(true)
            .zip_file(Blob::new(archive.to_vec()))
            .send()
            .await
            .with_context(|| format!("publishing new version of function '{function}'"))?;

        let version = out.version().context("published version missing from response")?.to_string();
        let arn = out
            .function_arn()
            .context("function ARN missing from response")?;

        info!(function = %function, version = %version, "Function version published");
        Ok(PublishedVersion {
            function_arn: unqualified_arn(arn, &version),
            version,
        })
    }

    async fn find_alias(&self, function: &str, alias: &str) -> Result<Option<FunctionAlias>> {
        match self
            .client
            .get_alias()
            .function_name(function)
            .name(alias)
            .send()
            .await
        {
            Ok(out) => Ok(Some(FunctionAlias {
                name: alias.to_string(),
                function_version: out.function_version().unwrap_or_default().to_string(),
            })),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("resolving alias '{alias}'")),
        }
    }

    async fn create_alias(&self, function: &str, alias: &str, version: &str) -> Result<()> {
        self.client
            .create_alias()
            .function_name(function)
            .name(alias)
            .function_version(version)
            .send()
            .await
            .with_context(|| format!("creating alias '{alias}'"))?;

        info!(alias = %alias, version = %version, "Alias created");
        Ok(())
    }

    async fn update_alias(&self, function: &str, alias: &str, version: &str) -> Result<()> {
        self.client
            .update_alias()
            .function_name(function)
            .name(alias)
            .function_version(version)
            .send()
            .await
            .with_context(|| format!("updating alias '{alias}'"))?;

        info!(alias = %alias, version = %version, "Alias moved");
        Ok(())
    }

    async fn invoke_policy_sids(
        &self,
        function: &str,
        qualifier: &str,
    ) -> Result<Option<Vec<String>>> {
        let out = match self
            .client
            .get_policy()
            .function_name(function)
            .qualifier(qualifier)
            .send()
            .await
        {
            Ok(out) => out,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("reading invoke policy of '{function}:{qualifier}'"));
            }
        };

        let raw = out.policy().unwrap_or("{}");
        let policy: serde_json::Value =
            serde_json::from_str(raw).context("parsing invoke policy document")?;
        let sids = policy["Statement"]
            .as_array()
            .map(|statements| {
                statements
                    .iter()
                    .filter_map(|s| s["Sid"].as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(sids))
    }

    async fn add_invoke_permission(
        &self,
        function: &str,
        qualifier: &str,
        statement_id: &str,
        principal: &str,
        source_arn: &str,
    ) -> Result<()> {
        self.client
            .add_permission()
            .function_name(function)
            .qualifier(qualifier)
            .statement_id(statement_id)
            .action("lambda:InvokeFunction")
            .principal(principal)
            .source_arn(source_arn)
            .send()
            .await
            .with_context(|| format!("granting invoke permission '{statement_id}'"))?;

        info!(statement_id = %statement_id, "Invoke permission granted");
        Ok(())
    }

    async fn remove_invoke_permission(
        &self,
        function: &str,
        qualifier: &str,
        statement_id: &str,
    ) -> Result<()> {
        match self
            .client
            .remove_permission()
            .function_name(function)
            .qualifier(qualifier)
            .statement_id(statement_id)
            .send()
            .await
        {
            Ok(_) => {
                info!(statement_id = %statement_id, "Invoke permission removed");
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                debug!(statement_id = %statement_id, "Invoke permission already absent");
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("removing permission '{statement_id}'")),
        }
    }
}
