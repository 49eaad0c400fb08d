//! Execution role management
//!
//! Creates the minimal execution role a freshly published function runs
//! under: the Lambda trust policy plus an inline policy that authorizes log
//! emission and nothing else.

use crate::aws::api::IamApi;
use crate::aws::context::AwsContext;
use anyhow::{Context, Result};
use aws_sdk_iam::Client;
use tracing::{debug, info};

/// Name of the inline log-emission policy attached to execution roles
const LOG_POLICY_NAME: &str = "CloudWatchAccess";

/// The trust policy allowing Lambda to assume the role
const LAMBDA_ASSUME_ROLE_POLICY: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [
        {
            "Effect": "Allow",
            "Principal": {
                "Service": "lambda.amazonaws.com"
            },
            "Action": "sts:AssumeRole"
        }
    ]
}"#;

/// Inline policy authorizing only log group/stream creation and log writes
fn log_emission_policy() -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Action": [
                    "logs:CreateLogGroup",
                    "logs:CreateLogStream",
                    "logs:PutLogEvents"
                ],
                "Resource": "*"
            }
        ]
    })
    .to_string()
}

/// IAM client for execution role creation
pub struct IamClient {
    client: Client,
}

impl IamClient {
    pub async fn new(region: &str) -> Self {
        let ctx = AwsContext::new(region).await;
        Self::from_context(&ctx)
    }

    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.iam_client(),
        }
    }
}

impl IamApi for IamClient {
    async fn create_execution_role(&self, role_name: &str) -> Result<String> {
        info!(role_name = %role_name, "Creating execution role");

        let created = self
            .client
            .create_role()
            .role_name(role_name)
            .assume_role_policy_document(LAMBDA_ASSUME_ROLE_POLICY)
            .send()
            .await
            .with_context(|| format!("creating execution role '{role_name}'"))?;

        let role_arn = created
            .role()
            .map(|r| r.arn().to_string())
            .context("role creation returned no role")?;

        debug!(role_arn = %role_arn, "Execution role created");

        self.client
            .put_role_policy()
            .role_name(role_name)
            .policy_name(LOG_POLICY_NAME)
            .policy_document(log_emission_policy())
            .send()
            .await
            .context("attaching log emission policy to role")?;

        debug!(role_name = %role_name, "Log emission policy attached");
        Ok(role_arn)
    }
}
