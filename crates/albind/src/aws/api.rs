//! Control plane operation traits and the domain types they exchange
//!
//! Every remote call the orchestrator makes goes through one of these traits,
//! so components take explicit client handles and every operation has a test
//! double. The SDK-backed implementations live in the sibling modules; the
//! in-memory fake lives in `albind-test-utils`.

use anyhow::Result;
use std::future::Future;
use thiserror::Error;

/// A load balancer known to the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancer {
    pub name: String,
    pub arn: String,
    pub dns_name: String,
    /// Balancer kind as reported by the control plane, e.g. `application`
    pub kind: String,
}

/// A subnet, with the availability zone used for placement validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    pub id: String,
    pub vpc_id: String,
    pub availability_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub vpc_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vpc {
    pub id: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    pub arn: String,
    pub protocol: String,
    pub port: i32,
}

/// Listener rule priority; the reserved `default` slot is never allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulePriority {
    Default,
    Numbered(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub arn: String,
    pub priority: RulePriority,
    pub path_patterns: Vec<String>,
    /// Target group ARNs referenced by forward actions
    pub forward_target_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroup {
    pub name: String,
    pub arn: String,
}

/// One published, immutable function version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVersion {
    pub version: String,
    /// Unqualified function ARN (no version or alias suffix)
    pub function_arn: String,
}

impl PublishedVersion {
    /// ARN of this function qualified by an alias name.
    pub fn alias_arn(&self, alias: &str) -> String {
        format!("{}:{}", self.function_arn, alias)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionAlias {
    pub name: String,
    pub function_version: String,
}

/// Inputs for creating a balancer on the provisioning path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateLoadBalancerSpec {
    pub name: String,
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
}

/// Inputs for first-time function creation
#[derive(Debug, Clone)]
pub struct CreateFunctionSpec {
    pub name: String,
    pub role_arn: String,
    pub handler: String,
    pub runtime: String,
    pub archive: Vec<u8>,
}

/// Function creation failure, split so the role-propagation case is retryable
#[derive(Debug, Error)]
pub enum CreateFunctionError {
    /// The execution role has not propagated yet; safe to retry
    #[error("execution role is not yet assumable by the function service")]
    RoleNotReady,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Load balancer, listener, rule, and target group operations
pub trait LoadBalancingApi: Send + Sync {
    fn list_load_balancers(&self) -> impl Future<Output = Result<Vec<LoadBalancer>>> + Send;

    /// Resolve a balancer by name; `Ok(None)` means genuinely absent, `Err`
    /// is a transport failure.
    fn find_load_balancer(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<LoadBalancer>>> + Send;

    fn create_load_balancer(
        &self,
        spec: &CreateLoadBalancerSpec,
    ) -> impl Future<Output = Result<LoadBalancer>> + Send;

    /// Create the HTTP:80 listener whose default action is a fixed 404.
    fn create_default_listener(&self, lb_arn: &str)
    -> impl Future<Output = Result<Listener>> + Send;

    fn listeners(&self, lb_arn: &str) -> impl Future<Output = Result<Vec<Listener>>> + Send;

    fn rules(&self, listener_arn: &str) -> impl Future<Output = Result<Vec<Rule>>> + Send;

    fn create_rule(
        &self,
        listener_arn: &str,
        priority: u32,
        path_pattern: &str,
        target_group_arn: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete_rule(&self, rule_arn: &str) -> impl Future<Output = Result<()>> + Send;

    fn create_lambda_target_group(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<TargetGroup>> + Send;

    fn find_target_group(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<TargetGroup>>> + Send;

    /// Delete a target group; absent groups are not an error.
    fn delete_target_group(&self, arn: &str) -> impl Future<Output = Result<()>> + Send;

    fn register_function_target(
        &self,
        target_group_arn: &str,
        function_arn: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Function publishing, alias, and invoke-permission operations
pub trait FunctionsApi: Send + Sync {
    fn create_function(
        &self,
        spec: &CreateFunctionSpec,
    ) -> impl Future<Output = Result<PublishedVersion, CreateFunctionError>> + Send;

    fn set_environment_variable(
        &self,
        function: &str,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Upload new code and publish an immutable version from it.
    fn publish_version(
        &self,
        function: &str,
        archive: &[u8],
    ) -> impl Future<Output = Result<PublishedVersion>> + Send;

    fn find_alias(
        &self,
        function: &str,
        alias: &str,
    ) -> impl Future<Output = Result<Option<FunctionAlias>>> + Send;

    fn create_alias(
        &self,
        function: &str,
        alias: &str,
        version: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn update_alias(
        &self,
        function: &str,
        alias: &str,
        version: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Statement ids of the invoke policy for `function` qualified by
    /// `qualifier`. `Ok(None)` means the policy does not exist; `Err` is a
    /// transport or access failure and must abort the caller.
    fn invoke_policy_sids(
        &self,
        function: &str,
        qualifier: &str,
    ) -> impl Future<Output = Result<Option<Vec<String>>>> + Send;

    fn add_invoke_permission(
        &self,
        function: &str,
        qualifier: &str,
        statement_id: &str,
        principal: &str,
        source_arn: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove an invoke-permission statement; an absent statement is not an
    /// error.
    fn remove_invoke_permission(
        &self,
        function: &str,
        qualifier: &str,
        statement_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Subnet, security group, and VPC queries backing the inventory
pub trait NetworkApi: Send + Sync {
    fn subnets(&self) -> impl Future<Output = Result<Vec<Subnet>>> + Send;
    fn security_groups(&self) -> impl Future<Output = Result<Vec<SecurityGroup>>> + Send;
    fn vpcs(&self) -> impl Future<Output = Result<Vec<Vpc>>> + Send;
}

/// Identity system operations
pub trait IamApi: Send + Sync {
    /// Create an execution role with the function trust policy and a minimal
    /// inline policy authorizing log emission only. Returns the role ARN.
    fn create_execution_role(&self, role_name: &str)
    -> impl Future<Output = Result<String>> + Send;
}
