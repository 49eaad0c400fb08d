//! Load balancer control plane client
//!
//! Wraps the ELBv2 SDK client behind [`LoadBalancingApi`]. Existence probes
//! translate the service's not-found codes into `Ok(None)`; every other
//! failure propagates with context.

use crate::aws::api::{
    CreateLoadBalancerSpec, Listener, LoadBalancer, LoadBalancingApi, Rule, RulePriority,
    TargetGroup,
};
use crate::aws::context::AwsContext;
use crate::aws::error::is_not_found;
use anyhow::{Context, Result};
use aws_sdk_elasticloadbalancingv2::types::{
    Action, ActionTypeEnum, FixedResponseActionConfig, IpAddressType, LoadBalancerSchemeEnum,
    LoadBalancerTypeEnum, ProtocolEnum, RuleCondition, TargetDescription, TargetTypeEnum,
};
use aws_sdk_elasticloadbalancingv2::Client;
use tracing::{debug, info};

/// ELBv2 client for balancers, listeners, rules, and target groups
pub struct ElbClient {
    client: Client,
}

impl ElbClient {
    pub async fn new(region: &str) -> Self {
        let ctx = AwsContext::new(region).await;
        Self::from_context(&ctx)
    }

    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.elb_client(),
        }
    }
}

fn convert_load_balancer(lb: &aws_sdk_elasticloadbalancingv2::types::LoadBalancer) -> LoadBalancer {
    LoadBalancer {
        name: lb.load_balancer_name().unwrap_or_default().to_string(),
        arn: lb.load_balancer_arn().unwrap_or_default().to_string(),
        dns_name: lb.dns_name().unwrap_or_default().to_string(),
        kind: lb
            .r#type()
            .map(|t| t.as_str().to_string())
            .unwrap_or_default(),
    }
}

fn convert_listener(listener: &aws_sdk_elasticloadbalancingv2::types::Listener) -> Listener {
    Listener {
        arn: listener.listener_arn().unwrap_or_default().to_string(),
        protocol: listener
            .protocol()
            .map(|p| p.as_str().to_string())
            .unwrap_or_default(),
        port: listener.port().unwrap_or_default(),
    }
}

fn convert_rule(rule: &aws_sdk_elasticloadbalancingv2::types::Rule) -> Rule {
    let priority = match rule.priority() {
        Some("default") => RulePriority::Default,
        Some(raw) => raw
            .parse::<u32>()
            .map(RulePriority::Numbered)
            .unwrap_or(RulePriority::Default),
        None => RulePriority::Default,
    };

    let path_patterns = rule
        .conditions()
        .iter()
        .filter(|c| c.field() == Some("path-pattern"))
        .flat_map(|c| c.values().iter().cloned())
        .collect();

    let forward_target_groups = rule
        .actions()
        .iter()
        .filter_map(|a| a.target_group_arn())
        .map(str::to_string)
        .collect();

    Rule {
        arn: rule.rule_arn().unwrap_or_default().to_string(),
        priority,
        path_patterns,
        forward_target_groups,
    }
}

fn convert_target_group(tg: &aws_sdk_elasticloadbalancingv2::types::TargetGroup) -> TargetGroup {
    TargetGroup {
        name: tg.target_group_name().unwrap_or_default().to_string(),
        arn: tg.target_group_arn().unwrap_or_default().to_string(),
    }
}

impl LoadBalancingApi for ElbClient {
    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>> {
        let response = self
            .client
            .describe_load_balancers()
            .page_size(100)
            .send()
            .await
            .context("describing load balancers")?;

        Ok(response
            .load_balancers()
            .iter()
            .map(convert_load_balancer)
            .collect())
    }

    async fn find_load_balancer(&self, name: &str) -> Result<Option<LoadBalancer>> {
        match self
            .client
            .describe_load_balancers()
            .names(name)
            .send()
            .await
        {
            Ok(response) => Ok(response.load_balancers().first().map(convert_load_balancer)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("resolving load balancer '{name}'")),
        }
    }

    async fn create_load_balancer(&self, spec: &CreateLoadBalancerSpec) -> Result<LoadBalancer> {
        info!(name = %spec.name, "Creating load balancer");

        let response = self
            .client
            .create_load_balancer()
            .name(&spec.name)
            .set_subnets(Some(spec.subnet_ids.clone()))
            .set_security_groups(Some(spec.security_group_ids.clone()))
            .r#type(LoadBalancerTypeEnum::Application)
            .scheme(LoadBalancerSchemeEnum::InternetFacing)
            .ip_address_type(IpAddressType::Ipv4)
            .send()
            .await
            .with_context(|| format!("creating load balancer '{}'", spec.name))?;

        let created = response
            .load_balancers()
            .first()
            .map(convert_load_balancer)
            .context("load balancer creation returned no balancer")?;

        debug!(arn = %created.arn, "Load balancer created");
        Ok(created)
    }

    async fn create_default_listener(&self, lb_arn: &str) -> Result<Listener> {
        let not_found = Action::builder()
            .r#type(ActionTypeEnum::FixedResponse)
            .fixed_response_config(
                FixedResponseActionConfig::builder()
                    .status_code("404")
                    .build()
                    .context("building fixed-response config")?,
            )
            .build()
            .context("building listener default action")?;

        let response = self
            .client
            .create_listener()
            .load_balancer_arn(lb_arn)
            .protocol(ProtocolEnum::Http)
            .port(80)
            .default_actions(not_found)
            .send()
            .await
            .context("creating listener")?;

        let listener = response
            .listeners()
            .first()
            .map(convert_listener)
            .context("listener creation returned no listener")?;

        debug!(arn = %listener.arn, "Listener created");
        Ok(listener)
    }

    async fn listeners(&self, lb_arn: &str) -> Result<Vec<Listener>> {
        let response = self
            .client
            .describe_listeners()
            .load_balancer_arn(lb_arn)
            .send()
            .await
            .context("describing listeners")?;

        Ok(response.listeners().iter().map(convert_listener).collect())
    }

    async fn rules(&self, listener_arn: &str) -> Result<Vec<Rule>> {
        let response = self
            .client
            .describe_rules()
            .listener_arn(listener_arn)
            .send()
            .await
            .context("describing listener rules")?;

        Ok(response.rules().iter().map(convert_rule).collect())
    }

    async fn create_rule(
        &self,
        listener_arn: &str,
        priority: u32,
        path_pattern: &str,
        target_group_arn: &str,
    ) -> Result<()> {
        let condition = RuleCondition::builder()
            .field("path-pattern")
            .values(path_pattern)
            .build();
        let forward = Action::builder()
            .r#type(ActionTypeEnum::Forward)
            .target_group_arn(target_group_arn)
            .build()
            .context("building forward action")?;

        self.client
            .create_rule()
            .listener_arn(listener_arn)
            .priority(priority as i32)
            .conditions(condition)
            .actions(forward)
            .send()
            .await
            .with_context(|| format!("creating rule at priority {priority}"))?;

        info!(priority, pattern = %path_pattern, "Routing rule created");
        Ok(())
    }

    async fn delete_rule(&self, rule_arn: &str) -> Result<()> {
        self.client
            .delete_rule()
            .rule_arn(rule_arn)
            .send()
            .await
            .context("deleting rule")?;

        debug!(arn = %rule_arn, "Rule deleted");
        Ok(())
    }

    async fn create_lambda_target_group(&self, name: &str) -> Result<TargetGroup> {
        let response = self
            .client
            .create_target_group()
            .name(name)
            .target_type(TargetTypeEnum::Lambda)
            .send()
            .await
            .with_context(|| format!("creating target group '{name}'"))?;

        let created = response
            .target_groups()
            .first()
            .map(convert_target_group)
            .context("target group creation returned no group")?;

        info!(name = %name, arn = %created.arn, "Target group created");
        Ok(created)
    }

    async fn find_target_group(&self, name: &str) -> Result<Option<TargetGroup>> {
        match self
            .client
            .describe_target_groups()
            .names(name)
            .send()
            .await
        {
            Ok(response) => Ok(response.target_groups().first().map(convert_target_group)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("resolving target group '{name}'")),
        }
    }

    async fn delete_target_group(&self, arn: &str) -> Result<()> {
        match self
            .client
            .delete_target_group()
            .target_group_arn(arn)
            .send()
            .await
        {
            Ok(_) => {
                debug!(arn = %arn, "Target group deleted");
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                debug!(arn = %arn, "Target group already absent");
                Ok(())
            }
            Err(e) => Err(e).context("deleting target group"),
        }
    }

    async fn register_function_target(
        &self,
        target_group_arn: &str,
        function_arn: &str,
    ) -> Result<()> {
        let target = TargetDescription::builder()
            .id(function_arn)
            .build()
            .context("building target description")?;

        self.client
            .register_targets()
            .target_group_arn(target_group_arn)
            .targets(target)
            .send()
            .await
            .context("registering function target")?;

        debug!(target = %function_arn, "Target registered");
        Ok(())
    }
}
