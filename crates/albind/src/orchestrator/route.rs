//! Routing rule manager
//!
//! Allocates the next free priority slot on the balancer's listener and
//! installs a path-prefix rule forwarding to the bound target group.
//! Priority allocation is read-then-write with no coordination; concurrent
//! operators against the same listener can race (documented limitation).

use crate::aws::api::{LoadBalancingApi, Rule, RulePriority, TargetGroup};
use crate::lookup::require;
use anyhow::Result;
use tracing::{debug, info};

/// A rule freshly installed on the listener
#[derive(Debug, Clone)]
pub struct InstalledRoute {
    pub priority: u32,
    /// Operator-facing URL for the bound deployment
    pub url: String,
}

/// One greater than the highest numeric priority; the `default` slot never
/// participates.
pub fn next_priority(rules: &[Rule]) -> u32 {
    let current = rules
        .iter()
        .filter_map(|rule| match rule.priority {
            RulePriority::Numbered(n) => Some(n),
            RulePriority::Default => None,
        })
        .max()
        .unwrap_or(0);
    current + 1
}

/// Install a path-prefix rule (`route_path*`) forwarding to `target_group`.
pub async fn install_route(
    elb: &impl LoadBalancingApi,
    load_balancer_name: &str,
    route_path: &str,
    target_group: &TargetGroup,
) -> Result<InstalledRoute> {
    let lb = require(
        elb.find_load_balancer(load_balancer_name).await?,
        "load balancer",
        load_balancer_name,
    )?;

    let listeners = elb.listeners(&lb.arn).await?;
    let listener = require(listeners.into_iter().next(), "listener", load_balancer_name)?;

    let rules = elb.rules(&listener.arn).await?;
    let priority = next_priority(&rules);
    debug!(existing_rules = rules.len(), priority, "Allocated rule priority");

    elb.create_rule(
        &listener.arn,
        priority,
        &format!("{route_path}*"),
        &target_group.arn,
    )
    .await?;

    let url = format!(
        "{}://{}{}",
        listener.protocol.to_lowercase(),
        lb.dns_name,
        route_path
    );
    info!(priority, url = %url, "Route installed");

    Ok(InstalledRoute { priority, url })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(priority: RulePriority) -> Rule {
        Rule {
            arn: "arn:rule".to_string(),
            priority,
            path_patterns: vec![],
            forward_target_groups: vec![],
        }
    }

    #[test]
    fn first_rule_gets_priority_one() {
        assert_eq!(next_priority(&[]), 1);
        assert_eq!(next_priority(&[rule(RulePriority::Default)]), 1);
    }

    #[test]
    fn allocates_one_past_the_maximum() {
        let rules = [
            rule(RulePriority::Numbered(5)),
            rule(RulePriority::Numbered(12)),
            rule(RulePriority::Default),
        ];
        assert_eq!(next_priority(&rules), 13);
    }

    #[test]
    fn gaps_are_not_reused() {
        let rules = [
            rule(RulePriority::Numbered(2)),
            rule(RulePriority::Numbered(40)),
        ];
        assert_eq!(next_priority(&rules), 41);
    }
}
