//! End-to-end lifecycle tests against the in-memory control plane:
//! initialize, deploy, redeploy, and deregister one deployment identity.

use albind::aws::api::{LoadBalancingApi, RulePriority};
use albind::orchestrator::{self, InitAnswers};
use albind::wait::RetryPolicy;
use albind_test_utils::{FakeCloud, FakeProject};

const SAFE_NAME: &str = "1-0-0-dev-orders";
const STATEMENT_ID: &str = "AlbBind_1_0_0_dev_orders";

fn answers() -> InitAnswers {
    InitAnswers {
        load_balancer: "edge".to_string(),
        subnet_ids: vec!["subnet-a".to_string(), "subnet-b".to_string()],
        security_group_ids: vec!["sg-1".to_string()],
        service_name: "orders".to_string(),
        path_template: "/{service}/{stage}/{version}".to_string(),
        function_name: "orders".to_string(),
        package_dir: "dist".to_string(),
        entry_module: "index.js".to_string(),
        deploy_now: true,
    }
}

fn seeded_cloud() -> FakeCloud {
    let cloud = FakeCloud::new("us-east-1");
    cloud.seed_vpc("vpc-default", true);
    cloud.seed_subnet("subnet-a", "vpc-default", "us-east-1a");
    cloud.seed_subnet("subnet-b", "vpc-default", "us-east-1b");
    cloud.seed_security_group("sg-1", "default", "vpc-default");
    cloud
}

async fn initialize(cloud: &FakeCloud, project: &FakeProject) {
    orchestrator::initialize(
        project.path(),
        "us-east-1",
        &answers(),
        cloud,
        cloud,
        cloud,
        cloud,
        &RetryPolicy::immediate(3),
    )
    .await
    .expect("init should succeed");
}

async fn deploy(cloud: &FakeCloud, project: &FakeProject) -> orchestrator::DeployOutcome {
    orchestrator::deploy(project.path(), "dev", "1.0.0", cloud, cloud)
        .await
        .expect("deploy should succeed")
}

#[tokio::test]
async fn scenario_a_fresh_environment_full_bind() {
    let cloud = seeded_cloud();
    let project = FakeProject::new();

    initialize(&cloud, &project).await;

    // Balancer, listener, role, and function all created exactly once
    let lb = cloud.load_balancer("edge").expect("balancer created");
    assert_eq!(cloud.listener_count("edge"), 1);
    assert_eq!(cloud.roles(), vec!["orders-execution".to_string()]);
    let counters = cloud.counters();
    assert_eq!(counters.load_balancers_created, 1);
    assert_eq!(counters.listeners_created, 1);
    assert_eq!(counters.functions_created, 1);

    let outcome = deploy(&cloud, &project).await;

    // Route path equals the rendered template and the rule got priority 1
    assert_eq!(outcome.route_path, "/orders/dev/1.0.0");
    let route = outcome.route.expect("fresh binding installs a route");
    assert_eq!(route.priority, 1);
    assert_eq!(route.url, format!("http://{}/orders/dev/1.0.0", lb.dns_name));

    // Target group, permission, and rule all exist under the identity
    let tg = cloud.target_group(SAFE_NAME).expect("target group created");
    assert_eq!(
        cloud.permission_sids("orders", SAFE_NAME),
        vec![STATEMENT_ID.to_string()]
    );

    let rules = cloud.rules_for("edge");
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].priority, RulePriority::Numbered(1));
    assert_eq!(rules[0].path_patterns, vec!["/orders/dev/1.0.0*".to_string()]);
    assert_eq!(rules[0].forward_target_groups, vec![tg.arn.clone()]);

    // The alias-qualified function is the sole registered target
    let targets = cloud.registered_targets(SAFE_NAME);
    assert_eq!(targets.len(), 1);
    assert!(targets[0].ends_with(&format!(":function:orders:{SAFE_NAME}")));

    // Function carries the resolved route path and the alias tracks the
    // published version (init published 1, deploy published 2)
    assert_eq!(
        cloud.function_env("orders", "PATH_PREFIX").as_deref(),
        Some("/orders/dev/1.0.0")
    );
    assert_eq!(cloud.alias_version("orders", SAFE_NAME).as_deref(), Some("2"));
}

#[tokio::test]
async fn scenario_b_redeploy_only_moves_the_alias() {
    let cloud = seeded_cloud();
    let project = FakeProject::new();
    initialize(&cloud, &project).await;
    deploy(&cloud, &project).await;

    let before = cloud.counters();
    project.touch_handler("exports.handler = async () => ({ statusCode: 204 });\n");
    let outcome = deploy(&cloud, &project).await;

    // Second run is the idempotent short-circuit: no new rule, target group,
    // permission, or registration
    assert!(outcome.route.is_none());
    let after = cloud.counters();
    assert_eq!(after.target_groups_created, before.target_groups_created);
    assert_eq!(after.permissions_granted, before.permissions_granted);
    assert_eq!(after.rules_created, before.rules_created);
    assert_eq!(after.targets_registered, before.targets_registered);
    assert_eq!(after.aliases_created, before.aliases_created);

    // Only the alias pointer advanced
    assert_eq!(after.versions_published, before.versions_published + 1);
    assert_eq!(after.aliases_updated, before.aliases_updated + 1);
    assert_eq!(cloud.alias_version("orders", SAFE_NAME).as_deref(), Some("3"));
    assert_eq!(cloud.rules_for("edge").len(), 1);
}

#[tokio::test]
async fn scenario_c_deregister_removes_binding_but_keeps_balancer() {
    let cloud = seeded_cloud();
    let project = FakeProject::new();
    initialize(&cloud, &project).await;
    deploy(&cloud, &project).await;

    orchestrator::deregister(project.path(), "dev", "1.0.0", &cloud, &cloud)
        .await
        .expect("deregister should succeed");

    assert!(cloud.rules_for("edge").is_empty());
    assert!(cloud.target_group(SAFE_NAME).is_none());
    assert!(cloud.permission_sids("orders", SAFE_NAME).is_empty());

    // The shared balancer and its listener survive
    assert!(cloud.load_balancer("edge").is_some());
    assert_eq!(cloud.listener_count("edge"), 1);
}

#[tokio::test]
async fn distinct_stages_get_distinct_priorities() {
    let cloud = seeded_cloud();
    let project = FakeProject::new();
    initialize(&cloud, &project).await;

    deploy(&cloud, &project).await;
    let staging = orchestrator::deploy(project.path(), "staging", "1.0.0", &cloud, &cloud)
        .await
        .expect("second stage deploys");

    assert_eq!(staging.route.expect("fresh binding").priority, 2);
    assert_eq!(cloud.rules_for("edge").len(), 2);
    assert!(cloud.target_group("1-0-0-staging-orders").is_some());
}

#[tokio::test]
async fn policy_read_failure_aborts_before_any_mutation() {
    let cloud = seeded_cloud();
    let project = FakeProject::new();
    initialize(&cloud, &project).await;

    cloud.fail_policy_reads();
    let err = orchestrator::deploy(project.path(), "dev", "1.0.0", &cloud, &cloud)
        .await
        .expect_err("transport failure must abort");
    assert!(err.to_string().contains("checking current invoke permissions"));

    // Nothing was created on the aborted path
    let counters = cloud.counters();
    assert_eq!(counters.target_groups_created, 0);
    assert_eq!(counters.permissions_granted, 0);
    assert_eq!(counters.rules_created, 0);
}

#[tokio::test]
async fn stale_target_group_fails_loudly() {
    let cloud = seeded_cloud();
    let project = FakeProject::new();
    initialize(&cloud, &project).await;

    // Leftover from an interrupted earlier run: target group without permission
    cloud
        .create_lambda_target_group(SAFE_NAME)
        .await
        .expect("seeding stale group");

    let err = orchestrator::deploy(project.path(), "dev", "1.0.0", &cloud, &cloud)
        .await
        .expect_err("stale state must fail loudly");
    assert!(err.to_string().contains("without a matching invoke permission"));
}

#[tokio::test]
async fn teardown_without_a_rule_still_cleans_up() {
    let cloud = seeded_cloud();
    let project = FakeProject::new();
    initialize(&cloud, &project).await;
    deploy(&cloud, &project).await;

    // Simulate a partial prior teardown: the rule is already gone
    let rule_arn = cloud.rules_for("edge")[0].arn.clone();
    cloud.delete_rule(&rule_arn).await.unwrap();

    orchestrator::deregister(project.path(), "dev", "1.0.0", &cloud, &cloud)
        .await
        .expect("teardown degrades gracefully");

    assert!(cloud.target_group(SAFE_NAME).is_none());
    assert!(cloud.permission_sids("orders", SAFE_NAME).is_empty());
}

#[tokio::test]
async fn teardown_refuses_ambiguous_rule_matches() {
    let cloud = seeded_cloud();
    let project = FakeProject::new();
    initialize(&cloud, &project).await;
    deploy(&cloud, &project).await;

    // A second rule forwarding to the same target group makes the scan ambiguous
    let lb = cloud.load_balancer("edge").unwrap();
    let listener = cloud.listeners(&lb.arn).await.unwrap().remove(0);
    let tg = cloud.target_group(SAFE_NAME).unwrap();
    cloud
        .create_rule(&listener.arn, 99, "/other*", &tg.arn)
        .await
        .unwrap();

    let err = orchestrator::deregister(project.path(), "dev", "1.0.0", &cloud, &cloud)
        .await
        .expect_err("ambiguity must abort");
    assert!(err.to_string().contains("expected exactly one"));

    // Neither rule was deleted
    assert_eq!(cloud.rules_for("edge").len(), 2);
}
