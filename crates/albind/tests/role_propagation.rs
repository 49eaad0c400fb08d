//! Bounded retry behavior for function creation while the execution role
//! propagates through the identity system.

use albind::config::{FunctionConfig, DEFAULT_RUNTIME};
use albind::orchestrator::{create_function_stack, RoleNotReadyError};
use albind::wait::RetryPolicy;
use albind_test_utils::{FakeCloud, FakeProject};

fn function_config() -> FunctionConfig {
    FunctionConfig {
        role: String::new(),
        name: "orders".to_string(),
        module: "index".to_string(),
        dir: "dist".to_string(),
        runtime: DEFAULT_RUNTIME.to_string(),
    }
}

#[tokio::test]
async fn retries_until_the_role_propagates() {
    let cloud = FakeCloud::new("us-east-1");
    let project = FakeProject::new();
    cloud.role_not_ready_for(2);

    let stack = create_function_stack(
        &cloud,
        &cloud,
        &function_config(),
        &project.path().join("dist"),
        &RetryPolicy::immediate(5),
    )
    .await
    .expect("third attempt should succeed");

    assert_eq!(stack.published.version, "1");
    assert!(stack.role_arn.ends_with("role/orders-execution"));
    assert_eq!(cloud.counters().functions_created, 1);
}

#[tokio::test]
async fn budget_exhaustion_is_a_hard_error() {
    let cloud = FakeCloud::new("us-east-1");
    let project = FakeProject::new();
    cloud.role_not_ready_for(10);

    let err = create_function_stack(
        &cloud,
        &cloud,
        &function_config(),
        &project.path().join("dist"),
        &RetryPolicy::immediate(3),
    )
    .await
    .expect_err("budget of 3 cannot outlast 10 failures");

    let not_ready = err
        .downcast_ref::<RoleNotReadyError>()
        .expect("typed RoleNotReadyError");
    assert_eq!(not_ready.attempts, 3);
    assert_eq!(not_ready.role, "orders-execution");
    assert_eq!(cloud.counters().functions_created, 0);
}

#[tokio::test]
async fn non_propagation_failures_are_not_retried() {
    let cloud = FakeCloud::new("us-east-1");
    let project = FakeProject::new();

    // First creation succeeds, second one hits "already exists" and must not
    // burn the retry budget
    create_function_stack(
        &cloud,
        &cloud,
        &function_config(),
        &project.path().join("dist"),
        &RetryPolicy::immediate(5),
    )
    .await
    .unwrap();

    let mut second = function_config();
    second.name = "orders".to_string();
    let err = create_function_stack(
        &cloud,
        &cloud,
        &second,
        &project.path().join("dist"),
        &RetryPolicy::immediate(5),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("already exists"));
}
