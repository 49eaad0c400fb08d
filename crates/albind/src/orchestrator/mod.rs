//! Orchestration of the bind/unbind lifecycle
//!
//! - `init`: inventory, provisioning decision, optional first publish
//! - `deploy`: publish, bind, route
//! - `teardown`: reverse it all in dependency order

pub mod bind;
pub mod deploy;
pub mod init;
pub mod publish;
pub mod route;
pub mod teardown;

pub use bind::{ensure_binding, BindingOutcome};
pub use deploy::{deploy, DeployOutcome};
pub use init::{initialize, InitAnswers, LoadBalancerPlan, ValidationError};
pub use publish::{create_function_stack, deploy_version, RoleNotReadyError, ROUTE_ENV_VAR};
pub use route::{install_route, next_priority, InstalledRoute};
pub use teardown::{deregister, unregister};
