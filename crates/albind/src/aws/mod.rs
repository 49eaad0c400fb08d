//! AWS client layer
//!
//! Operation traits plus their SDK-backed implementations:
//! - ELBv2: balancers, listeners, rules, target groups
//! - Lambda: publishing, aliases, invoke permissions
//! - EC2: network inventory queries
//! - IAM: execution role creation

pub mod api;
pub mod context;
pub mod ec2;
pub mod elb;
pub mod error;
pub mod iam;
pub mod inventory;
pub mod lambda;

pub use api::{
    CreateFunctionError, CreateFunctionSpec, CreateLoadBalancerSpec, FunctionAlias, FunctionsApi,
    IamApi, Listener, LoadBalancer, LoadBalancingApi, NetworkApi, PublishedVersion, Rule,
    RulePriority, SecurityGroup, Subnet, TargetGroup, Vpc,
};
pub use context::AwsContext;
pub use ec2::Ec2Client;
pub use elb::ElbClient;
pub use error::{classify_aws_error, classify_sdk_error, AwsError};
pub use iam::IamClient;
pub use inventory::{InventoryFetchError, RegionInventory};
pub use lambda::LambdaClient;
