//! albind - bind versioned Lambda deployments to a shared Application Load
//! Balancer
//!
//! The library half of the CLI: the AWS client layer with its operation
//! traits, the orchestration flows, and the leaf pieces they share (binding
//! configuration, deployment identity, route templates, packaging).

pub mod aws;
pub mod config;
pub mod identity;
pub mod lookup;
pub mod orchestrator;
pub mod pack;
pub mod template;
pub mod wait;
