//! Test utilities for albind
//!
//! An in-memory control plane implementing the operation traits, plus project
//! directory fixtures. Used by albind's lifecycle tests; not shipped.

pub mod cloud;
pub mod project;

pub use cloud::{Counters, FakeCloud};
pub use project::FakeProject;
