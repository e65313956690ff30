//! Build and publish orchestration for docship.
//!
//! [`DocsPipeline`] runs a strictly linear sequence of steps against an
//! injected [`ExecutionBackend`](docship_core::environment::ExecutionBackend):
//! build the site in one environment, then optionally load it into a second
//! environment and publish it.

pub mod pipeline;
pub mod plan;

pub use pipeline::{BuiltSite, DocsPipeline};
pub use plan::{BuildPlan, PlannedStep, PublishPlan};
