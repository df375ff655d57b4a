//! Pipeline definition, validation and execution.
//!
//! This module provides:
//! - Pipeline definitions with four module phases
//! - The engine builder that validates the dependency graph
//! - The scheduler that runs pipelines concurrently in dependency order
//! - Run reports

mod builder;
mod dag;
mod executor;
mod integration_tests;
mod report;
mod spec;

pub use builder::EngineBuilder;
pub use dag::Engine;
pub use report::{PipelineOutcome, RunReport};
pub use spec::Pipeline;
