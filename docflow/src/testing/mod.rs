//! Testing utilities for docflow pipelines.
//!
//! This module provides:
//! - Document fixtures and a run harness for executing single modules
//! - Mock modules and a placeholder template renderer
//! - In-memory source readers and sinks
//! - Assertions over document streams and run reports

mod assertions;
mod fixtures;
mod memory;
mod mocks;

pub use assertions::{assert_status, assert_titles, titles};
pub use fixtures::{doc, post, test_context, TestRun};
pub use memory::{MemorySink, MemorySource};
pub use mocks::{
    FailingModule, PlaceholderRenderer, RecordedExecution, RecordingModule, SlowModule,
    StaticModule,
};
