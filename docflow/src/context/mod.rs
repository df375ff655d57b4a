//! What modules can see of the run.
//!
//! This module provides:
//! - The write-once snapshot of finished pipeline outputs
//! - The read-only execution context handed to modules
//! - Link formatting

mod execution;
mod links;
mod snapshot;

pub(crate) use execution::RunShared;
pub use execution::{ExecutionContext, PipelineCatalog};
pub use links::format_link;
pub use snapshot::OutputSnapshot;
