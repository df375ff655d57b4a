//! Pipeline phase and status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four ordered phases every pipeline runs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Materializes source documents.
    Input,
    /// Transforms the document stream.
    Process,
    /// Cross-cutting transforms such as layout wrapping.
    PostProcess,
    /// Hands the final stream to a sink.
    Output,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Self; 4] = [Self::Input, Self::Process, Self::PostProcess, Self::Output];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Process => write!(f, "process"),
            Self::PostProcess => write!(f, "post_process"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// The execution status of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Waiting for dependencies.
    #[default]
    Pending,
    /// Executing the given phase.
    Running(Phase),
    /// All phases completed and the output is published.
    Done,
    /// A module raised an unrecoverable error.
    Failed,
    /// Never started because a dependency did not complete.
    Skipped,
    /// Stopped at a module boundary by run cancellation.
    Cancelled,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running(phase) => write!(f, "running({phase})"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl PipelineStatus {
    /// Returns true if the status can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Skipped | Self::Cancelled)
    }

    /// Returns true if the pipeline completed and published its output.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if the pipeline started but did not complete.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }
}
