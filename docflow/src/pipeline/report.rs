//! Run results.

use crate::context::OutputSnapshot;
use crate::core::{Document, PipelineStatus};
use crate::errors::{DocflowError, ErrorKind, WriteFailure};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use uuid::Uuid;

/// What happened to one pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    /// The pipeline name.
    pub name: String,
    /// The terminal status.
    pub status: PipelineStatus,
    /// The error message, for failed, cancelled and skipped pipelines.
    pub error: Option<String>,
    /// The error category, when a module raised the error.
    pub error_kind: Option<ErrorKind>,
    /// Number of documents in the final stream.
    pub documents: usize,
    /// Wall time in milliseconds; zero for pipelines that never ran.
    pub duration_ms: f64,
    /// Non-fatal write failures recorded by output modules.
    #[serde(skip)]
    pub write_failures: Vec<WriteFailure>,
}

impl PipelineOutcome {
    pub(crate) fn done(name: &str, documents: usize, duration_ms: f64) -> Self {
        Self {
            name: name.to_string(),
            status: PipelineStatus::Done,
            error: None,
            error_kind: None,
            documents,
            duration_ms,
            write_failures: Vec::new(),
        }
    }

    pub(crate) fn errored(name: &str, error: &DocflowError, duration_ms: f64) -> Self {
        let status = match error {
            DocflowError::Cancelled(_) => PipelineStatus::Cancelled,
            _ => PipelineStatus::Failed,
        };
        Self {
            name: name.to_string(),
            status,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            documents: 0,
            duration_ms,
            write_failures: Vec::new(),
        }
    }

    pub(crate) fn skipped(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: PipelineStatus::Skipped,
            error: Some(reason.into()),
            error_kind: None,
            documents: 0,
            duration_ms: 0.0,
            write_failures: Vec::new(),
        }
    }
}

/// The result of [`Engine::run`](super::Engine::run).
#[derive(Debug, Clone)]
pub struct RunReport {
    run_id: Uuid,
    outcomes: Vec<PipelineOutcome>,
    duration_ms: f64,
    snapshot: Arc<OutputSnapshot>,
}

impl RunReport {
    pub(crate) fn new(
        run_id: Uuid,
        outcomes: Vec<PipelineOutcome>,
        duration_ms: f64,
        snapshot: Arc<OutputSnapshot>,
    ) -> Self {
        Self {
            run_id,
            outcomes,
            duration_ms,
            snapshot,
        }
    }

    /// Returns the run id stamped on every event of the run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns one outcome per pipeline, in schedule order.
    #[must_use]
    pub fn outcomes(&self) -> &[PipelineOutcome] {
        &self.outcomes
    }

    /// Returns the outcome of a pipeline.
    #[must_use]
    pub fn outcome(&self, pipeline: &str) -> Option<&PipelineOutcome> {
        self.outcomes.iter().find(|o| o.name == pipeline)
    }

    /// Returns the terminal status of a pipeline.
    #[must_use]
    pub fn status(&self, pipeline: &str) -> Option<PipelineStatus> {
        self.outcome(pipeline).map(|o| o.status)
    }

    /// Returns the published output of a pipeline.
    #[must_use]
    pub fn outputs(&self, pipeline: &str) -> Option<Arc<Vec<Document>>> {
        self.snapshot.get(pipeline)
    }

    /// Returns the final snapshot of published outputs.
    #[must_use]
    pub fn snapshot(&self) -> &Arc<OutputSnapshot> {
        &self.snapshot
    }

    /// Total wall time in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    /// True when every pipeline reached `Done`.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.status.is_success())
    }

    /// Process exit code: 0 on success, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.succeeded())
    }

    /// Counts outcomes with the given status.
    #[must_use]
    pub fn count(&self, status: PipelineStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// A human-readable multi-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} pipelines in {:.1}ms: {} done, {} failed, {} skipped, {} cancelled",
            self.outcomes.len(),
            self.duration_ms,
            self.count(PipelineStatus::Done),
            self.count(PipelineStatus::Failed),
            self.count(PipelineStatus::Skipped),
            self.count(PipelineStatus::Cancelled),
        );
        for outcome in &self.outcomes {
            let _ = write!(
                out,
                "\n  {:<20} {:<10} {:>5} docs {:>8.1}ms",
                outcome.name, outcome.status, outcome.documents, outcome.duration_ms
            );
            if let Some(error) = &outcome.error {
                let _ = write!(out, "  {error}");
            }
            if !outcome.write_failures.is_empty() {
                let _ = write!(out, "  ({} write failures)", outcome.write_failures.len());
            }
        }
        out
    }
}
