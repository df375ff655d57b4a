//! Lifecycle events emitted while a run executes.
//!
//! Sinks are handed to the engine explicitly; there is no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Event type names.
pub mod types {
    /// A run began.
    pub const RUN_STARTED: &str = "run.started";
    /// A run finished (successfully or not).
    pub const RUN_COMPLETED: &str = "run.completed";
    /// A pipeline left `Pending`.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// A pipeline entered a phase.
    pub const PHASE_STARTED: &str = "phase.started";
    /// A pipeline reached `Done`.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// A pipeline reached `Failed`.
    pub const PIPELINE_FAILED: &str = "pipeline.failed";
    /// A running pipeline was stopped by the run's cancellation token.
    pub const PIPELINE_CANCELLED: &str = "pipeline.cancelled";
    /// A pipeline never ran.
    pub const PIPELINE_SKIPPED: &str = "pipeline.skipped";
}

/// Stamps every event with the run id before forwarding it to a sink.
#[derive(Clone)]
pub struct RunEmitter {
    sink: Arc<dyn EventSink>,
    run_id: Uuid,
}

impl RunEmitter {
    /// Creates an emitter for one run.
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>, run_id: Uuid) -> Self {
        Self { sink, run_id }
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Emits an event. Object payloads gain a `run_id` field; anything else
    /// is wrapped under `data`.
    pub fn emit(&self, event_type: &str, data: Value) {
        let payload = match data {
            Value::Object(mut map) => {
                map.insert("run_id".to_string(), json!(self.run_id.to_string()));
                Value::Object(map)
            }
            Value::Null => json!({ "run_id": self.run_id.to_string() }),
            other => json!({ "run_id": self.run_id.to_string(), "data": other }),
        };
        self.sink.try_emit(event_type, Some(payload));
    }
}

impl std::fmt::Debug for RunEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunEmitter")
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}
