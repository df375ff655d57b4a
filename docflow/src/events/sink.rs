//! Event sinks.

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info, trace, warn, Level};

/// Receives lifecycle events.
///
/// `try_emit` is called from pipeline tasks and must never block or panic.
pub trait EventSink: Send + Sync {
    /// Emits an event without blocking.
    fn try_emit(&self, event_type: &str, data: Option<Value>);
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Forwards events to `tracing` at a fixed level.
#[derive(Debug, Clone, Copy)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl LoggingEventSink {
    /// Creates a sink logging at `level`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        let data = data.unwrap_or(Value::Null);
        match self.level {
            Level::TRACE => trace!(event = %event_type, data = %data, "Lifecycle event"),
            Level::DEBUG => debug!(event = %event_type, data = %data, "Lifecycle event"),
            Level::WARN => warn!(event = %event_type, data = %data, "Lifecycle event"),
            Level::ERROR => error!(event = %event_type, data = %data, "Lifecycle event"),
            _ => info!(event = %event_type, data = %data, "Lifecycle event"),
        }
    }
}

/// Keeps every event in memory. Meant for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<(String, Option<Value>)>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every event in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<Value>)> {
        self.events.lock().clone()
    }

    /// Returns the events whose type starts with `prefix`.
    #[must_use]
    pub fn events_of_type(&self, prefix: &str) -> Vec<(String, Option<Value>)> {
        self.events
            .lock()
            .iter()
            .filter(|(event_type, _)| event_type.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Returns the payloads of events for one pipeline.
    #[must_use]
    pub fn for_pipeline(&self, pipeline: &str) -> Vec<(String, Value)> {
        self.events
            .lock()
            .iter()
            .filter_map(|(event_type, data)| {
                let data = data.as_ref()?;
                (data.get("pipeline")?.as_str()? == pipeline)
                    .then(|| (event_type.clone(), data.clone()))
            })
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.events.lock().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_logging_sink_accepts_every_level() {
        for level in [Level::TRACE, Level::DEBUG, Level::INFO, Level::WARN, Level::ERROR] {
            LoggingEventSink::new(level).try_emit("pipeline.started", Some(json!({"x": 1})));
        }
        NoOpEventSink.try_emit("run.completed", None);
    }

    #[test]
    fn test_collecting_sink_filters() {
        let sink = CollectingEventSink::new();
        sink.try_emit("pipeline.started", Some(json!({"pipeline": "Posts"})));
        sink.try_emit("phase.started", Some(json!({"pipeline": "Tags"})));
        sink.try_emit("pipeline.completed", Some(json!({"pipeline": "Posts"})));
        sink.try_emit("run.completed", None);

        assert_eq!(sink.events().len(), 4);
        assert_eq!(sink.events_of_type("pipeline.").len(), 2);
        let posts: Vec<String> = sink.for_pipeline("Posts").into_iter().map(|(t, _)| t).collect();
        assert_eq!(posts, vec!["pipeline.started", "pipeline.completed"]);
    }
}
