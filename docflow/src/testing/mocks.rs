//! Mock modules for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::context::ExecutionContext;
use crate::core::Document;
use crate::errors::DocflowError;
use crate::modules::{Module, Partials, TemplateRenderer};

/// A module that always fails.
#[derive(Debug)]
pub struct FailingModule {
    message: String,
}

impl FailingModule {
    /// Creates a failing module with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Module for FailingModule {
    fn name(&self) -> &str {
        "FailingModule"
    }

    async fn execute(
        &self,
        _inputs: Vec<Document>,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        Err(DocflowError::module(self.name(), self.message.clone()))
    }
}

/// A module that replaces the stream with fixed documents.
#[derive(Debug, Clone)]
pub struct StaticModule {
    documents: Vec<Document>,
}

impl StaticModule {
    /// Creates a module producing `documents`.
    #[must_use]
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl Module for StaticModule {
    fn name(&self) -> &str {
        "StaticModule"
    }

    async fn execute(
        &self,
        _inputs: Vec<Document>,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        Ok(self.documents.clone())
    }
}

/// One call seen by a [`RecordingModule`].
#[derive(Debug, Clone)]
pub struct RecordedExecution {
    /// The executing pipeline.
    pub pipeline: String,
    /// Number of input documents.
    pub inputs: usize,
    /// Pipelines whose outputs were published when the call started.
    pub published: Vec<String>,
}

/// A pass-through module that records every call.
#[derive(Debug, Default)]
pub struct RecordingModule {
    executions: Mutex<Vec<RecordedExecution>>,
}

impl RecordingModule {
    /// Creates a recording module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded executions.
    #[must_use]
    pub fn executions(&self) -> Vec<RecordedExecution> {
        self.executions.lock().clone()
    }
}

#[async_trait]
impl Module for RecordingModule {
    fn name(&self) -> &str {
        "RecordingModule"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        let mut published: Vec<String> = ctx
            .dependencies()
            .iter()
            .filter(|name| ctx.outputs_of(name).is_ok())
            .cloned()
            .collect();
        published.sort();
        self.executions.lock().push(RecordedExecution {
            pipeline: ctx.pipeline_name().to_string(),
            inputs: inputs.len(),
            published,
        });
        Ok(inputs)
    }
}

/// A pass-through module that sleeps and tracks how many instances of
/// itself run at once.
#[derive(Debug)]
pub struct SlowModule {
    delay: Duration,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl SlowModule {
    /// Creates a slow module; clones share the concurrency counters.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            running: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a slow module with a delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Returns the highest number of concurrent executions observed.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Clone for SlowModule {
    fn clone(&self) -> Self {
        Self {
            delay: self.delay,
            running: Arc::clone(&self.running),
            peak: Arc::clone(&self.peak),
        }
    }
}

#[async_trait]
impl Module for SlowModule {
    fn name(&self) -> &str {
        "SlowModule"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(inputs)
    }
}

/// A minimal template renderer: `{{key}}` is replaced by the model's value
/// at `key` and `{{> name}}` by the partial `name`.
#[derive(Debug, Default)]
pub struct PlaceholderRenderer;

impl PlaceholderRenderer {
    /// Creates the renderer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TemplateRenderer for PlaceholderRenderer {
    fn render(
        &self,
        template: &str,
        model: &Value,
        partials: &Partials,
    ) -> Result<String, DocflowError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| DocflowError::module("PlaceholderRenderer", "unclosed tag"))?;
            let tag = after[..end].trim();
            if let Some(name) = tag.strip_prefix('>') {
                let name = name.trim();
                let partial = partials.get(name).ok_or_else(|| {
                    DocflowError::module("PlaceholderRenderer", format!("unknown partial '{name}'"))
                })?;
                out.push_str(partial);
            } else {
                match model.get(tag) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(Value::Null) | None => {}
                    Some(other) => out.push_str(&other.to_string()),
                }
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
