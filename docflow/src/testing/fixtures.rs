//! Document fixtures and a harness for running modules outside an engine.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::config::Settings;
use crate::context::{ExecutionContext, OutputSnapshot, PipelineCatalog, RunShared};
use crate::core::{keys, Document, Metadata, PipelineStatus};
use crate::errors::WriteFailure;
use crate::events::{CollectingEventSink, RunEmitter};

/// A synthetic document with a `Title`.
#[must_use]
pub fn doc(title: &str) -> Document {
    Document::synthetic("test").with(keys::TITLE, title)
}

/// A blog post with `Title`, `Published` and `tags`.
#[must_use]
pub fn post(title: &str, published: &str, tags: &[&str]) -> Document {
    doc(title)
        .with(keys::PUBLISHED, published)
        .with("tags", tags.to_vec())
}

/// A context for `pipeline` in a run with no other pipelines.
#[must_use]
pub fn test_context(pipeline: &str) -> ExecutionContext {
    TestRun::new().context(pipeline)
}

struct SeededPipeline {
    name: String,
    documents: Vec<Document>,
    isolated: bool,
}

/// A fake run: pre-published dependency outputs plus the shared state a
/// module sees through its [`ExecutionContext`].
///
/// The shared state is created by the first call to
/// [`context`](Self::context); later calls reuse it so write failures and
/// cancellation are observed across contexts.
pub struct TestRun {
    settings: Settings,
    seeded: Vec<SeededPipeline>,
    cancellation: Arc<CancellationToken>,
    events: Arc<CollectingEventSink>,
    shared: Mutex<Option<Arc<RunShared>>>,
}

impl Default for TestRun {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRun {
    /// Creates an empty run with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            settings: Settings::new(),
            seeded: Vec::new(),
            cancellation: Arc::new(CancellationToken::new()),
            events: Arc::new(CollectingEventSink::new()),
            shared: Mutex::new(None),
        }
    }

    /// Replaces the global settings.
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Adds a finished pipeline whose output every context may read.
    #[must_use]
    pub fn with_outputs(mut self, name: impl Into<String>, documents: Vec<Document>) -> Self {
        self.seeded.push(SeededPipeline {
            name: name.into(),
            documents,
            isolated: false,
        });
        self
    }

    /// Adds a finished isolated pipeline.
    #[must_use]
    pub fn with_isolated(mut self, name: impl Into<String>, documents: Vec<Document>) -> Self {
        self.seeded.push(SeededPipeline {
            name: name.into(),
            documents,
            isolated: true,
        });
        self
    }

    /// Returns a context for `pipeline`, which depends on every seeded
    /// non-isolated pipeline.
    #[must_use]
    pub fn context(&self, pipeline: &str) -> ExecutionContext {
        let shared = Arc::clone(
            self.shared
                .lock()
                .get_or_insert_with(|| Arc::new(self.build_shared(pipeline))),
        );
        ExecutionContext::new(pipeline, Metadata::new(), shared)
    }

    fn build_shared(&self, pipeline: &str) -> RunShared {
        let mut catalog = PipelineCatalog::new();
        let mut names: Vec<&str> = Vec::new();
        for seeded in &self.seeded {
            catalog.register(seeded.name.clone(), Vec::new(), seeded.isolated);
            names.push(&seeded.name);
        }
        let dependencies = self
            .seeded
            .iter()
            .filter(|s| !s.isolated)
            .map(|s| s.name.clone())
            .collect();
        catalog.register(pipeline, dependencies, false);
        names.push(pipeline);

        let snapshot = Arc::new(OutputSnapshot::new(names));
        for seeded in &self.seeded {
            if seeded.isolated {
                snapshot.mark_terminal(&seeded.name, PipelineStatus::Done);
            } else if let Err(err) = snapshot.publish(&seeded.name, seeded.documents.clone()) {
                warn!(pipeline = %seeded.name, error = %err, "Seeded output ignored");
            }
        }

        RunShared::new(
            catalog,
            snapshot,
            Arc::new(self.settings.clone()),
            Arc::clone(&self.cancellation),
            RunEmitter::new(self.events.clone(), Uuid::new_v4()),
        )
    }

    /// Returns the run's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> Arc<CancellationToken> {
        Arc::clone(&self.cancellation)
    }

    /// Returns the events emitted through contexts of this run.
    #[must_use]
    pub fn events(&self) -> &CollectingEventSink {
        &self.events
    }

    /// Removes and returns the write failures recorded for `pipeline`.
    #[must_use]
    pub fn write_failures(&self, pipeline: &str) -> Vec<WriteFailure> {
        self.shared
            .lock()
            .as_ref()
            .map(|shared| shared.take_write_failures(pipeline))
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for TestRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRun")
            .field("seeded", &self.seeded.iter().map(|s| &s.name).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
