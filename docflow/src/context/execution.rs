//! The read-only view of the run handed to every module.

use super::links::format_link;
use super::OutputSnapshot;
use crate::cancellation::CancellationToken;
use crate::config::Settings;
use crate::core::{Document, Metadata, MetadataScope, Phase};
use crate::errors::{ContextError, WriteFailure};
use crate::events::RunEmitter;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// What every pipeline may know about every other pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineCatalog {
    entries: HashMap<String, CatalogEntry>,
}

#[derive(Debug, Clone, Default)]
struct CatalogEntry {
    isolated: bool,
    dependencies: Vec<String>,
    ancestors: HashSet<String>,
}

impl PipelineCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pipeline with its direct dependencies.
    ///
    /// Dependencies must be registered before their dependents so that
    /// transitive ancestors can be resolved.
    pub fn register(&mut self, name: impl Into<String>, dependencies: Vec<String>, isolated: bool) {
        let mut ancestors = HashSet::new();
        for dependency in &dependencies {
            ancestors.insert(dependency.clone());
            if let Some(entry) = self.entries.get(dependency) {
                ancestors.extend(entry.ancestors.iter().cloned());
            }
        }
        self.entries.insert(
            name.into(),
            CatalogEntry {
                isolated,
                dependencies,
                ancestors,
            },
        );
    }

    /// Checks whether a pipeline is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns whether a pipeline is isolated.
    #[must_use]
    pub fn is_isolated(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|e| e.isolated)
    }

    /// Returns the direct dependencies of a pipeline, in declaration order.
    #[must_use]
    pub fn dependencies(&self, name: &str) -> &[String] {
        self.entries
            .get(name)
            .map(|e| e.dependencies.as_slice())
            .unwrap_or_default()
    }

    /// Checks whether `ancestor` is a direct or transitive dependency of `name`.
    #[must_use]
    pub fn depends_on(&self, name: &str, ancestor: &str) -> bool {
        self.entries
            .get(name)
            .is_some_and(|e| e.ancestors.contains(ancestor))
    }
}

/// State shared by all pipelines of one run.
#[derive(Debug)]
pub(crate) struct RunShared {
    pub(crate) catalog: PipelineCatalog,
    pub(crate) snapshot: Arc<OutputSnapshot>,
    pub(crate) settings: Arc<Settings>,
    pub(crate) cancellation: Arc<CancellationToken>,
    pub(crate) emitter: RunEmitter,
    write_failures: Mutex<Vec<(String, WriteFailure)>>,
}

impl RunShared {
    pub(crate) fn new(
        catalog: PipelineCatalog,
        snapshot: Arc<OutputSnapshot>,
        settings: Arc<Settings>,
        cancellation: Arc<CancellationToken>,
        emitter: RunEmitter,
    ) -> Self {
        Self {
            catalog,
            snapshot,
            settings,
            cancellation,
            emitter,
            write_failures: Mutex::new(Vec::new()),
        }
    }

    /// Removes and returns the write failures recorded for a pipeline.
    pub(crate) fn take_write_failures(&self, pipeline: &str) -> Vec<WriteFailure> {
        let mut all = self.write_failures.lock();
        let (mine, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut *all).into_iter().partition(|(p, _)| p == pipeline);
        *all = rest;
        mine.into_iter().map(|(_, failure)| failure).collect()
    }
}

/// Read-only facade a module sees while it runs.
///
/// Exposes finished outputs of the current pipeline's dependencies, the
/// global settings, link formatting and the run's cancellation token.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pipeline: Arc<str>,
    phase: Phase,
    pipeline_metadata: Metadata,
    shared: Arc<RunShared>,
}

impl ExecutionContext {
    pub(crate) fn new(
        pipeline: impl Into<Arc<str>>,
        pipeline_metadata: Metadata,
        shared: Arc<RunShared>,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            phase: Phase::Input,
            pipeline_metadata,
            shared,
        }
    }

    pub(crate) fn with_phase(&self, phase: Phase) -> Self {
        let mut ctx = self.clone();
        ctx.phase = phase;
        ctx
    }

    /// Returns the name of the pipeline being executed.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.pipeline
    }

    /// Returns the phase being executed.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the global settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.shared.settings
    }

    /// Returns the pipeline-local metadata layer.
    #[must_use]
    pub fn pipeline_metadata(&self) -> &Metadata {
        &self.pipeline_metadata
    }

    /// Returns the direct dependencies of the current pipeline.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        self.shared.catalog.dependencies(&self.pipeline)
    }

    /// Returns the finished output of a dependency pipeline.
    ///
    /// # Errors
    ///
    /// - `UnknownPipeline` if the name was never declared.
    /// - `IsolatedPipeline` if the pipeline is isolated.
    /// - `UndeclaredDependency` if the current pipeline does not depend on it
    ///   directly or transitively.
    /// - `NotYetAvailable` if it has not published; given a valid dependency
    ///   declaration this only happens when the dependency did not finish `Done`.
    pub fn outputs_of(&self, name: &str) -> Result<Vec<Document>, ContextError> {
        let catalog = &self.shared.catalog;
        if !catalog.contains(name) {
            return Err(ContextError::UnknownPipeline {
                name: name.to_string(),
            });
        }
        if catalog.is_isolated(name) {
            return Err(ContextError::IsolatedPipeline {
                name: name.to_string(),
            });
        }
        if !catalog.depends_on(&self.pipeline, name) {
            return Err(ContextError::UndeclaredDependency {
                pipeline: self.pipeline.to_string(),
                requested: name.to_string(),
            });
        }
        self.shared
            .snapshot
            .get(name)
            .map(|docs| docs.as_ref().clone())
            .ok_or_else(|| ContextError::NotYetAvailable {
                name: name.to_string(),
            })
    }

    /// Concatenates the outputs of all direct, non-isolated dependencies in
    /// declaration order.
    ///
    /// # Errors
    ///
    /// Propagates the first `outputs_of` error.
    pub fn outputs_of_dependencies(&self) -> Result<Vec<Document>, ContextError> {
        let mut documents = Vec::new();
        for dependency in self.dependencies() {
            if self.shared.catalog.is_isolated(dependency) {
                continue;
            }
            documents.extend(self.outputs_of(dependency)?);
        }
        Ok(documents)
    }

    /// Formats the link for a document's destination.
    ///
    /// # Errors
    ///
    /// Returns `NoDestination` if the document has none.
    pub fn link_for(&self, document: &Document) -> Result<String, ContextError> {
        document
            .destination()
            .map(|destination| self.link_for_path(destination))
            .ok_or_else(|| ContextError::NoDestination {
                source_path: document.source().to_string(),
            })
    }

    /// Formats the link for a destination path.
    #[must_use]
    pub fn link_for_path(&self, destination: &Path) -> String {
        format_link(destination, self.shared.settings.links())
    }

    /// Builds the metadata lookup chain document → pipeline → global.
    #[must_use]
    pub fn scope<'a>(&'a self, document: &'a Document) -> MetadataScope<'a> {
        MetadataScope::new()
            .then(document.metadata())
            .then(&self.pipeline_metadata)
            .then(self.shared.settings.metadata())
    }

    /// Returns the run's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.shared.cancellation
    }

    /// Shorthand for `cancellation().is_cancelled()`.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancellation.is_cancelled()
    }

    /// Records a non-fatal write failure against the current pipeline. The
    /// engine reports it in the pipeline's outcome.
    pub fn record_write_failure(&self, failure: WriteFailure) {
        self.shared
            .write_failures
            .lock()
            .push((self.pipeline.to_string(), failure));
    }

    /// Emits a lifecycle event stamped with the run id and pipeline name.
    pub fn emit(&self, event_type: &str, data: serde_json::Value) {
        let data = match data {
            serde_json::Value::Object(mut map) => {
                map.entry("pipeline")
                    .or_insert_with(|| serde_json::json!(self.pipeline.as_ref()));
                serde_json::Value::Object(map)
            }
            other => serde_json::json!({ "pipeline": self.pipeline.as_ref(), "data": other }),
        };
        self.shared.emitter.emit(event_type, data);
    }
}
