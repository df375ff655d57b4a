//! Pipeline definitions.

use crate::core::{Metadata, MetadataValue, Phase};
use crate::modules::{Module, ModuleList};
use std::sync::Arc;

/// A named unit of the build: dependencies plus four ordered module lists.
///
/// Definitions are plain values; reusable behavior is shared by appending
/// the same modules (or a [`Layout`](crate::modules::Layout)) to several
/// pipelines rather than by specializing a base pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    dependencies: Vec<String>,
    isolated: bool,
    metadata: Metadata,
    input: ModuleList,
    process: ModuleList,
    post_process: ModuleList,
    output: ModuleList,
}

impl Pipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            isolated: false,
            metadata: Metadata::new(),
            input: ModuleList::new(),
            process: ModuleList::new(),
            post_process: ModuleList::new(),
            output: ModuleList::new(),
        }
    }

    /// Adds a dependency. Repeated names are ignored.
    #[must_use]
    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        let dependency = dependency.into();
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    /// Adds several dependencies.
    #[must_use]
    pub fn with_dependencies<I, S>(self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        dependencies
            .into_iter()
            .fold(self, |pipeline, dependency| pipeline.with_dependency(dependency))
    }

    /// Marks the pipeline as isolated: it may not depend on others and its
    /// output is never visible to other pipelines.
    #[must_use]
    pub fn isolated(mut self) -> Self {
        self.isolated = true;
        self
    }

    /// Sets a pipeline-local metadata value, consulted after document
    /// metadata and before global settings.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Appends an Input module.
    #[must_use]
    pub fn input(mut self, module: impl Module + 'static) -> Self {
        self.input.push(Arc::new(module));
        self
    }

    /// Appends a Process module.
    #[must_use]
    pub fn process(mut self, module: impl Module + 'static) -> Self {
        self.process.push(Arc::new(module));
        self
    }

    /// Appends a PostProcess module.
    #[must_use]
    pub fn post_process(mut self, module: impl Module + 'static) -> Self {
        self.post_process.push(Arc::new(module));
        self
    }

    /// Appends an Output module.
    #[must_use]
    pub fn output(mut self, module: impl Module + 'static) -> Self {
        self.output.push(Arc::new(module));
        self
    }

    /// Appends Input modules.
    #[must_use]
    pub fn input_modules(mut self, modules: impl IntoIterator<Item = Arc<dyn Module>>) -> Self {
        self.input.extend(modules);
        self
    }

    /// Appends Process modules.
    #[must_use]
    pub fn process_modules(mut self, modules: impl IntoIterator<Item = Arc<dyn Module>>) -> Self {
        self.process.extend(modules);
        self
    }

    /// Appends PostProcess modules.
    #[must_use]
    pub fn post_process_modules(
        mut self,
        modules: impl IntoIterator<Item = Arc<dyn Module>>,
    ) -> Self {
        self.post_process.extend(modules);
        self
    }

    /// Appends Output modules.
    #[must_use]
    pub fn output_modules(mut self, modules: impl IntoIterator<Item = Arc<dyn Module>>) -> Self {
        self.output.extend(modules);
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared dependencies in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Returns whether the pipeline is isolated.
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.isolated
    }

    /// Returns the pipeline-local metadata.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns the modules of one phase.
    #[must_use]
    pub fn modules(&self, phase: Phase) -> &[Arc<dyn Module>] {
        match phase {
            Phase::Input => &self.input,
            Phase::Process => &self.process,
            Phase::PostProcess => &self.post_process,
            Phase::Output => &self.output,
        }
    }

    /// Returns the total number of modules across all phases.
    #[must_use]
    pub fn module_count(&self) -> usize {
        Phase::ALL.iter().map(|phase| self.modules(*phase).len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{ConcatDocuments, OrderDocuments, WriteFiles};
    use crate::testing::MemorySink;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pipeline_definition() {
        let pipeline = Pipeline::new("Feeds")
            .with_dependency("Posts")
            .with_dependencies(["Posts", "Pages"])
            .with_metadata("Layout", "feed")
            .process(ConcatDocuments::new(["Posts"]))
            .process(OrderDocuments::by_datetime("Published").descending())
            .output(WriteFiles::new(Arc::new(MemorySink::new())));

        assert_eq!(pipeline.name(), "Feeds");
        assert_eq!(pipeline.dependencies(), ["Posts".to_string(), "Pages".to_string()]);
        assert!(!pipeline.is_isolated());
        assert_eq!(pipeline.modules(Phase::Process).len(), 2);
        assert!(pipeline.modules(Phase::Input).is_empty());
        assert_eq!(pipeline.module_count(), 3);
        assert!(pipeline.metadata().contains_key("Layout"));
    }

    #[test]
    fn test_module_lists_are_shared() {
        let shared: ModuleList = vec![Arc::new(ConcatDocuments::dependencies())];
        let a = Pipeline::new("A").post_process_modules(shared.clone());
        let b = Pipeline::new("B").post_process_modules(shared.clone());
        assert!(Arc::ptr_eq(
            &a.modules(Phase::PostProcess)[0],
            &b.modules(Phase::PostProcess)[0]
        ));
        assert!(Pipeline::new("C").isolated().is_isolated());
    }
}
