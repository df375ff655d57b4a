//! Engine builder with graph validation.

use super::{Engine, Pipeline};
use crate::config::Settings;
use crate::context::PipelineCatalog;
use crate::errors::{ContractErrorInfo, CycleDetectedError, DocflowError, PipelineValidationError};
use crate::events::{EventSink, NoOpEventSink};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Collects pipelines and settings, then validates them into an [`Engine`].
pub struct EngineBuilder {
    pipelines: Vec<Pipeline>,
    settings: Settings,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("pipelines", &self.pipelines)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            pipelines: Vec::new(),
            settings: Settings::default(),
            event_sink: Arc::new(NoOpEventSink),
        }
    }
}

impl EngineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the global settings.
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the lifecycle event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Registers a pipeline. Registration order breaks ties in the schedule.
    ///
    /// # Errors
    ///
    /// Returns an error if a pipeline with the same name is registered.
    pub fn add_pipeline(mut self, pipeline: Pipeline) -> Result<Self, PipelineValidationError> {
        if self.pipelines.iter().any(|p| p.name() == pipeline.name()) {
            return Err(PipelineValidationError::new(format!(
                "Pipeline '{}' is registered twice",
                pipeline.name()
            ))
            .with_pipelines(vec![pipeline.name().to_string()])
            .with_error_info(
                ContractErrorInfo::new("CONFIG-003-DUPLICATE", "Duplicate pipeline name")
                    .with_fix_hint("Give every pipeline a unique name."),
            ));
        }
        self.pipelines.push(pipeline);
        Ok(self)
    }

    /// Returns the number of registered pipelines.
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Validates the pipeline graph and computes the schedule.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for empty engines, bad names, and self, unknown or
    /// isolated dependencies; `CycleDetected` if the dependencies form a
    /// cycle; `Settings` if the engine configuration is invalid.
    pub fn build(self) -> Result<Engine, DocflowError> {
        self.settings.engine().validate()?;
        if self.pipelines.is_empty() {
            return Err(PipelineValidationError::new("Engine has no pipelines")
                .with_error_info(
                    ContractErrorInfo::new("CONFIG-007-EMPTY", "Cannot build an empty engine")
                        .with_fix_hint("Add at least one pipeline before building."),
                )
                .into());
        }

        let by_name: HashMap<&str, &Pipeline> =
            self.pipelines.iter().map(|p| (p.name(), p)).collect();
        for pipeline in &self.pipelines {
            validate_pipeline(pipeline, &by_name)?;
        }
        detect_cycles(&self.pipelines)?;

        let order = schedule(&self.pipelines);
        let mut slots: Vec<Option<Pipeline>> = self.pipelines.into_iter().map(Some).collect();
        let mut catalog = PipelineCatalog::new();
        let mut scheduled = Vec::with_capacity(order.len());
        for index in order {
            if let Some(pipeline) = slots[index].take() {
                catalog.register(
                    pipeline.name(),
                    pipeline.dependencies().to_vec(),
                    pipeline.is_isolated(),
                );
                scheduled.push(Arc::new(pipeline));
            }
        }

        Ok(Engine::new(
            scheduled,
            catalog,
            Arc::new(self.settings),
            self.event_sink,
        ))
    }
}

fn validate_pipeline(
    pipeline: &Pipeline,
    by_name: &HashMap<&str, &Pipeline>,
) -> Result<(), PipelineValidationError> {
    let name = pipeline.name();
    if name.trim().is_empty() || name.trim() != name {
        return Err(PipelineValidationError::new(format!(
            "Pipeline name '{name}' is empty or has surrounding whitespace"
        ))
        .with_pipelines(vec![name.to_string()])
        .with_error_info(
            ContractErrorInfo::new("CONFIG-005-NAME", "Invalid pipeline name")
                .with_fix_hint("Use a non-empty name without leading or trailing whitespace."),
        ));
    }

    for dependency in pipeline.dependencies() {
        if dependency == name {
            return Err(PipelineValidationError::new(format!(
                "Pipeline '{name}' cannot depend on itself"
            ))
            .with_pipelines(vec![name.to_string()])
            .with_error_info(
                ContractErrorInfo::new("CONFIG-006-SELF_DEP", "Self dependency")
                    .with_fix_hint("Remove the pipeline from its own dependency list."),
            ));
        }
        let Some(target) = by_name.get(dependency.as_str()) else {
            return Err(PipelineValidationError::new(format!(
                "Pipeline '{name}' depends on unknown pipeline '{dependency}'"
            ))
            .with_pipelines(vec![name.to_string(), dependency.clone()])
            .with_error_info(
                ContractErrorInfo::new(
                    "CONFIG-002-UNKNOWN_DEP",
                    format!("Dependency '{dependency}' not found"),
                )
                .with_fix_hint("Register the dependency or fix the name.")
                .with_context_entry("pipeline", name),
            ));
        };
        if pipeline.is_isolated() || target.is_isolated() {
            let isolated = if pipeline.is_isolated() { name } else { dependency.as_str() };
            return Err(PipelineValidationError::new(format!(
                "Pipeline '{name}' cannot depend on '{dependency}': '{isolated}' is isolated"
            ))
            .with_pipelines(vec![name.to_string(), dependency.clone()])
            .with_error_info(
                ContractErrorInfo::new(
                    "CONFIG-004-ISOLATED_DEP",
                    "Isolated pipelines take no part in dependencies",
                )
                .with_fix_hint("Remove the dependency or make the pipeline non-isolated.")
                .with_context_entry("isolated", isolated),
            ));
        }
    }
    Ok(())
}

fn detect_cycles(pipelines: &[Pipeline]) -> Result<(), CycleDetectedError> {
    let deps: HashMap<&str, &[String]> = pipelines
        .iter()
        .map(|p| (p.name(), p.dependencies()))
        .collect();
    let mut visited = HashSet::new();
    let mut on_stack = HashSet::new();
    let mut path = Vec::new();

    for pipeline in pipelines {
        if !visited.contains(pipeline.name()) {
            if let Some(cycle) =
                dfs_cycle(pipeline.name(), &deps, &mut visited, &mut on_stack, &mut path)
            {
                return Err(CycleDetectedError::new(cycle));
            }
        }
    }
    Ok(())
}

fn dfs_cycle<'a>(
    node: &'a str,
    deps: &HashMap<&'a str, &'a [String]>,
    visited: &mut HashSet<&'a str>,
    on_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    on_stack.insert(node);
    path.push(node);

    for dep in deps.get(node).copied().unwrap_or_default() {
        let dep = dep.as_str();
        if !visited.contains(dep) {
            if let Some(cycle) = dfs_cycle(dep, deps, visited, on_stack, path) {
                return Some(cycle);
            }
        } else if on_stack.contains(dep) {
            let start = path.iter().position(|n| *n == dep).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|n| (*n).to_string()).collect();
            cycle.push(dep.to_string());
            return Some(cycle);
        }
    }

    path.pop();
    on_stack.remove(node);
    None
}

/// Kahn's algorithm; among ready pipelines the earliest registered goes
/// first. Returns indices into `pipelines`.
fn schedule(pipelines: &[Pipeline]) -> Vec<usize> {
    let index: HashMap<&str, usize> = pipelines
        .iter()
        .enumerate()
        .map(|(i, p)| (p.name(), i))
        .collect();
    let mut in_degree: Vec<usize> = pipelines.iter().map(|p| p.dependencies().len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); pipelines.len()];
    for (i, pipeline) in pipelines.iter().enumerate() {
        for dep in pipeline.dependencies() {
            if let Some(&d) = index.get(dep.as_str()) {
                dependents[d].push(i);
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..pipelines.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(pipelines.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &child in &dependents[next] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.insert(child);
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn code(err: &DocflowError) -> Option<&str> {
        match err {
            DocflowError::Validation(e) => e.code(),
            _ => None,
        }
    }

    fn build(pipelines: Vec<Pipeline>) -> Result<Engine, DocflowError> {
        pipelines
            .into_iter()
            .try_fold(EngineBuilder::new(), EngineBuilder::add_pipeline)?
            .build()
    }

    #[test]
    fn test_schedule_respects_dependencies_and_registration_order() {
        let engine = build(vec![
            Pipeline::new("Feeds").with_dependency("Posts"),
            Pipeline::new("Layout"),
            Pipeline::new("Posts").with_dependency("Layout"),
            Pipeline::new("Assets").isolated(),
            Pipeline::new("Tags").with_dependencies(["Posts", "Layout"]),
        ])
        .unwrap();
        assert_eq!(
            engine.schedule(),
            vec!["Layout", "Posts", "Feeds", "Assets", "Tags"]
        );
    }

    fn assert_dependencies_first(shape: &[(String, Vec<String>)]) {
        let engine = build(
            shape
                .iter()
                .map(|(name, deps)| Pipeline::new(name.as_str()).with_dependencies(deps.clone()))
                .collect(),
        )
        .unwrap();
        let schedule = engine.schedule();
        assert_eq!(schedule.len(), shape.len());
        let position: HashMap<&str, usize> =
            schedule.iter().enumerate().map(|(i, name)| (*name, i)).collect();
        for (name, deps) in shape {
            for dep in deps {
                assert!(
                    position[dep.as_str()] < position[name.as_str()],
                    "{dep} must run before {name} in {schedule:?}"
                );
            }
        }
    }

    fn node(name: impl Into<String>, deps: &[String]) -> (String, Vec<String>) {
        (name.into(), deps.to_vec())
    }

    #[test]
    fn test_schedule_orders_dependencies_first_across_shapes() {
        let n = |i: usize| format!("P{i}");

        // Chain registered back to front.
        let chain: Vec<_> = (0..8)
            .rev()
            .map(|i| node(n(i), &if i == 0 { vec![] } else { vec![n(i - 1)] }))
            .collect();

        let diamond = vec![
            node("Feed", &["Posts".into(), "Tags".into()]),
            node("Tags", &["Layout".into()]),
            node("Posts", &["Layout".into()]),
            node("Layout", &[]),
        ];

        // Sink registered before its many sources.
        let mut fan_in = vec![node("Sitemap", &(0..10).map(n).collect::<Vec<_>>())];
        fan_in.extend((0..10).map(|i| node(n(i), &[])));

        // Layered graph: node i depends on i / 2 and i / 3, registered in a
        // scrambled order.
        let count = 24;
        let layered: Vec<_> = (0..count)
            .map(|k| (k * 7) % count)
            .map(|i| {
                let deps: BTreeSet<String> = [i / 2, i / 3]
                    .into_iter()
                    .filter(|&d| d != i)
                    .map(n)
                    .collect();
                node(n(i), &deps.into_iter().collect::<Vec<_>>())
            })
            .collect();

        for shape in [chain, diamond, fan_in, layered] {
            assert_dependencies_first(&shape);
        }
    }

    #[test]
    fn test_duplicate_name() {
        let err = EngineBuilder::new()
            .add_pipeline(Pipeline::new("Posts"))
            .unwrap()
            .add_pipeline(Pipeline::new("Posts"))
            .unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-003-DUPLICATE"));
    }

    #[test]
    fn test_invalid_graphs() {
        let cases = vec![
            (vec![], "CONFIG-007-EMPTY"),
            (vec![Pipeline::new("  ")], "CONFIG-005-NAME"),
            (vec![Pipeline::new("A").with_dependency("A")], "CONFIG-006-SELF_DEP"),
            (vec![Pipeline::new("A").with_dependency("Missing")], "CONFIG-002-UNKNOWN_DEP"),
            (
                vec![Pipeline::new("Assets").isolated(), Pipeline::new("A").with_dependency("Assets")],
                "CONFIG-004-ISOLATED_DEP",
            ),
            (
                vec![Pipeline::new("B"), Pipeline::new("Assets").isolated().with_dependency("B")],
                "CONFIG-004-ISOLATED_DEP",
            ),
        ];
        for (pipelines, expected) in cases {
            let err = build(pipelines).unwrap_err();
            assert_eq!(code(&err), Some(expected), "{err}");
        }
    }

    #[test]
    fn test_cycle_reports_path() {
        let err = build(vec![
            Pipeline::new("A").with_dependency("C"),
            Pipeline::new("B").with_dependency("A"),
            Pipeline::new("C").with_dependency("B"),
            Pipeline::new("D"),
        ])
        .unwrap_err();
        let DocflowError::CycleDetected(cycle) = err else {
            panic!("expected cycle, got {err}");
        };
        assert_eq!(cycle.cycle_path, vec!["A", "C", "B", "A"]);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let err = EngineBuilder::new()
            .with_settings(Settings::new().with_engine(
                crate::config::EngineConfig::new().with_max_concurrency(0),
            ))
            .add_pipeline(Pipeline::new("A"))
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, DocflowError::Settings(_)));
    }

    #[test]
    fn test_oversized_worker_pool_rejected() {
        let err = Settings::from_json_str(&format!(
            r#"{{"engine": {{"max_concurrency": {}}}}}"#,
            usize::MAX
        ))
        .unwrap_err();
        assert!(matches!(err, DocflowError::Settings(_)));

        let err = EngineBuilder::new()
            .with_settings(Settings::new().with_engine(
                crate::config::EngineConfig::new()
                    .with_max_concurrency(tokio::sync::Semaphore::MAX_PERMITS + 1),
            ))
            .add_pipeline(Pipeline::new("A"))
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, DocflowError::Settings(_)));
    }
}
