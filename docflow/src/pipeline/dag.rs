//! The pipeline scheduler.
//!
//! Pipelines start as soon as all of their dependencies are `Done`, bounded
//! by a worker pool. Only finished snapshots are visible across pipelines,
//! so ready pipelines can run in parallel without observing each other.

use super::executor::execute_pipeline;
use super::{Pipeline, PipelineOutcome, RunReport};
use crate::cancellation::CancellationToken;
use crate::config::{FailureMode, Settings};
use crate::context::{OutputSnapshot, PipelineCatalog, RunShared};
use crate::core::PipelineStatus;
use crate::errors::DocflowError;
use crate::events::{types, EventSink, RunEmitter};
use crate::observability::SpanTimer;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A validated, scheduled set of pipelines. Built by
/// [`EngineBuilder`](super::EngineBuilder); each call to [`run`](Self::run)
/// is an independent run with a fresh snapshot.
pub struct Engine {
    pipelines: Vec<Arc<Pipeline>>,
    catalog: PipelineCatalog,
    settings: Arc<Settings>,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("schedule", &self.schedule())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Per-run bookkeeping of the scheduler loop.
struct RunState {
    in_degree: Vec<usize>,
    dependents: Vec<Vec<usize>>,
    outcomes: Vec<Option<PipelineOutcome>>,
}

impl RunState {
    fn new(pipelines: &[Arc<Pipeline>]) -> Self {
        let index: HashMap<&str, usize> = pipelines
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name(), i))
            .collect();
        let mut dependents = vec![Vec::new(); pipelines.len()];
        for (i, pipeline) in pipelines.iter().enumerate() {
            for dependency in pipeline.dependencies() {
                if let Some(&d) = index.get(dependency.as_str()) {
                    dependents[d].push(i);
                }
            }
        }
        Self {
            in_degree: pipelines.iter().map(|p| p.dependencies().len()).collect(),
            dependents,
            outcomes: vec![None; pipelines.len()],
        }
    }
}

impl Engine {
    pub(crate) fn new(
        pipelines: Vec<Arc<Pipeline>>,
        catalog: PipelineCatalog,
        settings: Arc<Settings>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            pipelines,
            catalog,
            settings,
            event_sink,
        }
    }

    /// Returns pipeline names in schedule order: dependencies first, ties
    /// broken by registration order.
    #[must_use]
    pub fn schedule(&self) -> Vec<&str> {
        self.pipelines.iter().map(|p| p.name()).collect()
    }

    /// Returns the global settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs every pipeline once.
    pub async fn run(&self) -> RunReport {
        self.run_with_cancellation(Arc::new(CancellationToken::new()))
            .await
    }

    /// Runs every pipeline once under an external cancellation token.
    ///
    /// Cancelling the token stops running pipelines at their next module
    /// boundary (`Cancelled`) and keeps pending ones from starting
    /// (`Skipped`).
    pub async fn run_with_cancellation(&self, cancellation: Arc<CancellationToken>) -> RunReport {
        let run_id = Uuid::new_v4();
        let emitter = RunEmitter::new(Arc::clone(&self.event_sink), run_id);
        let snapshot = Arc::new(OutputSnapshot::new(self.pipelines.iter().map(|p| p.name())));
        let shared = Arc::new(RunShared::new(
            self.catalog.clone(),
            Arc::clone(&snapshot),
            Arc::clone(&self.settings),
            Arc::clone(&cancellation),
            emitter.clone(),
        ));
        let workers = Arc::new(Semaphore::new(self.settings.engine().max_concurrency));
        let fail_fast = self.settings.engine().failure_mode == FailureMode::FailFast;
        let timer = SpanTimer::start("run");

        emitter.emit(
            types::RUN_STARTED,
            json!({ "pipelines": self.schedule(), "max_concurrency": self.settings.engine().max_concurrency }),
        );
        info!(%run_id, pipelines = self.pipelines.len(), "Run started");

        let mut state = RunState::new(&self.pipelines);
        let mut active = FuturesUnordered::new();
        for (i, degree) in state.in_degree.iter().enumerate() {
            if *degree == 0 {
                active.push(self.spawn(i, &shared, &workers));
            }
        }

        while let Some((index, joined)) = active.next().await {
            let name = self.pipelines[index].name();
            let outcome = joined.unwrap_or_else(|join_error| {
                error!(pipeline = %name, error = %join_error, "Pipeline task panicked");
                shared.snapshot.mark_terminal(name, PipelineStatus::Failed);
                let err = DocflowError::Internal(format!("pipeline task panicked: {join_error}"));
                PipelineOutcome::errored(name, &err, 0.0)
            });
            let status = outcome.status;
            state.outcomes[index] = Some(outcome);

            match status {
                PipelineStatus::Done => {
                    for &child in &state.dependents[index] {
                        state.in_degree[child] -= 1;
                        if state.in_degree[child] == 0 && state.outcomes[child].is_none() {
                            active.push(self.spawn(child, &shared, &workers));
                        }
                    }
                }
                PipelineStatus::Failed if fail_fast => {
                    cancellation.cancel(format!("pipeline '{name}' failed"));
                    self.skip_dependents(index, &mut state, &emitter, &snapshot);
                }
                _ => self.skip_dependents(index, &mut state, &emitter, &snapshot),
            }
        }

        let outcomes: Vec<PipelineOutcome> = state
            .outcomes
            .into_iter()
            .zip(&self.pipelines)
            .map(|(outcome, pipeline)| {
                outcome.unwrap_or_else(|| {
                    snapshot.mark_terminal(pipeline.name(), PipelineStatus::Skipped);
                    PipelineOutcome::skipped(pipeline.name(), "never became ready")
                })
            })
            .collect();
        let duration_ms = timer.finish();
        let report = RunReport::new(run_id, outcomes, duration_ms, snapshot);

        emitter.emit(
            types::RUN_COMPLETED,
            json!({
                "succeeded": report.succeeded(),
                "done": report.count(PipelineStatus::Done),
                "failed": report.count(PipelineStatus::Failed),
                "skipped": report.count(PipelineStatus::Skipped),
                "cancelled": report.count(PipelineStatus::Cancelled),
                "duration_ms": duration_ms,
            }),
        );
        if report.succeeded() {
            info!(%run_id, duration_ms, "Run completed");
        } else {
            warn!(%run_id, duration_ms, summary = %report.summary(), "Run completed with failures");
        }
        report
    }

    fn spawn(
        &self,
        index: usize,
        shared: &Arc<RunShared>,
        workers: &Arc<Semaphore>,
    ) -> impl Future<Output = (usize, Result<PipelineOutcome, tokio::task::JoinError>)> {
        let handle = tokio::spawn(execute_pipeline(
            Arc::clone(&self.pipelines[index]),
            Arc::clone(shared),
            Arc::clone(workers),
        ));
        async move { (index, handle.await) }
    }

    /// Marks every transitive dependent of a pipeline that did not finish
    /// `Done` as `Skipped`.
    fn skip_dependents(
        &self,
        index: usize,
        state: &mut RunState,
        emitter: &RunEmitter,
        snapshot: &OutputSnapshot,
    ) {
        let origin = self.pipelines[index].name();
        let mut queue: VecDeque<(usize, &str)> = state.dependents[index]
            .iter()
            .map(|&child| (child, origin))
            .collect();
        while let Some((child, because)) = queue.pop_front() {
            if state.outcomes[child].is_some() {
                continue;
            }
            let name = self.pipelines[child].name();
            let reason = format!("dependency '{because}' did not complete");
            snapshot.mark_terminal(name, PipelineStatus::Skipped);
            emitter.emit(
                types::PIPELINE_SKIPPED,
                json!({ "pipeline": name, "reason": reason }),
            );
            info!(pipeline = %name, reason = %reason, "Pipeline skipped");
            state.outcomes[child] = Some(PipelineOutcome::skipped(name, reason));
            queue.extend(state.dependents[child].iter().map(|&next| (next, name)));
        }
    }
}
