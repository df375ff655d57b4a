//! Runs the phases of a single pipeline.

use super::{Pipeline, PipelineOutcome};
use crate::context::{ExecutionContext, RunShared};
use crate::core::{Document, Phase, PipelineStatus};
use crate::errors::DocflowError;
use crate::events::types;
use crate::modules::run_modules;
use crate::observability::SpanTimer;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, warn, Instrument};

async fn run_phases(
    pipeline: &Pipeline,
    ctx: &ExecutionContext,
) -> Result<Vec<Document>, DocflowError> {
    let mut documents = Vec::new();
    for phase in Phase::ALL {
        let modules = pipeline.modules(phase);
        if modules.is_empty() {
            continue;
        }
        let phase_ctx = ctx.with_phase(phase);
        phase_ctx.emit(
            types::PHASE_STARTED,
            json!({
                "phase": phase,
                "status": PipelineStatus::Running(phase),
                "documents": documents.len(),
            }),
        );
        debug!(phase = %phase, modules = modules.len(), "Phase started");
        documents = run_modules(modules, documents, &phase_ctx).await?;
    }
    Ok(documents)
}

/// Waits for a worker slot, runs the pipeline and settles its snapshot entry.
///
/// Publishing is the last step: the output becomes visible only after every
/// phase succeeded. Failed and cancelled pipelines never publish.
pub(crate) async fn execute_pipeline(
    pipeline: Arc<Pipeline>,
    shared: Arc<RunShared>,
    workers: Arc<Semaphore>,
) -> PipelineOutcome {
    let name = pipeline.name().to_string();
    let span = info_span!("pipeline", name = %name);

    async move {
        let Ok(_permit) = workers.acquire_owned().await else {
            let err = DocflowError::Internal("worker pool closed".to_string());
            shared.snapshot.mark_terminal(&name, PipelineStatus::Failed);
            return PipelineOutcome::errored(&name, &err, 0.0);
        };

        if shared.cancellation.is_cancelled() {
            let reason = format!(
                "run cancelled before start: {}",
                shared.cancellation.reason().unwrap_or_default()
            );
            shared.snapshot.mark_terminal(&name, PipelineStatus::Skipped);
            shared.emitter.emit(
                types::PIPELINE_SKIPPED,
                json!({ "pipeline": name, "reason": reason }),
            );
            info!(reason = %reason, "Pipeline skipped");
            return PipelineOutcome::skipped(&name, reason);
        }

        let ctx = ExecutionContext::new(
            name.as_str(),
            pipeline.metadata().clone(),
            Arc::clone(&shared),
        );
        ctx.emit(types::PIPELINE_STARTED, json!({ "isolated": pipeline.is_isolated() }));
        info!(isolated = pipeline.is_isolated(), "Pipeline started");
        let timer = SpanTimer::start(name.as_str());

        let result = run_phases(&pipeline, &ctx).await.and_then(|documents| {
            let count = documents.len();
            if pipeline.is_isolated() {
                shared.snapshot.mark_terminal(&name, PipelineStatus::Done);
            } else {
                shared.snapshot.publish(&name, documents)?;
            }
            Ok(count)
        });
        let duration_ms = timer.elapsed_ms();

        let mut outcome = match result {
            Ok(count) => {
                ctx.emit(
                    types::PIPELINE_COMPLETED,
                    json!({ "documents": count, "duration_ms": duration_ms }),
                );
                info!(documents = count, duration_ms, "Pipeline completed");
                PipelineOutcome::done(&name, count, duration_ms)
            }
            Err(err) => {
                let outcome = PipelineOutcome::errored(&name, &err, duration_ms);
                shared.snapshot.mark_terminal(&name, outcome.status);
                if outcome.status == PipelineStatus::Cancelled {
                    ctx.emit(types::PIPELINE_CANCELLED, json!({ "reason": err.to_string() }));
                    warn!(reason = %err, "Pipeline cancelled");
                } else {
                    ctx.emit(
                        types::PIPELINE_FAILED,
                        json!({
                            "error": err.to_string(),
                            "error_kind": err.kind(),
                            "duration_ms": duration_ms,
                        }),
                    );
                    error!(error = %err, kind = ?err.kind(), "Pipeline failed");
                }
                outcome
            }
        };
        outcome.write_failures = shared.take_write_failures(&name);
        outcome
    }
    .instrument(span)
    .await
}
