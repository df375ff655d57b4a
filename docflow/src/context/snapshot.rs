//! The write-once map of finished pipeline outputs.

use crate::core::{Document, PipelineStatus};
use crate::errors::{ContextError, OutputConflictError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Finished outputs of every non-isolated pipeline that reached `Done`.
///
/// Each pipeline's entry is written exactly once and read many times after.
/// A `watch` channel per pipeline announces its terminal status so other
/// tasks can wait for it without polling.
#[derive(Debug)]
pub struct OutputSnapshot {
    outputs: RwLock<HashMap<String, Arc<Vec<Document>>>>,
    signals: HashMap<String, watch::Sender<Option<PipelineStatus>>>,
}

impl OutputSnapshot {
    /// Creates a snapshot with one completion signal per pipeline name.
    #[must_use]
    pub fn new<I, S>(pipelines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let signals = pipelines
            .into_iter()
            .map(|name| (name.into(), watch::channel(None).0))
            .collect();
        Self {
            outputs: RwLock::new(HashMap::new()),
            signals,
        }
    }

    /// Records a pipeline's final output and signals `Done`.
    ///
    /// # Errors
    ///
    /// Returns `OutputConflictError` if the pipeline is unknown to this
    /// snapshot or has already published.
    pub fn publish(
        &self,
        pipeline: &str,
        documents: Vec<Document>,
    ) -> Result<(), OutputConflictError> {
        let signal = self
            .signals
            .get(pipeline)
            .ok_or_else(|| OutputConflictError::new(pipeline, "Pipeline is not part of this run"))?;

        {
            let mut outputs = self.outputs.write();
            if outputs.contains_key(pipeline) || signal.borrow().is_some() {
                return Err(OutputConflictError::new(
                    pipeline,
                    "Pipeline output was already published",
                ));
            }
            outputs.insert(pipeline.to_string(), Arc::new(documents));
        }

        signal.send_replace(Some(PipelineStatus::Done));
        Ok(())
    }

    /// Signals a terminal status without publishing outputs.
    ///
    /// Used for failed, skipped and cancelled pipelines, and for isolated
    /// pipelines, which finish `Done` but stay out of the map. A pipeline that
    /// already reached a terminal status keeps it.
    pub fn mark_terminal(&self, pipeline: &str, status: PipelineStatus) {
        if let Some(signal) = self.signals.get(pipeline) {
            signal.send_if_modified(|current| {
                if current.is_some() {
                    return false;
                }
                *current = Some(status);
                true
            });
        }
    }

    /// Returns the published output of a pipeline.
    #[must_use]
    pub fn get(&self, pipeline: &str) -> Option<Arc<Vec<Document>>> {
        self.outputs.read().get(pipeline).cloned()
    }

    /// Checks whether a pipeline published output.
    #[must_use]
    pub fn contains(&self, pipeline: &str) -> bool {
        self.outputs.read().contains_key(pipeline)
    }

    /// Returns the terminal status of a pipeline, if it has one yet.
    #[must_use]
    pub fn status(&self, pipeline: &str) -> Option<PipelineStatus> {
        self.signals.get(pipeline).and_then(|s| *s.borrow())
    }

    /// Returns the names of pipelines with published output, sorted.
    #[must_use]
    pub fn published(&self) -> Vec<String> {
        let mut names: Vec<_> = self.outputs.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Waits until the pipeline reaches a terminal status and returns it.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::UnknownPipeline` if the name is not part of
    /// this run.
    pub async fn wait_for(&self, pipeline: &str) -> Result<PipelineStatus, ContextError> {
        let unknown = || ContextError::UnknownPipeline {
            name: pipeline.to_string(),
        };
        let mut receiver = self.signals.get(pipeline).ok_or_else(unknown)?.subscribe();
        let status = *receiver
            .wait_for(Option::is_some)
            .await
            .map_err(|_| unknown())?;
        status.ok_or_else(unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn docs(n: usize) -> Vec<Document> {
        (0..n).map(|i| Document::synthetic(format!("d{i}"))).collect()
    }

    #[test]
    fn test_publish_once() {
        let snapshot = OutputSnapshot::new(["Posts", "Tags"]);
        snapshot.publish("Posts", docs(2)).unwrap();

        assert_eq!(snapshot.get("Posts").unwrap().len(), 2);
        assert_eq!(snapshot.status("Posts"), Some(PipelineStatus::Done));
        assert!(snapshot.publish("Posts", docs(1)).is_err());
        assert_eq!(snapshot.get("Posts").unwrap().len(), 2);
        assert!(snapshot.publish("Unknown", docs(1)).is_err());
    }

    #[test]
    fn test_mark_terminal_does_not_publish() {
        let snapshot = OutputSnapshot::new(["Assets"]);
        snapshot.mark_terminal("Assets", PipelineStatus::Done);

        assert!(!snapshot.contains("Assets"));
        assert_eq!(snapshot.status("Assets"), Some(PipelineStatus::Done));

        snapshot.mark_terminal("Assets", PipelineStatus::Failed);
        assert_eq!(snapshot.status("Assets"), Some(PipelineStatus::Done));
        assert!(snapshot.publish("Assets", docs(1)).is_err());
    }

    #[tokio::test]
    async fn test_wait_for_resolves_on_publish() {
        let snapshot = Arc::new(OutputSnapshot::new(["Posts"]));
        let waiter = {
            let snapshot = snapshot.clone();
            tokio::spawn(async move { snapshot.wait_for("Posts").await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        snapshot.publish("Posts", docs(3)).unwrap();

        let status = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(status, PipelineStatus::Done);
    }

    #[tokio::test]
    async fn test_wait_for_failed_and_unknown() {
        let snapshot = OutputSnapshot::new(["Posts"]);
        snapshot.mark_terminal("Posts", PipelineStatus::Failed);
        assert_eq!(snapshot.wait_for("Posts").await, Ok(PipelineStatus::Failed));
        assert!(matches!(
            snapshot.wait_for("Nope").await,
            Err(ContextError::UnknownPipeline { .. })
        ));
    }
}
