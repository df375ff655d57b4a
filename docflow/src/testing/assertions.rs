//! Test assertions for document streams and run reports.

use crate::core::{keys, Document, MetadataValue, PipelineStatus};
use crate::pipeline::RunReport;

/// Returns the `Title` of every document, or `<untitled>`.
#[must_use]
pub fn titles(documents: &[Document]) -> Vec<String> {
    documents
        .iter()
        .map(|doc| {
            doc.get(keys::TITLE)
                .and_then(MetadataValue::to_text)
                .unwrap_or_else(|| "<untitled>".to_string())
        })
        .collect()
}

/// Asserts the documents carry exactly these titles, in order.
pub fn assert_titles(documents: &[Document], expected: &[&str]) {
    assert_eq!(
        titles(documents),
        expected,
        "Unexpected document titles"
    );
}

/// Asserts the terminal status of a pipeline.
pub fn assert_status(report: &RunReport, pipeline: &str, expected: PipelineStatus) {
    assert_eq!(
        report.status(pipeline),
        Some(expected),
        "Expected pipeline '{pipeline}' to be {expected:?}\n{}",
        report.summary()
    );
}
