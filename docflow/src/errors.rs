//! Error types for the docflow engine.
//!
//! The taxonomy separates configuration problems (detected before any
//! pipeline runs) from per-document and per-pipeline failures raised while
//! the graph executes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for docflow operations.
#[derive(Debug, Error)]
pub enum DocflowError {
    /// The pipeline graph is invalid (unknown dependency, duplicate name, ...).
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// The pipeline graph contains a dependency cycle.
    #[error("{0}")]
    CycleDetected(#[from] CycleDetectedError),

    /// A metadata lookup failed.
    #[error("{0}")]
    Metadata(#[from] MetadataError),

    /// A module asked the execution context for something it may not see.
    #[error("{0}")]
    Context(#[from] ContextError),

    /// Source content could not be parsed.
    #[error("Malformed content in '{source_path}': {message}")]
    MalformedContent {
        /// The source the content came from.
        source_path: String,
        /// Parser diagnostics.
        message: String,
    },

    /// A module raised an error.
    #[error("Module '{module}' failed: {message}")]
    ModuleFailure {
        /// The module name.
        module: String,
        /// The failure message.
        message: String,
    },

    /// Writing an output artifact failed.
    #[error("{0}")]
    Write(#[from] WriteFailure),

    /// The run was cancelled.
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// A pipeline published its output twice.
    #[error("{0}")]
    OutputConflict(#[from] OutputConflictError),

    /// Settings could not be loaded.
    #[error("Invalid settings: {0}")]
    Settings(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocflowError {
    /// Creates a module failure error.
    #[must_use]
    pub fn module(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModuleFailure {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Creates a malformed content error.
    #[must_use]
    pub fn malformed(source_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedContent {
            source_path: source_path.into(),
            message: message.into(),
        }
    }

    /// Returns the coarse error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::CycleDetected(_) | Self::Settings(_) => {
                ErrorKind::Configuration
            }
            Self::Metadata(MetadataError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Metadata(MetadataError::TypeMismatch { .. }) => ErrorKind::TypeMismatch,
            Self::MalformedContent { .. } => ErrorKind::MalformedContent,
            Self::Write(_) => ErrorKind::WriteFailure,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Context(_) | Self::ModuleFailure { .. } | Self::Io(_) => ErrorKind::ModuleFailure,
            Self::OutputConflict(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Coarse error categories used in run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid pipeline graph or settings.
    Configuration,
    /// A metadata key was absent.
    NotFound,
    /// A metadata value could not be coerced.
    TypeMismatch,
    /// Source content could not be parsed.
    MalformedContent,
    /// Any other module-raised error.
    ModuleFailure,
    /// An artifact could not be written.
    WriteFailure,
    /// The run was cancelled.
    Cancelled,
    /// An engine invariant was broken.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Configuration => "configuration",
            Self::NotFound => "not_found",
            Self::TypeMismatch => "type_mismatch",
            Self::MalformedContent => "malformed_content",
            Self::ModuleFailure => "module_failure",
            Self::WriteFailure => "write_failure",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Diagnostics attached to configuration errors.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONFIG-001-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when the pipeline graph fails validation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The pipelines involved in the error.
    pub pipelines: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            pipelines: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the pipelines involved.
    #[must_use]
    pub fn with_pipelines(mut self, pipelines: Vec<String>) -> Self {
        self.pipelines = pipelines;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when a cycle is detected in the pipeline graph.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in pipeline graph: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of pipelines forming the cycle, first node repeated at the end.
    pub cycle_path: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let info = ContractErrorInfo::new(
            "CONFIG-001-CYCLE",
            format!("Pipelines form a dependency cycle: {}", cycle_path.join(" -> ")),
        )
        .with_fix_hint("Remove one of the dependencies in the cycle to break it.");

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

/// Metadata lookup failures. Callers can tell an absent key from a bad value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// No value is stored under the key.
    #[error("Metadata key '{key}' not found")]
    NotFound {
        /// The requested key.
        key: String,
    },

    /// A value exists but cannot be coerced to the requested type.
    #[error("Metadata key '{key}' holds {found}, expected {expected}")]
    TypeMismatch {
        /// The requested key.
        key: String,
        /// The requested type.
        expected: &'static str,
        /// The stored value's type.
        found: &'static str,
    },
}

impl MetadataError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn mismatch(key: impl Into<String>, expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            expected,
            found,
        }
    }

    /// Returns true for the not-found case.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Converts `NotFound` into `Ok(None)` while keeping type mismatches as errors.
pub trait MetadataResultExt<T> {
    /// Treats an absent key as `None`.
    ///
    /// # Errors
    ///
    /// Returns the original error if it is not `NotFound`.
    fn optional(self) -> Result<Option<T>, MetadataError>;
}

impl<T> MetadataResultExt<T> for Result<T, MetadataError> {
    fn optional(self) -> Result<Option<T>, MetadataError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Errors raised by the execution context's cross-pipeline accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The pipeline name was never declared.
    #[error("Unknown pipeline '{name}'")]
    UnknownPipeline {
        /// The requested pipeline.
        name: String,
    },

    /// The pipeline has not finished. Indicates a dependency declaration bug.
    #[error("Outputs of pipeline '{name}' are not yet available")]
    NotYetAvailable {
        /// The requested pipeline.
        name: String,
    },

    /// The requesting pipeline does not depend on the requested one.
    #[error("Pipeline '{pipeline}' read outputs of '{requested}' which is not among its dependencies")]
    UndeclaredDependency {
        /// The requesting pipeline.
        pipeline: String,
        /// The requested pipeline.
        requested: String,
    },

    /// Isolated pipelines never expose their outputs.
    #[error("Pipeline '{name}' is isolated and its outputs are not visible")]
    IsolatedPipeline {
        /// The requested pipeline.
        name: String,
    },

    /// A link was requested for a document without a destination.
    #[error("Document from '{source_path}' has no destination")]
    NoDestination {
        /// The document source.
        source_path: String,
    },
}

/// A per-document write failure reported by a sink.
#[derive(Debug, Clone, Error)]
#[error("Failed to write '{}': {message}", path.display())]
pub struct WriteFailure {
    /// The destination path.
    pub path: PathBuf,
    /// The failure message.
    pub message: String,
}

impl WriteFailure {
    /// Creates a new write failure.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Error raised when a pipeline's output is published twice.
#[derive(Debug, Clone, Error)]
#[error("Output conflict for pipeline '{pipeline}': {message}")]
pub struct OutputConflictError {
    /// The pipeline name.
    pub pipeline: String,
    /// Additional message.
    pub message: String,
}

impl OutputConflictError {
    /// Creates a new output conflict error.
    #[must_use]
    pub fn new(pipeline: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_carries_code_and_context() {
        let err = PipelineValidationError::new("Pipeline 'Feed' depends on unknown 'Post'")
            .with_pipelines(vec!["Feed".to_string()])
            .with_error_info(
                ContractErrorInfo::new("CONFIG-002-UNKNOWN_DEP", "Unknown dependency")
                    .with_fix_hint("Register 'Post' or fix the name.")
                    .with_context_entry("dependency", "Post"),
            );

        assert_eq!(err.code(), Some("CONFIG-002-UNKNOWN_DEP"));
        let info = err.error_info.as_ref().unwrap();
        assert_eq!(info.context.get("dependency").map(String::as_str), Some("Post"));
        assert!(info.fix_hint.as_deref().unwrap().contains("Register"));
    }

    #[test]
    fn test_cycle_detected_error() {
        let err = CycleDetectedError::new(vec![
            "Posts".to_string(),
            "Tags".to_string(),
            "Posts".to_string(),
        ]);

        assert!(err.to_string().contains("Posts -> Tags -> Posts"));
        assert_eq!(err.error_info.code, "CONFIG-001-CYCLE");
        assert_eq!(err.cycle_path.len(), 3);
        assert_eq!(DocflowError::from(err).kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_error_kinds() {
        let not_found: DocflowError = MetadataError::not_found("Title").into();
        assert_eq!(not_found.kind(), ErrorKind::NotFound);

        let mismatch: DocflowError = MetadataError::mismatch("Tags", "string", "object").into();
        assert_eq!(mismatch.kind(), ErrorKind::TypeMismatch);

        assert_eq!(
            DocflowError::malformed("posts/a.md", "bad").kind(),
            ErrorKind::MalformedContent
        );
        assert_eq!(
            DocflowError::from(WriteFailure::new("a.html", "disk full")).kind(),
            ErrorKind::WriteFailure
        );
        assert_eq!(
            DocflowError::from(CycleDetectedError::new(vec!["a".into(), "a".into()])).kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_optional_keeps_mismatch() {
        let absent: Result<String, MetadataError> = Err(MetadataError::not_found("x"));
        assert_eq!(absent.optional(), Ok(None));

        let present: Result<String, MetadataError> = Ok("v".to_string());
        assert_eq!(present.optional(), Ok(Some("v".to_string())));

        let bad: Result<String, MetadataError> = Err(MetadataError::mismatch("x", "string", "documents"));
        assert!(bad.optional().is_err());
    }
}
