//! Engine and link formatting options.

use crate::errors::DocflowError;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

/// What happens to the rest of the run when a pipeline fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Independent pipelines keep running; dependents are skipped.
    #[default]
    ContinueOnFailure,
    /// The first failure cancels the run.
    FailFast,
}

/// Options controlling scheduling and error policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of pipelines running at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Run-level failure policy.
    #[serde(default)]
    pub failure_mode: FailureMode,
    /// Drop documents with malformed content (with a warning) instead of
    /// failing their pipeline.
    #[serde(default)]
    pub skip_malformed_content: bool,
    /// Fail the pipeline on the first write failure.
    #[serde(default)]
    pub fail_fast_writes: bool,
    /// Link formatting.
    #[serde(default)]
    pub links: LinkSettings,
}

fn default_max_concurrency() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            failure_mode: FailureMode::default(),
            skip_malformed_content: false,
            fail_fast_writes: false,
            links: LinkSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency bound.
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Sets the failure mode.
    #[must_use]
    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Skips malformed documents instead of failing.
    #[must_use]
    pub fn with_skip_malformed_content(mut self, skip: bool) -> Self {
        self.skip_malformed_content = skip;
        self
    }

    /// Fails pipelines on the first write failure.
    #[must_use]
    pub fn with_fail_fast_writes(mut self, fail_fast: bool) -> Self {
        self.fail_fast_writes = fail_fast;
        self
    }

    /// Sets link formatting.
    #[must_use]
    pub fn with_links(mut self, links: LinkSettings) -> Self {
        self.links = links;
        self
    }

    /// Checks option values.
    ///
    /// # Errors
    ///
    /// Returns `DocflowError::Settings` for a concurrency bound of zero or
    /// above what the worker pool can hold.
    pub fn validate(&self) -> Result<(), DocflowError> {
        if self.max_concurrency == 0 {
            return Err(DocflowError::Settings(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_concurrency > Semaphore::MAX_PERMITS {
            return Err(DocflowError::Settings(format!(
                "max_concurrency must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(())
    }
}

/// Flags applied uniformly when turning destinations into links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSettings {
    /// Lowercase the whole link.
    #[serde(default)]
    pub lowercase: bool,
    /// Drop a trailing `index.html`/`index.htm` file name.
    #[serde(default)]
    pub hide_index_pages: bool,
    /// Drop `.html`/`.htm` extensions.
    #[serde(default)]
    pub hide_extensions: bool,
    /// Produce `scheme://host/...` links instead of root-relative ones.
    #[serde(default)]
    pub absolute: bool,
    /// Scheme for absolute links.
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Host for absolute links.
    #[serde(default)]
    pub host: Option<String>,
    /// Path prefix every link lives under (e.g. `/blog`).
    #[serde(default)]
    pub root: Option<String>,
}

fn default_scheme() -> String {
    "https".to_string()
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            lowercase: false,
            hide_index_pages: false,
            hide_extensions: false,
            absolute: false,
            scheme: default_scheme(),
            host: None,
            root: None,
        }
    }
}

impl LinkSettings {
    /// Creates link settings with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowercases links.
    #[must_use]
    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    /// Hides `index.html` file names.
    #[must_use]
    pub fn hide_index_pages(mut self) -> Self {
        self.hide_index_pages = true;
        self
    }

    /// Hides `.html` extensions.
    #[must_use]
    pub fn hide_extensions(mut self) -> Self {
        self.hide_extensions = true;
        self
    }

    /// Produces absolute links for `host`.
    #[must_use]
    pub fn absolute(mut self, scheme: impl Into<String>, host: impl Into<String>) -> Self {
        self.absolute = true;
        self.scheme = scheme.into();
        self.host = Some(host.into());
        self
    }

    /// Sets the link root.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }
}
