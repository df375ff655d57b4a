//! Immutable global configuration.
//!
//! A [`Settings`] value is built once before the run, wrapped in an `Arc` and
//! threaded through every [`ExecutionContext`](crate::context::ExecutionContext).

mod engine;

pub use engine::{EngineConfig, FailureMode, LinkSettings};

use crate::core::{Metadata, MetadataAccess, MetadataValue};
use crate::errors::DocflowError;
use serde::Deserialize;
use std::path::Path;

/// Engine configuration plus the global metadata layer.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    engine: EngineConfig,
    metadata: Metadata,
}

#[derive(Deserialize)]
struct RawSettings {
    #[serde(default)]
    engine: EngineConfig,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl Settings {
    /// Creates settings with default engine configuration and no metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the engine configuration.
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Sets one global metadata value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Replaces the global metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Parses settings from JSON of the shape
    /// `{"engine": {...}, "metadata": {...}}`. Both sections are optional.
    ///
    /// # Errors
    ///
    /// Returns `DocflowError::Settings` if the document is not valid.
    pub fn from_json_str(json: &str) -> Result<Self, DocflowError> {
        let raw: RawSettings =
            serde_json::from_str(json).map_err(|e| DocflowError::Settings(e.to_string()))?;
        let settings = Self {
            engine: raw.engine,
            metadata: Metadata::from_json_object(raw.metadata),
        };
        settings.engine.validate()?;
        Ok(settings)
    }

    /// Reads and parses a JSON settings file.
    ///
    /// # Errors
    ///
    /// Returns `DocflowError::Io` if the file cannot be read, or
    /// `DocflowError::Settings` if it cannot be parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DocflowError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    /// Returns the link formatting settings.
    #[must_use]
    pub fn links(&self) -> &LinkSettings {
        &self.engine.links
    }

    /// Returns the global metadata layer.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl MetadataAccess for Settings {
    fn lookup(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }
}
