//! Core domain model types for docflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Documents, their content and identity
//! - The ordered metadata store and its typed accessors
//! - Pipeline phase and status enums
//! - Reserved metadata keys

mod document;
pub mod keys;
mod metadata;
mod status;
pub mod time;
mod value;

pub use document::{Content, ContentProducer, Document, DocumentId, Source};
pub use metadata::{Metadata, MetadataAccess, MetadataScope};
pub use status::{Phase, PipelineStatus};
pub use value::{FromMetadata, MetadataValue};
