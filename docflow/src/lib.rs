//! # Docflow
//!
//! A document pipeline engine for static site generation.
//!
//! Docflow turns source files into output artifacts through named
//! pipelines:
//!
//! - **Documents**: immutable values carrying content, metadata and children
//! - **Pipelines**: four ordered phases of modules (Input, Process,
//!   PostProcess, Output) with declared dependencies
//! - **Scheduling**: pipelines run concurrently as soon as their
//!   dependencies are done, bounded by a worker pool
//! - **Modules**: grouping, pagination, ordering, merging, templating,
//!   feeds and file I/O
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docflow::prelude::*;
//!
//! let source = Arc::new(FsSourceReader::new("input"));
//! let sink = Arc::new(FsSink::new("output"));
//!
//! let engine = EngineBuilder::new()
//!     .add_pipeline(
//!         Pipeline::new("Posts")
//!             .input(ReadFiles::new(source.clone(), ["posts/*.md"]))
//!             .process(ExtractFrontMatter::default())
//!             .process(RenderMarkdown::default())
//!             .process(SetDestination::extension("html"))
//!             .output(WriteFiles::new(sink.clone())),
//!     )?
//!     .add_pipeline(
//!         Pipeline::new("Feed")
//!             .with_dependency("Posts")
//!             .process(ConcatDocuments::dependencies())
//!             .process(GenerateFeeds::new(Arc::new(JsonFeedSerializer::new())))
//!             .output(WriteFiles::new(sink)),
//!     )?
//!     .build()?;
//!
//! let report = engine.run().await;
//! std::process::exit(report.exit_code());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod io;
pub mod modules;
pub mod observability;
pub mod pipeline;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{EngineConfig, FailureMode, LinkSettings, Settings};
    pub use crate::context::{ExecutionContext, OutputSnapshot};
    pub use crate::core::{
        keys, Content, Document, Metadata, MetadataAccess, MetadataValue, Phase, PipelineStatus,
    };
    pub use crate::errors::{
        ContextError, CycleDetectedError, DocflowError, MetadataError, PipelineValidationError,
        WriteFailure,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::io::{FsSink, FsSourceReader, Sink, SourceReader};
    pub use crate::modules::{
        AddTitle, ConcatDocuments, ExtractFrontMatter, FilterDocuments, GenerateExcerpt,
        GenerateFeeds, GroupDocuments, JsonFeedSerializer, JsonFrontMatter, Layout,
        MergeDocuments, Module, ModuleList, OptimizeFileName, OrderDocuments, PaginateDocuments,
        ReadFiles, RenderMarkdown, RenderTemplate, ReplaceDocuments, SetContent, SetDestination,
        SetMetadata, TakeDocuments, TemplateRenderer, WriteFiles,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{Engine, EngineBuilder, Pipeline, PipelineOutcome, RunReport};
}
