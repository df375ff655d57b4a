//! Template rendering through a pluggable renderer.

use super::Module;
use crate::context::ExecutionContext;
use crate::core::{keys, Document, MetadataValue};
use crate::errors::DocflowError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::sync::Arc;
use tracing::debug;

/// Named partial templates available to a render call.
pub type Partials = BTreeMap<String, String>;

/// Builds the template model for one document. Receives the whole input
/// stream so aggregate pages can reach their siblings.
pub type TemplateModelFn = Arc<
    dyn Fn(&Document, &[Document], &ExecutionContext) -> Result<Value, DocflowError> + Send + Sync,
>;

/// Renders a template source against a model.
///
/// Implementations may block; the engine runs them on its worker tasks.
pub trait TemplateRenderer: Send + Sync + Debug {
    /// Renders `template` with `model`, resolving includes from `partials`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be parsed or rendered.
    fn render(&self, template: &str, model: &Value, partials: &Partials)
        -> Result<String, DocflowError>;
}

#[derive(Debug, Clone)]
enum TemplateSource {
    Content,
    Key(String),
}

/// Renders each document's template and stores the result.
///
/// By default the template is the document content and the output replaces
/// it. [`from_key`](Self::from_key) reads the template from a metadata key
/// and writes the rendered text back to the same key.
#[derive(Clone)]
pub struct RenderTemplate {
    renderer: Arc<dyn TemplateRenderer>,
    source: TemplateSource,
    partials_from: Option<String>,
    model: Option<TemplateModelFn>,
}

impl RenderTemplate {
    /// Renders document content.
    #[must_use]
    pub fn new(renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self {
            renderer,
            source: TemplateSource::Content,
            partials_from: None,
            model: None,
        }
    }

    /// Renders the template stored under `key`.
    #[must_use]
    pub fn from_key(renderer: Arc<dyn TemplateRenderer>, key: impl Into<String>) -> Self {
        Self {
            source: TemplateSource::Key(key.into()),
            ..Self::new(renderer)
        }
    }

    /// Registers partials from the documents of `pipeline` that carry the
    /// `partial` key. Collected once per execution.
    #[must_use]
    pub fn with_partials_from(mut self, pipeline: impl Into<String>) -> Self {
        self.partials_from = Some(pipeline.into());
        self
    }

    /// Replaces the default model.
    #[must_use]
    pub fn with_model(mut self, model: TemplateModelFn) -> Self {
        self.model = Some(model);
        self
    }

    fn collect_partials(&self, ctx: &ExecutionContext) -> Result<Partials, DocflowError> {
        let Some(pipeline) = &self.partials_from else {
            return Ok(Partials::new());
        };
        let mut partials = Partials::new();
        for doc in ctx.outputs_of(pipeline)? {
            let name = match doc.get(keys::PARTIAL) {
                None => continue,
                Some(MetadataValue::Bool(false)) => continue,
                Some(MetadataValue::Bool(true)) => partial_name_from_file(&doc),
                Some(value) => value.to_text(),
            };
            if let Some(name) = name {
                partials.insert(name, doc.content_string()?);
            }
        }
        debug!(
            pipeline = %ctx.pipeline_name(),
            from = %pipeline,
            count = partials.len(),
            "Registered partials"
        );
        Ok(partials)
    }
}

fn partial_name_from_file(doc: &Document) -> Option<String> {
    doc.get(keys::SOURCE_FILE_BASE)
        .and_then(MetadataValue::to_text)
        .map(|base| base.trim_start_matches('_').to_string())
}

/// The model used when none is configured: every metadata value, plus
/// `content` and, when the document has a destination, `link`.
fn default_model(doc: &Document, ctx: &ExecutionContext) -> Result<Value, DocflowError> {
    let mut model = match doc.metadata().to_json() {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    model.insert("content".to_string(), Value::String(doc.content_string()?));
    if let Ok(link) = ctx.link_for(doc) {
        model.insert("link".to_string(), Value::String(link));
    }
    Ok(Value::Object(model))
}

impl Debug for RenderTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTemplate")
            .field("renderer", &self.renderer)
            .field("source", &self.source)
            .field("partials_from", &self.partials_from)
            .field("custom_model", &self.model.is_some())
            .finish()
    }
}

#[async_trait]
impl Module for RenderTemplate {
    fn name(&self) -> &str {
        "RenderTemplate"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        if inputs.is_empty() {
            return Ok(inputs);
        }
        let partials = self.collect_partials(ctx)?;

        let mut outputs = Vec::with_capacity(inputs.len());
        for doc in &inputs {
            let template = match &self.source {
                TemplateSource::Content => doc.content_string()?,
                TemplateSource::Key(key) => match doc.get(key).and_then(MetadataValue::to_text) {
                    Some(template) => template,
                    None => {
                        outputs.push(doc.clone());
                        continue;
                    }
                },
            };
            let model = match &self.model {
                Some(model) => model(doc, &inputs, ctx)?,
                None => default_model(doc, ctx)?,
            };
            let rendered = self.renderer.render(&template, &model, &partials)?;
            outputs.push(match &self.source {
                TemplateSource::Content => doc.clone().with_content(rendered),
                TemplateSource::Key(key) => doc.clone().with(key.clone(), rendered),
            });
        }
        Ok(outputs)
    }
}
