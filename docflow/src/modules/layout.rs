//! Reusable layout application.

use super::{
    Module, ModuleList, RenderTemplate, SetContent, SetMetadata, TemplateModelFn, TemplateRenderer,
};
use crate::context::ExecutionContext;
use crate::core::{keys, Document, MetadataAccess, MetadataValue};
use crate::errors::DocflowError;
use crate::pipeline::Pipeline;
use serde_json::{json, Value};
use std::sync::Arc;

/// Wraps document content in a layout template.
///
/// The layout template is a document published by a layout pipeline,
/// selected by its source file name. Other documents of that pipeline
/// flagged with `partial` are available as partials. A `Layout` is a module
/// list, so any number of pipelines can share it:
///
/// ```rust,ignore
/// let layout = Layout::new("Layout", "layout.hbs", renderer);
/// let posts = layout.apply_to(Pipeline::new("Posts").input(read_posts));
/// let pages = layout.apply_to(Pipeline::new("Pages").input(read_pages));
/// ```
#[derive(Clone)]
pub struct Layout {
    layout_pipeline: String,
    template_file: String,
    renderer: Arc<dyn TemplateRenderer>,
    model: TemplateModelFn,
}

impl Layout {
    /// Creates a layout that renders `template_file` from `layout_pipeline`.
    #[must_use]
    pub fn new(
        layout_pipeline: impl Into<String>,
        template_file: impl Into<String>,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        Self {
            layout_pipeline: layout_pipeline.into(),
            template_file: template_file.into(),
            renderer,
            model: Arc::new(layout_model),
        }
    }

    /// Replaces the layout model.
    #[must_use]
    pub fn with_model(mut self, model: TemplateModelFn) -> Self {
        self.model = model;
        self
    }

    /// Returns the name of the layout pipeline.
    #[must_use]
    pub fn layout_pipeline(&self) -> &str {
        &self.layout_pipeline
    }

    /// Builds the PostProcess module list.
    #[must_use]
    pub fn modules(&self) -> ModuleList {
        let pipeline = self.layout_pipeline.clone();
        let file = self.template_file.clone();
        let set_template = SetMetadata::from_context(keys::TEMPLATE, move |ctx| {
            find_template(ctx, &pipeline, &file)
        });
        let render = RenderTemplate::from_key(Arc::clone(&self.renderer), keys::TEMPLATE)
            .with_partials_from(self.layout_pipeline.clone())
            .with_model(Arc::clone(&self.model));
        vec![
            Arc::new(set_template) as Arc<dyn Module>,
            Arc::new(render),
            Arc::new(SetContent::from_key(keys::TEMPLATE)),
        ]
    }

    /// Adds the dependency on the layout pipeline and appends the layout
    /// modules to the PostProcess phase of `pipeline`.
    #[must_use]
    pub fn apply_to(&self, pipeline: Pipeline) -> Pipeline {
        pipeline
            .with_dependency(self.layout_pipeline.clone())
            .post_process_modules(self.modules())
    }
}

impl std::fmt::Debug for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layout")
            .field("layout_pipeline", &self.layout_pipeline)
            .field("template_file", &self.template_file)
            .field("renderer", &self.renderer)
            .finish_non_exhaustive()
    }
}

fn find_template(
    ctx: &ExecutionContext,
    pipeline: &str,
    file: &str,
) -> Result<MetadataValue, DocflowError> {
    let template = ctx
        .outputs_of(pipeline)?
        .into_iter()
        .find(|doc| {
            doc.get(keys::SOURCE_FILE_NAME)
                .and_then(MetadataValue::to_text)
                .is_some_and(|name| name == file)
        })
        .ok_or_else(|| {
            DocflowError::module(
                "Layout",
                format!("template '{file}' not found in pipeline '{pipeline}'"),
            )
        })?;
    Ok(MetadataValue::String(template.content_string()?))
}

/// `{title, body, link, year}`: the document title, its rendered content,
/// its link and the `Copyright` setting.
fn layout_model(
    doc: &Document,
    _all: &[Document],
    ctx: &ExecutionContext,
) -> Result<Value, DocflowError> {
    let scope = ctx.scope(doc);
    let text = |key: &str| scope.lookup(key).and_then(MetadataValue::to_text);
    Ok(json!({
        "title": text(keys::TITLE),
        "body": doc.content_string()?,
        "link": ctx.link_for(doc).ok(),
        "year": text(keys::COPYRIGHT),
    }))
}
