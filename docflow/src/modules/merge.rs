//! Folding the result of a nested module list back into the stream.

use super::{run_modules, Module, ModuleList};
use crate::context::ExecutionContext;
use crate::core::Document;
use crate::errors::DocflowError;
use async_trait::async_trait;
use std::sync::Arc;

/// Runs child modules on the current stream, then merges every result
/// document with every input document.
///
/// Children always run in the listed order, each seeing the previous one's
/// output. In the default direction each input is the base and a result is
/// layered over it, one output per input and result pair, inputs outermost.
/// [`reverse`](Self::reverse) swaps the roles: each result is the base and
/// the inputs are layered over it, results outermost. The layered document
/// wins on metadata, and on content and children when it has any; identity
/// and destination come from the base.
///
/// The reversed form is how a scaffold document is stamped onto generated
/// groups: replace the stream with posts, group them by tag, then merge the
/// scaffold's metadata and content onto each group.
#[derive(Debug, Clone, Default)]
pub struct MergeDocuments {
    modules: ModuleList,
    reverse: bool,
}

impl MergeDocuments {
    /// Creates the module with its child modules.
    #[must_use]
    pub fn new(modules: ModuleList) -> Self {
        Self {
            modules,
            reverse: false,
        }
    }

    /// Appends a child module.
    #[must_use]
    pub fn with_module(mut self, module: impl Module + 'static) -> Self {
        self.modules.push(Arc::new(module));
        self
    }

    /// Makes results the base and inputs the overlay.
    #[must_use]
    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }
}

#[async_trait]
impl Module for MergeDocuments {
    fn name(&self) -> &str {
        "MergeDocuments"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        let results = run_modules(&self.modules, inputs.clone(), ctx).await?;

        let merged = if self.reverse {
            results
                .iter()
                .flat_map(|result| inputs.iter().map(move |input| Document::merged(result, input)))
                .collect()
        } else {
            inputs
                .iter()
                .flat_map(|input| results.iter().map(move |result| Document::merged(input, result)))
                .collect()
        };
        Ok(merged)
    }
}
