//! Splitting a stream into fixed-size pages.

use super::Module;
use crate::context::ExecutionContext;
use crate::core::{keys, Document};
use crate::errors::DocflowError;
use async_trait::async_trait;

/// Produces one document per chunk of `page_size` inputs.
///
/// Each page holds its chunk as children, in input order, and carries
/// `Index` (1-based), `TotalPages`, `TotalItems`, `HasPreviousPage`,
/// `HasNextPage`, and the neighbouring page numbers under `Previous` and
/// `Next` when those pages exist. An empty stream produces no pages.
#[derive(Debug, Clone, Copy)]
pub struct PaginateDocuments {
    page_size: usize,
}

impl PaginateDocuments {
    /// Creates the module.
    ///
    /// # Errors
    ///
    /// Returns `ModuleFailure` for a page size of zero.
    pub fn new(page_size: usize) -> Result<Self, DocflowError> {
        if page_size == 0 {
            return Err(DocflowError::module(
                "PaginateDocuments",
                "page size must be at least 1",
            ));
        }
        Ok(Self { page_size })
    }

    /// Returns the page size.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

#[async_trait]
impl Module for PaginateDocuments {
    fn name(&self) -> &str {
        "PaginateDocuments"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        let total_items = inputs.len();
        let total_pages = total_items.div_ceil(self.page_size);

        Ok(inputs
            .chunks(self.page_size)
            .enumerate()
            .map(|(i, chunk)| {
                let index = i + 1;
                let mut page = Document::synthetic("page")
                    .with(keys::INDEX, index)
                    .with(keys::TOTAL_PAGES, total_pages)
                    .with(keys::TOTAL_ITEMS, total_items)
                    .with(keys::HAS_PREVIOUS_PAGE, index > 1)
                    .with(keys::HAS_NEXT_PAGE, index < total_pages)
                    .with_children(chunk.to_vec());
                if index > 1 {
                    page = page.with(keys::PREVIOUS, index - 1);
                }
                if index < total_pages {
                    page = page.with(keys::NEXT, index + 1);
                }
                page
            })
            .collect())
    }
}
