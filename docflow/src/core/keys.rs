//! Reserved metadata keys.

/// The value a group document was formed around.
pub const GROUP_KEY: &str = "GroupKey";

/// Document title.
pub const TITLE: &str = "Title";

/// Publication date.
pub const PUBLISHED: &str = "Published";

/// Short summary of the rendered content.
pub const EXCERPT: &str = "Excerpt";

/// One-based page number.
pub const INDEX: &str = "Index";

/// Total number of pages.
pub const TOTAL_PAGES: &str = "TotalPages";

/// Total number of paginated items.
pub const TOTAL_ITEMS: &str = "TotalItems";

/// Page number of the previous page; absent on the first page.
pub const PREVIOUS: &str = "Previous";

/// Page number of the next page; absent on the last page.
pub const NEXT: &str = "Next";

/// Whether a previous page exists.
pub const HAS_PREVIOUS_PAGE: &str = "HasPreviousPage";

/// Whether a next page exists.
pub const HAS_NEXT_PAGE: &str = "HasNextPage";

/// File name of the source, with extension.
pub const SOURCE_FILE_NAME: &str = "SourceFileName";

/// File name of the source, without extension.
pub const SOURCE_FILE_BASE: &str = "SourceFileBase";

/// Extension of the source file.
pub const SOURCE_EXTENSION: &str = "SourceExtension";

/// Source path relative to the input root, `/`-separated.
pub const RELATIVE_PATH: &str = "RelativePath";

/// Marks a template document as a partial, holding its registration name.
pub const PARTIAL: &str = "partial";

/// Template source used by layout rendering.
pub const TEMPLATE: &str = "template";

/// Feed and site author.
pub const AUTHOR: &str = "Author";

/// Feed and site description.
pub const DESCRIPTION: &str = "Description";

/// Copyright notice.
pub const COPYRIGHT: &str = "Copyright";
