//! Destination-to-link formatting.

use crate::config::LinkSettings;
use std::path::Path;

const INDEX_PAGES: &[&str] = &["index.html", "index.htm"];
const PAGE_EXTENSIONS: &[&str] = &[".html", ".htm"];

/// Formats a destination path as a link.
///
/// The result depends only on `destination` and `settings`: separators are
/// normalized to `/`, index pages and extensions are hidden when configured,
/// the link root is prefixed, and the whole link is lowercased last.
#[must_use]
pub fn format_link(destination: &Path, settings: &LinkSettings) -> String {
    let mut path = destination.to_string_lossy().replace('\\', "/");
    path = path.trim_start_matches("./").trim_start_matches('/').to_string();

    if settings.hide_index_pages {
        if let Some(stripped) = strip_index_page(&path) {
            path = stripped;
        }
    }
    if settings.hide_extensions {
        if let Some(ext) = PAGE_EXTENSIONS
            .iter()
            .find(|ext| path.to_ascii_lowercase().ends_with(*ext))
        {
            path.truncate(path.len() - ext.len());
        }
    }

    let mut link = String::from("/");
    if let Some(root) = settings.root.as_deref().map(|r| r.trim_matches('/')) {
        if !root.is_empty() {
            link.push_str(root);
            if !path.is_empty() {
                link.push('/');
            }
        }
    }
    link.push_str(&path);

    if settings.absolute {
        if let Some(host) = settings.host.as_deref() {
            link = format!("{}://{}{}", settings.scheme, host.trim_end_matches('/'), link);
        }
    }

    if settings.lowercase {
        link = link.to_lowercase();
    }
    link
}

fn strip_index_page(path: &str) -> Option<String> {
    let (dir, file) = path.rsplit_once('/').unwrap_or(("", path));
    if !INDEX_PAGES.iter().any(|index| file.eq_ignore_ascii_case(index)) {
        return None;
    }
    Some(if dir.is_empty() {
        String::new()
    } else {
        format!("{dir}/")
    })
}
