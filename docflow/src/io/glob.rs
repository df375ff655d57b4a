//! Glob patterns compiled to anchored regular expressions.
//!
//! Supported syntax: `*` (any run within one segment), `**` (any number of
//! segments), `?` (one character within a segment), `{a,b}` (alternatives,
//! which may themselves contain globs) and a leading `!` to exclude.
//! A brace alternative starting with `!` turns its expansion into an
//! exclusion: `{!_,}*.hbs` includes `*.hbs` and excludes `_*.hbs`.

use crate::errors::DocflowError;
use regex::Regex;

/// Compiled include and exclude patterns.
#[derive(Debug, Clone)]
pub struct GlobSet {
    includes: Vec<Regex>,
    excludes: Vec<Regex>,
}

impl GlobSet {
    /// Compiles patterns. A set with only exclusions includes everything
    /// that is not excluded.
    ///
    /// # Errors
    ///
    /// Returns a module failure for unbalanced braces.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, DocflowError> {
        let mut includes = Vec::new();
        let mut excludes = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            let (negated, body) = match pattern.strip_prefix('!') {
                Some(body) => (true, body),
                None => (false, pattern),
            };
            for (excluded, expanded) in expand_negations(body, negated) {
                if excluded {
                    excludes.push(compile(&expanded)?);
                } else {
                    includes.push(compile(&expanded)?);
                }
            }
        }
        Ok(Self { includes, excludes })
    }

    /// Tests a `/`-separated relative path.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        let included =
            self.includes.is_empty() || self.includes.iter().any(|re| re.is_match(path));
        included && !self.excludes.iter().any(|re| re.is_match(path))
    }
}

/// Expands top-level brace groups holding a `!` alternative into separate
/// patterns, each flagged as excluded or not. Other groups are left for
/// [`translate`].
fn expand_negations(pattern: &str, negated: bool) -> Vec<(bool, String)> {
    let mut depth = 0usize;
    let mut open = None;
    for (idx, c) in pattern.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    open = Some(idx);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                let Some(start) = open.filter(|_| depth == 0) else {
                    continue;
                };
                let alternatives = split_alternatives(&pattern[start + 1..idx]);
                if !alternatives.iter().any(|alt| alt.starts_with('!')) {
                    continue;
                }
                let (prefix, suffix) = (&pattern[..start], &pattern[idx + 1..]);
                return alternatives
                    .into_iter()
                    .flat_map(|alt| {
                        let (excluded, alt) = match alt.strip_prefix('!') {
                            Some(alt) => (true, alt),
                            None => (false, alt),
                        };
                        expand_negations(&format!("{prefix}{alt}{suffix}"), negated || excluded)
                    })
                    .collect();
            }
            _ => {}
        }
    }
    vec![(negated, pattern.to_string())]
}

fn compile(pattern: &str) -> Result<Regex, DocflowError> {
    let pattern = pattern.trim_start_matches("./").trim_start_matches('/');
    let mut regex = String::from("^");
    translate(pattern, &mut regex, pattern)?;
    regex.push('$');
    Regex::new(&regex).map_err(|e| invalid(pattern, &e.to_string()))
}

fn invalid(pattern: &str, message: &str) -> DocflowError {
    DocflowError::module("GlobSet", format!("invalid pattern '{pattern}': {message}"))
}

fn translate(pattern: &str, out: &mut String, original: &str) -> Result<(), DocflowError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            '{' => {
                let close = matching_brace(&chars, i).ok_or_else(|| invalid(original, "unclosed '{'"))?;
                let inner: String = chars[i + 1..close].iter().collect();
                out.push_str("(?:");
                for (n, alternative) in split_alternatives(&inner).into_iter().enumerate() {
                    if n > 0 {
                        out.push('|');
                    }
                    translate(alternative, out, original)?;
                }
                out.push(')');
                i = close + 1;
            }
            '}' => return Err(invalid(original, "unmatched '}'")),
            c => {
                out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
                i += 1;
            }
        }
    }
    Ok(())
}

fn matching_brace(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, c) in chars[open..].iter().enumerate() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on commas that are not nested in inner braces.
fn split_alternatives(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, c) in inner.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&inner[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}
