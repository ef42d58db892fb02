//! `(listfile)` parsing and name enumeration
//!
//! Archives only store name hashes, so enumeration is driven by the names a
//! listfile records. Every candidate is checked against the archive (or
//! chain) before it is yielded.

use crate::hash::normalize_path;
use glob::{MatchOptions, Pattern};
use std::fmt;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Parse a `(listfile)` into individual file names
///
/// One name per line, in either line ending. Lines starting with `;` or `#`
/// are comments and anything after a `;` on a line is metadata.
pub fn parse_listfile(data: &[u8]) -> Vec<String> {
    let content = String::from_utf8_lossy(data);
    if let std::borrow::Cow::Owned(_) = content {
        log::warn!("(listfile) is not valid UTF-8; invalid bytes replaced");
    }

    let names: Vec<String> = content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                return None;
            }

            let name = line.split(';').next().unwrap_or(line).trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect();

    log::debug!("Parsed {} names from (listfile)", names.len());
    names
}

/// Sort names case-insensitively and drop duplicates, keeping the first spelling
pub(crate) fn sort_and_dedup(names: &mut Vec<String>) {
    names.sort_by_cached_key(|name| normalize_path(name).to_ascii_uppercase());
    names.dedup_by(|a, b| normalize_path(a).eq_ignore_ascii_case(&normalize_path(b)));
}

/// Something names can be checked against
pub(crate) trait NameLookup {
    /// Whether `name` currently resolves to content
    fn contains(&self, name: &str) -> bool;
}

/// Lazy iterator over listed names that match a mask and resolve
///
/// Names are produced in case-insensitive order. The iterator can be
/// restarted with [`FileNames::rewind`].
pub struct FileNames<'a> {
    lookup: &'a dyn NameLookup,
    names: Vec<String>,
    pattern: Pattern,
    pos: usize,
}

impl<'a> FileNames<'a> {
    pub(crate) fn new(lookup: &'a dyn NameLookup, mut names: Vec<String>, mask: &str) -> Self {
        sort_and_dedup(&mut names);
        let mask = normalize_path(mask);
        // A mask that is not a valid pattern matches itself literally
        let pattern = Pattern::new(&mask).unwrap_or_else(|_| {
            Pattern::new(&Pattern::escape(&mask)).unwrap_or_default()
        });

        Self {
            lookup,
            names,
            pattern,
            pos: 0,
        }
    }

    /// Start over from the first name
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Number of listed names, matching or not
    pub fn candidates(&self) -> usize {
        self.names.len()
    }

    fn matches(&self, name: &str) -> bool {
        self.pattern
            .matches_with(&normalize_path(name), MATCH_OPTIONS)
    }
}

impl Iterator for FileNames<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while let Some(name) = self.names.get(self.pos) {
            self.pos += 1;
            if self.matches(name) && self.lookup.contains(name) {
                return Some(name.clone());
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.names.len() - self.pos))
    }
}

impl Clone for FileNames<'_> {
    fn clone(&self) -> Self {
        Self {
            lookup: self.lookup,
            names: self.names.clone(),
            pattern: self.pattern.clone(),
            pos: self.pos,
        }
    }
}

impl fmt::Debug for FileNames<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileNames")
            .field("pattern", &self.pattern.as_str())
            .field("candidates", &self.names.len())
            .field("pos", &self.pos)
            .finish()
    }
}
