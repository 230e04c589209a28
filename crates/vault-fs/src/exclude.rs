//! Exclude-pattern handling for mirroring
//!
//! Patterns are supplied per backup path in configuration. Before use they
//! are sanitized: shell-significant characters are stripped so a pattern can
//! never smuggle anything into a command line, even though the mirror itself
//! never shells out.
//!
//! Matching rules:
//! - a pattern without `/` is matched against every component of the path
//!   relative to the source root (`*.pid` excludes `run/mysqld.pid`);
//! - a pattern with `/` is matched against the whole relative path
//!   (`conf.d/*.bak`).

use std::path::{Component, Path};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::{Error, Result};

/// Characters removed from exclude patterns before compilation.
const SHELL_SIGNIFICANT: &[char] = &[
    ';', '|', '&', '$', '`', '<', '>', '(', ')', '{', '}', '!', '\'', '"', '\\', '\n', '\r',
    '\t', ' ',
];

/// Strip shell-significant characters from an exclude pattern.
pub fn sanitize_pattern(pattern: &str) -> String {
    pattern
        .chars()
        .filter(|c| !SHELL_SIGNIFICANT.contains(c))
        .collect::<String>()
        .trim_matches('/')
        .to_string()
}

/// Compiled set of exclude patterns.
#[derive(Debug, Clone)]
pub struct ExcludeSet {
    patterns: Vec<String>,
    components: GlobSet,
    paths: GlobSet,
}

impl Default for ExcludeSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl ExcludeSet {
    /// An exclude set that matches nothing.
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            components: GlobSet::empty(),
            paths: GlobSet::empty(),
        }
    }

    /// Sanitize and compile `patterns`.
    ///
    /// Patterns that are empty after sanitization are dropped with a warning.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut components = GlobSetBuilder::new();
        let mut paths = GlobSetBuilder::new();
        let mut kept = Vec::new();

        for raw in patterns {
            let raw = raw.as_ref();
            let pattern = sanitize_pattern(raw);
            if pattern.is_empty() {
                tracing::warn!(pattern = %raw, "Dropping exclude pattern that is empty after sanitization");
                continue;
            }
            if pattern != raw {
                tracing::debug!(original = %raw, sanitized = %pattern, "Sanitized exclude pattern");
            }

            let glob = GlobBuilder::new(&pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| Error::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;

            if pattern.contains('/') {
                paths.add(glob);
            } else {
                components.add(glob);
            }
            kept.push(pattern);
        }

        let build = |builder: GlobSetBuilder| {
            builder.build().map_err(|e| Error::InvalidPattern {
                pattern: kept.join(", "),
                message: e.to_string(),
            })
        };

        Ok(Self {
            components: build(components)?,
            paths: build(paths)?,
            patterns: kept,
        })
    }

    /// The sanitized patterns this set was compiled from.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Check whether a path relative to the source root is excluded.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        // A path pattern naming a directory covers everything beneath it
        if relative
            .ancestors()
            .filter(|prefix| !prefix.as_os_str().is_empty())
            .any(|prefix| self.paths.is_match(prefix))
        {
            return true;
        }

        relative.components().any(|component| match component {
            Component::Normal(name) => self.components.is_match(Path::new(name)),
            _ => false,
        })
    }
}
