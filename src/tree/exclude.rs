// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Exclude pattern matching.
//!
//! Some content inside a category must never be synced, e.g., a plugin
//! marketplace directory that embeds its own Git repositories. Exclude
//! patterns use gitignore syntax, and are always matched against paths
//! relative to a tree root. This way the same pattern set applies to both the
//! repository side and the destination side of a category.

use crate::tree::{Result, TreeError};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// Set of gitignore-style patterns never touched by sync.
#[derive(Debug, Clone)]
pub struct Excludes {
    patterns: Vec<String>,
    matcher: Gitignore,
}

impl Excludes {
    /// Construct new exclude set from listing of patterns.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::Exclude`] if a pattern is not valid gitignore
    ///   syntax.
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Result<Self> {
        // INVARIANT: Root is irrelevant, because only relative paths are matched.
        let mut builder = GitignoreBuilder::new("");
        let mut listing = Vec::new();
        for pattern in patterns.into_iter().map(Into::into) {
            builder
                .add_line(None, &pattern)
                .map_err(|err| TreeError::Exclude {
                    source: err,
                    pattern: pattern.clone(),
                })?;
            listing.push(pattern);
        }

        let matcher = builder.build().map_err(|err| TreeError::Exclude {
            source: err,
            pattern: listing.join(", "),
        })?;

        Ok(Self {
            patterns: listing,
            matcher,
        })
    }

    /// Construct empty exclude set that matches nothing.
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
            matcher: Gitignore::empty(),
        }
    }

    /// Check if relative path, or any of its parents, is excluded.
    pub fn is_excluded(&self, relative: impl AsRef<Path>, is_dir: bool) -> bool {
        let relative = relative.as_ref();
        if self.patterns.is_empty() || relative.as_os_str().is_empty() {
            return false;
        }

        self.matcher
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }

    /// Listing of patterns in insertion order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Extend exclude set with additional patterns.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::Exclude`] if a pattern is not valid gitignore
    ///   syntax.
    pub fn extend(&self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Result<Self> {
        Self::new(
            self.patterns
                .iter()
                .cloned()
                .chain(patterns.into_iter().map(Into::into)),
        )
    }
}

impl Default for Excludes {
    fn default() -> Self {
        Self::none()
    }
}

impl PartialEq for Excludes {
    fn eq(&self, other: &Self) -> bool {
        self.patterns == other.patterns
    }
}

impl Eq for Excludes {}
