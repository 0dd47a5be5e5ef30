// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Filesystem tree primitives.
//!
//! Both the deployer and the synchronizer treat a category as a __tree__: a
//! root path that is either a directory (walked recursively), or a single
//! regular file. Every tree operation works on the relative entry names found
//! under a root, so the same logic serves both directory and single-file
//! categories.
//!
//! # Snapshots
//!
//! A __snapshot__ is the sorted set of relative entries under a root, minus
//! anything matched by a set of [`Excludes`]. The root itself is recorded as
//! the empty relative path. Because [`Path`] ordering is component-wise, a
//! parent directory always sorts before its descendants, which is what the
//! copy routines rely on to create directories before the files inside them.
//!
//! Symbolic links are followed, and permission bits are ignored. Equality is
//! about content only. A link back to its own ancestor is skipped.

pub mod compare;
pub mod copy;
pub mod exclude;

pub use compare::{diff, identical, identical_excluding, unified_patch, TreeDiff};
pub use copy::{copy_tree, merge_ignore_existing, mirror, CopySummary};
pub use exclude::Excludes;

use ignore::WalkBuilder;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

/// Kind of entry recorded in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// Check if something exists at path without following symbolic links.
///
/// A dangling symbolic link still counts as existing, because it still
/// occupies the path and must be moved or removed before writing there.
pub fn path_exists(path: impl AsRef<Path>) -> bool {
    fs::symlink_metadata(path.as_ref()).is_ok()
}

/// Resolve relative snapshot entry against a root.
///
/// The empty relative path names the root itself. Joining it would append a
/// trailing separator, which breaks single-file roots.
pub(crate) fn resolve(root: &Path, relative: &Path) -> PathBuf {
    if relative.as_os_str().is_empty() {
        root.to_path_buf()
    } else {
        root.join(relative)
    }
}

/// Take snapshot of all entries under root that are not excluded.
///
/// A symbolic link pointing back at one of its own ancestors is left out of
/// the snapshot with a warning, instead of being walked forever.
///
/// # Errors
///
/// - Return [`TreeError::Read`] if root cannot be read.
/// - Return [`TreeError::Walk`] if any entry beneath root cannot be read.
pub(crate) fn snapshot(root: &Path, excludes: &Excludes) -> Result<BTreeMap<PathBuf, EntryKind>> {
    let mut entries = BTreeMap::new();
    let metadata = fs::metadata(root).map_err(|err| TreeError::Read {
        source: err,
        path: root.to_path_buf(),
    })?;

    // INVARIANT: Single-file root is a snapshot of exactly one entry.
    if !metadata.is_dir() {
        entries.insert(PathBuf::new(), EntryKind::File);
        return Ok(entries);
    }

    entries.insert(PathBuf::new(), EntryKind::Directory);
    let (base, matcher) = (root.to_path_buf(), excludes.clone());
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(true)
        // INVARIANT: Excluded directories drop their entire subtree.
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|kind| kind.is_dir());
            entry
                .path()
                .strip_prefix(&base)
                .map(|relative| !matcher.is_excluded(relative, is_dir))
                .unwrap_or(true)
        })
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => match symlink_loop(&err) {
                Some(link) => {
                    warn!("skip {:?}, it links back to its own ancestor", link.display());
                    continue;
                }
                None => {
                    return Err(TreeError::Walk {
                        source: err,
                        path: root.to_path_buf(),
                    })
                }
            },
        };

        if entry.depth() == 0 {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        let kind = match entry.file_type() {
            Some(kind) if kind.is_dir() => EntryKind::Directory,
            _ => EntryKind::File,
        };
        entries.insert(relative, kind);
    }

    Ok(entries)
}

/// List topmost excluded entries under root.
///
/// Nested entries of an excluded directory are not listed again.
///
/// # Errors
///
/// - Return [`TreeError`] variant if root cannot be walked.
pub(crate) fn excluded_entries(root: &Path, excludes: &Excludes) -> Result<Vec<PathBuf>> {
    if excludes.patterns().is_empty() {
        return Ok(Vec::new());
    }

    let mut topmost: Vec<PathBuf> = Vec::new();
    for (relative, kind) in snapshot(root, &Excludes::none())? {
        if topmost.iter().any(|parent| relative.starts_with(parent)) {
            continue;
        }

        if excludes.is_excluded(&relative, kind == EntryKind::Directory) {
            topmost.push(relative);
        }
    }

    Ok(topmost)
}

fn symlink_loop(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        ignore::Error::WithPath { err, .. } | ignore::Error::WithDepth { err, .. } => {
            symlink_loop(err)
        }
        _ => None,
    }
}

/// Tree operation error types.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Entry cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Tree beneath root cannot be walked.
    #[error("failed to walk {:?}", path.display())]
    Walk {
        #[source]
        source: ignore::Error,
        path: PathBuf,
    },

    /// Directory cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be copied.
    #[error("failed to copy {:?} to {:?}", from.display(), to.display())]
    Copy {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    /// Entry cannot be removed.
    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Exclude pattern is invalid.
    #[error("invalid exclude pattern {pattern:?}")]
    Exclude {
        #[source]
        source: ignore::Error,
        pattern: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = TreeError> = std::result::Result<T, E>;
