// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tree copy policies.
//!
//! Three ways of moving a tree onto another path:
//!
//! 1. __Copy__: plain recursive copy onto a path that does not exist yet.
//! 2. __Mirror__: destructive copy. The target ends up holding exactly what
//!    the source holds. Every file is overwritten, and every entry absent
//!    from the source is deleted.
//! 3. __Ignore-existing merge__: files already present at the target are left
//!    untouched, missing files are created, and entries absent from the
//!    source are deleted.
//!
//! Excluded entries are invisible to all three policies. They are never
//! copied, overwritten, or deleted.

use crate::tree::{path_exists, resolve, snapshot, EntryKind, Excludes, Result, TreeError};

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Tally of what a copy policy did to its target.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopySummary {
    /// Files written to the target.
    pub copied: usize,

    /// Files left untouched, because they already existed at the target.
    pub preserved: usize,

    /// Topmost entries deleted from the target.
    pub removed: usize,
}

/// Copy tree onto path that does not exist yet.
///
/// Parent directories of the target are created as needed.
///
/// # Errors
///
/// - Return [`TreeError`] variant describing the first filesystem operation
///   that failed. A failure can leave a partially copied target behind.
#[instrument(skip(from, to, excludes), level = "debug")]
pub fn copy_tree(
    from: impl AsRef<Path>,
    to: impl AsRef<Path>,
    excludes: &Excludes,
) -> Result<CopySummary> {
    let (from, to) = (from.as_ref(), to.as_ref());
    debug!("copy {:?} to {:?}", from.display(), to.display());
    let source = snapshot(from, excludes)?;
    create_parent(to)?;

    let mut summary = CopySummary::default();
    for (relative, kind) in &source {
        let target = resolve(to, relative);
        match kind {
            EntryKind::Directory => create_dir(&target)?,
            EntryKind::File => {
                copy_file(&resolve(from, relative), &target)?;
                summary.copied += 1;
            }
        }
    }

    Ok(summary)
}

/// Make target an exact mirror of source.
///
/// # Errors
///
/// - Return [`TreeError`] variant describing the first filesystem operation
///   that failed. A failure can leave a partially mirrored target behind.
#[instrument(skip(from, to, excludes), level = "debug")]
pub fn mirror(from: impl AsRef<Path>, to: impl AsRef<Path>, excludes: &Excludes) -> Result<CopySummary> {
    let (from, to) = (from.as_ref(), to.as_ref());
    debug!("mirror {:?} to {:?}", from.display(), to.display());
    let source = snapshot(from, excludes)?;
    create_parent(to)?;

    let mut summary = CopySummary::default();
    for (relative, kind) in &source {
        let target = resolve(to, relative);
        clear_kind_mismatch(&target, *kind)?;
        match kind {
            EntryKind::Directory => create_dir(&target)?,
            EntryKind::File => {
                copy_file(&resolve(from, relative), &target)?;
                summary.copied += 1;
            }
        }
    }

    summary.removed = remove_extraneous(&source, to, excludes)?;

    Ok(summary)
}

/// Merge source into target without overwriting existing files.
///
/// # Errors
///
/// - Return [`TreeError`] variant describing the first filesystem operation
///   that failed. A failure can leave a partially merged target behind.
#[instrument(skip(from, to, excludes), level = "debug")]
pub fn merge_ignore_existing(
    from: impl AsRef<Path>,
    to: impl AsRef<Path>,
    excludes: &Excludes,
) -> Result<CopySummary> {
    let (from, to) = (from.as_ref(), to.as_ref());
    debug!("merge {:?} into {:?}", from.display(), to.display());
    let source = snapshot(from, excludes)?;
    create_parent(to)?;

    let mut summary = CopySummary::default();
    let mut shadowed: Option<&PathBuf> = None;
    for (relative, kind) in &source {
        if let Some(root) = shadowed {
            if relative.starts_with(root) {
                continue;
            }
        }

        let target = resolve(to, relative);
        match kind {
            EntryKind::Directory => {
                // INVARIANT: Never replace a local file to make room for a directory.
                if path_exists(&target) && !target.is_dir() {
                    debug!("keep local file {:?} in place of directory", target.display());
                    summary.preserved += 1;
                    shadowed = Some(relative);
                    continue;
                }
                create_dir(&target)?;
            }
            EntryKind::File => {
                if path_exists(&target) {
                    summary.preserved += 1;
                    continue;
                }
                copy_file(&resolve(from, relative), &target)?;
                summary.copied += 1;
            }
        }
    }

    summary.removed = remove_extraneous(&source, to, excludes)?;

    Ok(summary)
}

/// Delete topmost entries of target that have no counterpart in source.
fn remove_extraneous(
    source: &BTreeMap<PathBuf, EntryKind>,
    to: &Path,
    excludes: &Excludes,
) -> Result<usize> {
    // INVARIANT: Only a directory source can prune a directory target.
    let source_is_dir = matches!(source.get(Path::new("")), Some(EntryKind::Directory));
    if !source_is_dir || !to.is_dir() {
        return Ok(0);
    }

    let target = snapshot(to, excludes)?;
    let mut removed = 0;
    let mut collapsed: Option<&PathBuf> = None;
    for relative in target.keys() {
        if let Some(root) = collapsed {
            if relative.starts_with(root) {
                continue;
            }
        }

        if !source.contains_key(relative) {
            remove(&resolve(to, relative))?;
            collapsed = Some(relative);
            removed += 1;
        }
    }

    Ok(removed)
}

fn clear_kind_mismatch(target: &Path, kind: EntryKind) -> Result<()> {
    let mismatch = match kind {
        EntryKind::Directory => path_exists(target) && !target.is_dir(),
        EntryKind::File => target.is_dir(),
    };

    if mismatch {
        remove(target)?;
    }

    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            mkdirp::mkdirp(parent).map_err(|err| TreeError::CreateDir {
                source: err,
                path: parent.to_path_buf(),
            })?;
            Ok(())
        }
        _ => Ok(()),
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|err| TreeError::CreateDir {
        source: err,
        path: path.to_path_buf(),
    })
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to).map_err(|err| TreeError::Copy {
        source: err,
        from: from.to_path_buf(),
        to: to.to_path_buf(),
    })?;

    Ok(())
}

fn remove(path: &Path) -> Result<()> {
    debug!("remove {:?}", path.display());
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|err| TreeError::Remove {
        source: err,
        path: path.to_path_buf(),
    })
}
