// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository working tree status.
//!
//! After syncing into the repository, the user usually wants to know what is
//! left to commit. This is a thin query over the repository's own Git
//! working tree through libgit2.

use git2::{Repository, Status, StatusOptions};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Kind of uncommitted change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    New,
    Modified,
    Deleted,
    Renamed,
    TypeChange,
    Conflicted,
}

impl From<Status> for FileChange {
    fn from(status: Status) -> Self {
        if status.is_conflicted() {
            Self::Conflicted
        } else if status.is_index_new() || status.is_wt_new() {
            Self::New
        } else if status.is_index_deleted() || status.is_wt_deleted() {
            Self::Deleted
        } else if status.is_index_renamed() || status.is_wt_renamed() {
            Self::Renamed
        } else if status.is_index_typechange() || status.is_wt_typechange() {
            Self::TypeChange
        } else {
            Self::Modified
        }
    }
}

impl Display for FileChange {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::New => fmt.write_str("new"),
            Self::Modified => fmt.write_str("modified"),
            Self::Deleted => fmt.write_str("deleted"),
            Self::Renamed => fmt.write_str("renamed"),
            Self::TypeChange => fmt.write_str("typechange"),
            Self::Conflicted => fmt.write_str("conflicted"),
        }
    }
}

/// Uncommitted change to a single path of the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub path: PathBuf,
    pub change: FileChange,
}

/// List uncommitted changes of repository containing target path.
///
/// Untracked files count as changes. Ignored files do not. An empty listing
/// means the working tree is clean.
///
/// # Errors
///
/// - Return [`StatusError::NotARepository`] if no repository contains path.
/// - Return [`StatusError::Git2`] if status cannot be queried.
#[instrument(skip(path), level = "debug")]
pub fn repository_status(path: impl AsRef<Path>) -> Result<Vec<StatusEntry>> {
    let repository =
        Repository::discover(path.as_ref()).map_err(|err| StatusError::NotARepository {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;
    debug!("query status of {:?}", repository.path().display());

    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);

    let entries = repository
        .statuses(Some(&mut opts))?
        .iter()
        .filter(|entry| entry.status() != Status::CURRENT)
        .filter_map(|entry| {
            entry.path().map(|path| StatusEntry {
                path: PathBuf::from(path),
                change: FileChange::from(entry.status()),
            })
        })
        .collect::<Vec<_>>();

    Ok(entries)
}

/// Repository status error types.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// Path is not inside a Git repository.
    #[error("{:?} is not inside a git repository", path.display())]
    NotARepository {
        #[source]
        source: git2::Error,
        path: PathBuf,
    },

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
type Result<T, E = StatusError> = std::result::Result<T, E>;
