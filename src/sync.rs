// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bidirectional category synchronization.
//!
//! Synchronization keeps the repository and destinations consistent after
//! deployment. The direction decides which side is authoritative, and which
//! conflict policy applies:
//!
//! - __To repository__: the destination is authoritative. The repository copy
//!   becomes an exact mirror of what is live on the system. Repository entries
//!   absent from the destination are deleted.
//! - __From repository__: the repository is authoritative for new content
//!   only. The destination is backed up first, then missing files are pulled
//!   in, while files that already exist at the destination keep their local
//!   edits. Destination entries absent from the repository are deleted.
//!
//! The asymmetry is intentional. Pulling never clobbers uncommitted local
//! edits, and pushing always records exactly what is live.
//!
//! Exclude patterns of a category are invisible to every sync operation in
//! both directions.
//!
//! # Sync State
//!
//! A category is __synced__ when its destination and repository content
//! compare identical. This state is never persisted, and is recomputed after
//! every operation.

pub mod status;

pub use status::{repository_status, FileChange, StatusEntry, StatusError};

use crate::{
    backup::{sync_backup_path, Clock, SystemClock},
    category::{CategoryKind, CategoryName, CategoryReport, ConfigCategory},
    tree::{
        copy_tree, diff, identical_excluding, merge_ignore_existing, mirror, path_exists,
        unified_patch, CopySummary, TreeDiff, TreeError,
    },
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
};
use tracing::{error, info, instrument, warn};

/// Direction of synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Destination is copied into repository.
    ToRepo,

    /// Repository is copied onto destination.
    FromRepo,
}

impl Display for SyncDirection {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::ToRepo => fmt.write_str("to-repo"),
            Self::FromRepo => fmt.write_str("from-repo"),
        }
    }
}

/// State of category right after a sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing to sync from.
    Skipped,

    /// Destination and repository compare identical.
    Synced,

    /// Destination and repository still differ, e.g., local edits survived a
    /// pull from the repository.
    Diverged,
}

/// Result of syncing a single category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub state: SyncState,
    pub summary: CopySummary,

    /// Backup made of the destination before pulling, if any.
    pub backup: Option<PathBuf>,
}

impl SyncOutcome {
    fn skipped() -> Self {
        Self {
            state: SyncState::Skipped,
            summary: CopySummary::default(),
            backup: None,
        }
    }
}

/// Result of comparing a single category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    /// Destination matches repository.
    Identical,

    /// Destination does not exist yet.
    MissingDestination,

    /// Repository content does not exist.
    MissingSource,

    /// Destination differs from repository. Added entries only exist at the
    /// destination, removed entries only exist in the repository.
    Differs(TreeDiff),
}

/// Synchronizes categories between repository and destination.
#[derive(Debug)]
pub struct Synchronizer<C = SystemClock>
where
    C: Clock,
{
    backup_root: PathBuf,
    clock: C,
}

impl Synchronizer<SystemClock> {
    /// Construct new synchronizer using system time for backups.
    pub fn new(backup_root: impl Into<PathBuf>) -> Self {
        Self::with_clock(backup_root, SystemClock)
    }
}

impl<C> Synchronizer<C>
where
    C: Clock,
{
    /// Construct new synchronizer using target clock for backups.
    pub fn with_clock(backup_root: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            backup_root: backup_root.into(),
            clock,
        }
    }

    /// Sync each category in turn.
    ///
    /// A failing category is logged and recorded, but does not stop the
    /// remaining categories from syncing.
    pub fn sync<'a>(
        &self,
        direction: SyncDirection,
        categories: impl IntoIterator<Item = &'a ConfigCategory>,
    ) -> CategoryReport<SyncOutcome, SyncError> {
        let mut report = CategoryReport::new();
        for category in categories {
            let result = match direction {
                SyncDirection::ToRepo => self.to_repo(category),
                SyncDirection::FromRepo => self.from_repo(category),
            };
            if let Err(err) = &result {
                error!("failed to sync {} {direction}: {err}", category.name());
            }
            report.push(category.name(), result);
        }

        report
    }

    /// Mirror destination into repository.
    ///
    /// Skips category with a warning if its destination does not exist.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::WrongKind`] if destination is not of the kind
    ///   the category expects.
    /// - Return [`SyncError::Copy`] if mirroring fails. Repository content
    ///   may be left partially mirrored.
    #[instrument(skip(self, category), fields(category = %category.name()), level = "debug")]
    pub fn to_repo(&self, category: &ConfigCategory) -> Result<SyncOutcome> {
        if !path_exists(category.destination()) {
            warn!(
                "skip {}: nothing at {:?}",
                category.name(),
                category.destination().display()
            );
            return Ok(SyncOutcome::skipped());
        }
        check_kind(category, category.destination())?;

        let summary = mirror(category.destination(), category.repo_path(), category.excludes())
            .map_err(|err| SyncError::Copy {
                name: category.name(),
                source: err,
            })?;
        info!(
            "mirrored {} into repository: {} copied, {} removed",
            category.name(),
            summary.copied,
            summary.removed
        );

        Ok(SyncOutcome {
            state: self.state(category),
            summary,
            backup: None,
        })
    }

    /// Merge repository into destination without overwriting local files.
    ///
    /// Destination is backed up first on a best-effort basis. Failure to back
    /// up is logged, and the pull goes on. A backup taken earlier in the same
    /// second is replaced.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::MissingSource`] if repository content of
    ///   category does not exist.
    /// - Return [`SyncError::WrongKind`] if repository content is not of the
    ///   kind the category expects.
    /// - Return [`SyncError::Copy`] if merging fails. Destination may be left
    ///   partially merged.
    #[instrument(skip(self, category), fields(category = %category.name()), level = "debug")]
    pub fn from_repo(&self, category: &ConfigCategory) -> Result<SyncOutcome> {
        if !path_exists(category.repo_path()) {
            return Err(SyncError::MissingSource {
                name: category.name(),
                path: category.repo_path().to_path_buf(),
            });
        }
        check_kind(category, category.repo_path())?;

        let backup = if path_exists(category.destination()) {
            self.backup(category)
        } else {
            None
        };

        let summary = merge_ignore_existing(
            category.repo_path(),
            category.destination(),
            category.excludes(),
        )
        .map_err(|err| SyncError::Copy {
            name: category.name(),
            source: err,
        })?;
        info!(
            "pulled {} from repository: {} copied, {} kept, {} removed",
            category.name(),
            summary.copied,
            summary.preserved,
            summary.removed
        );

        Ok(SyncOutcome {
            state: self.state(category),
            summary,
            backup,
        })
    }

    /// Compare destination against repository without changing anything.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Compare`] if either side cannot be read.
    pub fn diff(&self, category: &ConfigCategory) -> Result<DiffOutcome> {
        if !path_exists(category.repo_path()) {
            return Ok(DiffOutcome::MissingSource);
        }

        if !path_exists(category.destination()) {
            return Ok(DiffOutcome::MissingDestination);
        }

        let changes = diff(category.repo_path(), category.destination(), category.excludes())
            .map_err(|err| SyncError::Compare {
                name: category.name(),
                source: err,
            })?;

        if changes.is_empty() {
            Ok(DiffOutcome::Identical)
        } else {
            Ok(DiffOutcome::Differs(changes))
        }
    }

    /// Render line diff of every changed file of category.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Compare`] if a changed file cannot be read.
    pub fn patch(&self, category: &ConfigCategory, changes: &TreeDiff) -> Result<String> {
        unified_patch(category.repo_path(), category.destination(), changes).map_err(|err| {
            SyncError::Compare {
                name: category.name(),
                source: err,
            }
        })
    }

    fn state(&self, category: &ConfigCategory) -> SyncState {
        if identical_excluding(category.destination(), category.repo_path(), category.excludes()) {
            info!("{} is synced", category.name());
            SyncState::Synced
        } else {
            info!("{} differs from repository", category.name());
            SyncState::Diverged
        }
    }

    fn backup(&self, category: &ConfigCategory) -> Option<PathBuf> {
        let backup = sync_backup_path(&self.backup_root, category.name(), self.clock.now());

        // INVARIANT: Backup made in the same second replaces the older one.
        if path_exists(&backup) {
            warn!("replace existing backup {:?}", backup.display());
            let removal = if backup.is_dir() {
                fs::remove_dir_all(&backup)
            } else {
                fs::remove_file(&backup)
            };
            if let Err(err) = removal {
                warn!("continue without backup of {}: {err}", category.name());
                return None;
            }
        }

        match copy_tree(category.destination(), &backup, category.excludes()) {
            Ok(_) => {
                info!(
                    "backed up {:?} to {:?}",
                    category.destination().display(),
                    backup.display()
                );
                Some(backup)
            }
            Err(err) => {
                warn!("continue without backup of {}: {err}", category.name());
                None
            }
        }
    }
}

fn check_kind(category: &ConfigCategory, source: &Path) -> Result<()> {
    if category.kind().matches(source) {
        return Ok(());
    }

    Err(SyncError::WrongKind {
        name: category.name(),
        kind: category.kind(),
        path: source.to_path_buf(),
    })
}

/// Synchronization error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Repository content for category is missing.
    #[error("repository content of {name} is missing at {:?}", path.display())]
    MissingSource { name: CategoryName, path: PathBuf },

    /// Content to sync from is not of the expected kind.
    #[error("content of {name} at {:?} is not a {kind}", path.display())]
    WrongKind {
        name: CategoryName,
        kind: CategoryKind,
        path: PathBuf,
    },

    /// Content cannot be copied.
    #[error("failed to sync {name}")]
    Copy {
        name: CategoryName,
        #[source]
        source: TreeError,
    },

    /// Content cannot be compared.
    #[error("failed to compare {name}")]
    Compare {
        name: CategoryName,
        #[source]
        source: TreeError,
    },
}

/// Friendly result alias :3
type Result<T, E = SyncError> = std::result::Result<T, E>;
