// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup naming and discovery.
//!
//! Dotsync never throws old destination content away without keeping a copy
//! around first. There are two kinds of backups:
//!
//! 1. __Deploy backups__: the old destination is renamed in place to
//!    `<destination>.backup.<unix-timestamp>` right before deployment
//!    overwrites it.
//! 2. __Sync backups__: the destination is copied to
//!    `<backup-root>/<category>.<unix-timestamp>` right before content is
//!    pulled from the repository.
//!
//! Backups are never read back automatically, and are never cleaned up
//! automatically. They only exist for manual recovery.

use crate::category::{CategoryName, ConfigCategory};

use glob::{glob, Pattern};
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

/// Source of backup timestamps.
pub trait Clock {
    /// Seconds since Unix epoch.
    fn now(&self) -> u64;
}

/// Clock backed by system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default()
    }
}

/// Clock that always reports the same instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

/// Path of deploy backup for destination at timestamp.
pub fn deploy_backup_path(destination: impl AsRef<Path>, timestamp: u64) -> PathBuf {
    let mut name = OsString::from(destination.as_ref().as_os_str());
    name.push(format!(".backup.{timestamp}"));
    PathBuf::from(name)
}

/// Path of sync backup for category at timestamp.
pub fn sync_backup_path(backup_root: impl AsRef<Path>, name: CategoryName, timestamp: u64) -> PathBuf {
    backup_root.as_ref().join(format!("{name}.{timestamp}"))
}

/// Which operation produced a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupOrigin {
    Deploy,
    Sync,
}

/// Backup found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub category: CategoryName,
    pub origin: BackupOrigin,
    pub path: PathBuf,
    pub timestamp: u64,
}

/// List every backup of category, newest first.
///
/// # Errors
///
/// - Return [`BackupError::Pattern`] if search pattern cannot be built.
/// - Return [`BackupError::Glob`] if a candidate path cannot be inspected.
pub fn list_backups(category: &ConfigCategory, backup_root: impl AsRef<Path>) -> Result<Vec<Backup>> {
    let deploy_pattern = format!(
        "{}.backup.*",
        Pattern::escape(category.destination().to_string_lossy().as_ref())
    );
    let sync_pattern = format!(
        "{}.*",
        Pattern::escape(
            backup_root
                .as_ref()
                .join(category.name().as_str())
                .to_string_lossy()
                .as_ref()
        )
    );

    let mut backups = Vec::new();
    for (pattern, origin) in [
        (deploy_pattern, BackupOrigin::Deploy),
        (sync_pattern, BackupOrigin::Sync),
    ] {
        for entry in glob(&pattern)? {
            let path = entry?;
            // INVARIANT: Only a numeric suffix marks a backup.
            if let Some(timestamp) = timestamp_suffix(&path) {
                backups.push(Backup {
                    category: category.name(),
                    origin,
                    path,
                    timestamp,
                });
            }
        }
    }

    backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.path.cmp(&b.path)));

    Ok(backups)
}

fn timestamp_suffix(path: &Path) -> Option<u64> {
    path.extension()?.to_str()?.parse().ok()
}

/// Backup discovery error types.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Search pattern is invalid.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// Candidate path cannot be inspected.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
}

/// Friendly result alias :3
type Result<T, E = BackupError> = std::result::Result<T, E>;
