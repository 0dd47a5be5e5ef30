// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine the per-user system locations that category destinations,
//! backups, and the configuration file are rooted at. None of these functions
//! check whether the returned path actually exists.

use std::{env, path::PathBuf};

/// Determine absolute path to user's home directory.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine XDG configuration root for POSIX platforms.
///
/// Uses `$XDG_CONFIG_HOME` when it is set to an absolute path, and falls back
/// to `~/.config` otherwise. Used on macOS as well, because the tooling
/// managed by dotsync follows XDG there instead of `~/Library`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn xdg_config_dir() -> Result<PathBuf> {
    match env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        Some(path) if path.is_absolute() => Ok(path),
        _ => home_dir().map(|home| home.join(".config")),
    }
}

/// Determine local application data root, i.e., `%LOCALAPPDATA%` on Windows.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn local_data_dir() -> Result<PathBuf> {
    dirs::data_local_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to dotsync's configuration file.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_config_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("dotsync").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Determine default backup root used when pulling content from repository.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_backup_dir() -> Result<PathBuf> {
    home_dir().map(|home| home.join(".dotfiles-backup"))
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
