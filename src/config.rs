// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of dotsync's optional configuration file to simplify
//! the process of serialization and deserialization. The configuration file
//! only tunes the fixed category set. It can point at the repository, move
//! the backup root, relocate a category's destination, or add exclude
//! patterns. It cannot define new categories.

use crate::category::CategoryName;

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Configuration file layout.
///
/// # General Layout
///
/// A configuration file is composed of two basic parts: general settings, and
/// category overrides. Both parts are optional. An empty file, or no file at
/// all, means that every default applies.
///
/// ```toml
/// [settings]
/// repository = "~/dotfiles"
/// backup_dir = "~/.dotfiles-backup"
///
/// [[category]]
/// name = "editor"
/// destination = "$HOME/.config/nvim"
/// exclude = ["lazy-lock.json"]
/// ```
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Configuration {
    /// General settings.
    #[serde(default)]
    pub settings: Settings,

    /// Per-category overrides.
    #[serde(rename = "category", default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<CategoryOverride>,
}

impl Configuration {
    /// Load configuration file at target path.
    ///
    /// A missing file is not an error, and yields the default configuration.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file content is invalid.
    /// - Return [`ConfigError::ShellExpansion`] if a path cannot be expanded.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_to_string(path) {
            Ok(data) => {
                debug!("load configuration from {:?}", path.display());
                data.parse()
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no configuration at {:?}, use defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Read {
                source: err,
                path: path.to_path_buf(),
            }),
        }
    }
}

impl FromStr for Configuration {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: Configuration =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        config.settings.repository = config.settings.repository.map(expand).transpose()?;
        config.settings.backup_dir = config.settings.backup_dir.map(expand).transpose()?;
        for category in &mut config.categories {
            category.destination = category.destination.take().map(expand).transpose()?;
        }

        Ok(config)
    }
}

impl Display for Configuration {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// General settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Root of the dotfiles repository.
    pub repository: Option<PathBuf>,

    /// Root directory for backups taken before pulling from repository.
    pub backup_dir: Option<PathBuf>,
}

/// Override for a single known category.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct CategoryOverride {
    /// Name of category to override.
    pub name: CategoryName,

    /// Destination to use instead of the platform default.
    pub destination: Option<PathBuf>,

    /// Extra exclude patterns appended to the category's defaults.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

fn expand(path: PathBuf) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
