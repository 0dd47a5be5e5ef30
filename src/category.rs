// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration categories.
//!
//! A __category__ is one named unit of configuration, e.g., the editor
//! configuration tree, or a shell rc file. Each category pairs a path inside
//! the dotfiles repository with a platform-dependent destination path on the
//! user's system.
//!
//! The set of categories is fixed. Which of them are available, and where
//! their destinations live, is decided once at startup from the running
//! [`Platform`]. The resulting [`CategoryTable`] is never mutated afterwards.
//!
//! # Platform Path Table
//!
//! POSIX platforms (Linux and macOS) root destinations at the XDG config
//! directory or the home directory. Windows roots the editor at
//! `%LOCALAPPDATA%`. Categories with no Windows counterpart are simply absent
//! from the table there, unless a configuration override provides a
//! destination for them.

use crate::{
    config::CategoryOverride,
    path::{home_dir, local_data_dir, xdg_config_dir, NoWayHome},
    tree::{Excludes, TreeError},
};

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
};

/// Name of a known configuration category.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Deserialize,
    Serialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryName {
    /// Neovim configuration tree.
    Editor,

    /// Terminal multiplexer configuration tree.
    Tmux,

    /// Coding assistant configuration tree.
    Assistant,

    /// Bash rc file.
    Bashrc,

    /// Zsh rc file.
    Zshrc,
}

impl CategoryName {
    /// Every known category in table order.
    pub const ALL: [CategoryName; 5] = [
        CategoryName::Editor,
        CategoryName::Tmux,
        CategoryName::Assistant,
        CategoryName::Bashrc,
        CategoryName::Zshrc,
    ];

    /// Name as typed on the command line and in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Editor => "editor",
            Self::Tmux => "tmux",
            Self::Assistant => "assistant",
            Self::Bashrc => "bashrc",
            Self::Zshrc => "zshrc",
        }
    }

    /// Path of category content relative to repository root.
    pub fn repo_path(&self) -> PathBuf {
        match self {
            Self::Editor => PathBuf::from("nvim"),
            Self::Tmux => PathBuf::from("tmux"),
            Self::Assistant => PathBuf::from("claude"),
            Self::Bashrc => PathBuf::from("shell").join("bashrc"),
            Self::Zshrc => PathBuf::from("shell").join("zshrc"),
        }
    }

    /// Shape of category content.
    pub fn kind(&self) -> CategoryKind {
        match self {
            Self::Editor | Self::Tmux | Self::Assistant => CategoryKind::Directory,
            Self::Bashrc | Self::Zshrc => CategoryKind::File,
        }
    }

    /// Patterns that are never synced for this category.
    pub fn default_excludes(&self) -> &'static [&'static str] {
        match self {
            // Marketplaces embed their own Git repositories.
            Self::Assistant => &["plugins/marketplaces"],
            _ => &[],
        }
    }

    /// Default destination on target platform.
    ///
    /// Returns `None` if the category has no counterpart on that platform.
    ///
    /// # Errors
    ///
    /// - Return [`NoWayHome`] if home directory cannot be determined.
    pub fn default_destination(&self, platform: Platform) -> Result<Option<PathBuf>, NoWayHome> {
        let destination = match (self, platform) {
            (Self::Editor, Platform::Windows) => Some(local_data_dir()?.join("nvim")),
            (Self::Editor, _) => Some(xdg_config_dir()?.join("nvim")),
            (Self::Tmux, Platform::Windows) => None,
            (Self::Tmux, _) => Some(xdg_config_dir()?.join("tmux")),
            (Self::Assistant, _) => Some(home_dir()?.join(".claude")),
            (Self::Bashrc | Self::Zshrc, Platform::Windows) => None,
            (Self::Bashrc, _) => Some(home_dir()?.join(".bashrc")),
            (Self::Zshrc, _) => Some(home_dir()?.join(".zshrc")),
        };

        Ok(destination)
    }
}

impl Display for CategoryName {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Shape of a category's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryKind {
    /// Directory tree copied recursively.
    Directory,

    /// Single regular file.
    File,
}

impl CategoryKind {
    /// Check if path holds content of this kind, following symbolic links.
    pub fn matches(&self, path: impl AsRef<Path>) -> bool {
        fs::metadata(path.as_ref()).is_ok_and(|metadata| match self {
            Self::Directory => metadata.is_dir(),
            Self::File => metadata.is_file(),
        })
    }
}

impl Display for CategoryKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Directory => fmt.write_str("directory"),
            Self::File => fmt.write_str("file"),
        }
    }
}

/// Platform that destination paths are resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
}

impl Platform {
    /// Detect running platform.
    ///
    /// Unrecognized Unix-likes are treated as Linux, since they follow the
    /// same XDG layout.
    pub fn detect() -> Self {
        match std::env::consts::OS {
            "macos" => Self::MacOs,
            "windows" => Self::Windows,
            _ => Self::Linux,
        }
    }
}

impl Display for Platform {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::MacOs => fmt.write_str("macos"),
            Self::Linux => fmt.write_str("linux"),
            Self::Windows => fmt.write_str("windows"),
        }
    }
}

/// A single configuration category resolved for the running platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigCategory {
    name: CategoryName,
    repo_path: PathBuf,
    destination: PathBuf,
    kind: CategoryKind,
    excludes: Excludes,
}

impl ConfigCategory {
    /// Construct new category.
    pub fn new(
        name: CategoryName,
        repo_path: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        kind: CategoryKind,
        excludes: Excludes,
    ) -> Self {
        Self {
            name,
            repo_path: repo_path.into(),
            destination: destination.into(),
            kind,
            excludes,
        }
    }

    pub fn name(&self) -> CategoryName {
        self.name
    }

    /// Absolute path of category content inside repository.
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Absolute path of category content on user's system.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn kind(&self) -> CategoryKind {
        self.kind
    }

    pub fn excludes(&self) -> &Excludes {
        &self.excludes
    }
}

/// Table of categories available on a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    platform: Platform,
    categories: BTreeMap<CategoryName, ConfigCategory>,
}

impl CategoryTable {
    /// Construct empty table for target platform.
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            categories: BTreeMap::new(),
        }
    }

    /// Construct table of built-in categories for target platform.
    ///
    /// # Errors
    ///
    /// - Return [`CategoryError::NoWayHome`] if destination roots cannot be
    ///   determined.
    /// - Return [`CategoryError::Exclude`] if built-in exclude pattern is
    ///   invalid.
    pub fn builtin(platform: Platform, repository: impl AsRef<Path>) -> Result<Self> {
        let mut table = Self::new(platform);
        for name in CategoryName::ALL {
            if let Some(destination) = name.default_destination(platform)? {
                table.insert(ConfigCategory::new(
                    name,
                    repository.as_ref().join(name.repo_path()),
                    destination,
                    name.kind(),
                    Excludes::new(name.default_excludes().iter().copied())?,
                ));
            }
        }

        Ok(table)
    }

    /// Apply configuration overrides to table.
    ///
    /// An override with a destination makes its category available even if
    /// the platform has no default destination for it. Extra exclude patterns
    /// are appended to the existing ones.
    ///
    /// # Errors
    ///
    /// - Return [`CategoryError::Unavailable`] if override only adds excludes
    ///   to a category that has no destination on this platform.
    /// - Return [`CategoryError::Exclude`] if an exclude pattern is invalid.
    pub fn with_overrides<'a>(
        mut self,
        repository: impl AsRef<Path>,
        overrides: impl IntoIterator<Item = &'a CategoryOverride>,
    ) -> Result<Self> {
        for entry in overrides {
            let current = self.categories.get(&entry.name);
            let destination = match (&entry.destination, current) {
                (Some(destination), _) => destination.clone(),
                (None, Some(category)) => category.destination().to_path_buf(),
                (None, None) => {
                    return Err(CategoryError::Unavailable {
                        name: entry.name,
                        platform: self.platform,
                    })
                }
            };
            let excludes = match current {
                Some(category) => category.excludes().extend(entry.exclude.iter().cloned())?,
                None => Excludes::new(
                    entry
                        .name
                        .default_excludes()
                        .iter()
                        .map(ToString::to_string)
                        .chain(entry.exclude.iter().cloned()),
                )?,
            };

            self.insert(ConfigCategory::new(
                entry.name,
                repository.as_ref().join(entry.name.repo_path()),
                destination,
                entry.name.kind(),
                excludes,
            ));
        }

        Ok(self)
    }

    /// Insert category, replacing any existing category of the same name.
    pub fn insert(&mut self, category: ConfigCategory) {
        self.categories.insert(category.name(), category);
    }

    /// Platform that destinations were resolved for.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn get(&self, name: CategoryName) -> Option<&ConfigCategory> {
        self.categories.get(&name)
    }

    /// Iterate categories in table order.
    pub fn iter(&self) -> impl Iterator<Item = &ConfigCategory> {
        self.categories.values()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Select categories by name.
    ///
    /// An empty selection means every available category. Otherwise exactly
    /// the named categories are selected, in table order, without duplicates.
    ///
    /// # Errors
    ///
    /// - Return [`CategoryError::Unavailable`] if a named category is not in
    ///   the table.
    pub fn select(&self, names: &[CategoryName]) -> Result<Vec<&ConfigCategory>> {
        if names.is_empty() {
            return Ok(self.iter().collect());
        }

        for name in names {
            if !self.categories.contains_key(name) {
                return Err(CategoryError::Unavailable {
                    name: *name,
                    platform: self.platform,
                });
            }
        }

        Ok(self
            .iter()
            .filter(|category| names.contains(&category.name()))
            .collect())
    }
}

/// Outcome of running one operation across several categories.
///
/// Each category succeeds or fails on its own. A failure never prevents the
/// remaining categories from running.
#[derive(Debug)]
pub struct CategoryReport<T, E> {
    entries: Vec<(CategoryName, std::result::Result<T, E>)>,
}

impl<T, E> CategoryReport<T, E> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, name: CategoryName, result: std::result::Result<T, E>) {
        self.entries.push((name, result));
    }

    pub fn entries(&self) -> &[(CategoryName, std::result::Result<T, E>)] {
        &self.entries
    }

    /// Names of categories whose operation failed.
    pub fn failed(&self) -> Vec<CategoryName> {
        self.entries
            .iter()
            .filter(|(_, result)| result.is_err())
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|(_, result)| result.is_ok())
    }
}

impl<T, E> Default for CategoryReport<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Category resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum CategoryError {
    /// Category has no destination on the platform of the table.
    #[error("category {name} is not available on {platform}")]
    Unavailable {
        name: CategoryName,
        platform: Platform,
    },

    /// Destination roots cannot be determined.
    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),

    /// Exclude pattern is invalid.
    #[error(transparent)]
    Exclude(#[from] TreeError),
}

/// Friendly result alias :3
type Result<T, E = CategoryError> = std::result::Result<T, E>;
