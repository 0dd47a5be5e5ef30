// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Category deployment.
//!
//! Deployment materializes a category's repository content at its
//! destination, one-directionally, and idempotently. Every deployment first
//! decides what to do:
//!
//! - __Skip__: destination already holds exactly the repository content, and
//!   force was not requested. Nothing on disk is touched.
//! - __Install__: destination does not exist. Repository content is copied
//!   over, and no backup is made.
//! - __Overwrite__: destination differs, or force was requested. The old
//!   destination is renamed to a timestamped backup, then repository content
//!   is copied over.
//!
//! Deployment copies rather than merges. Files that only existed in the old
//! destination survive only in the backup. Excluded entries are the one
//! exception: they are not managed by dotsync at all, so they never count as
//! a difference, and they are moved back out of the backup into the new
//! destination right after it is written.

use crate::{
    backup::{deploy_backup_path, Clock, SystemClock},
    category::{CategoryKind, CategoryName, CategoryReport, ConfigCategory},
    tree::{copy_tree, excluded_entries, identical_excluding, path_exists, TreeError},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, instrument, warn};

/// What deployment decided to do with a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentDecision {
    /// Destination already matches repository.
    Skip,

    /// Destination is absent.
    Install,

    /// Destination differs, or force was requested.
    Overwrite,
}

impl Display for DeploymentDecision {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Skip => fmt.write_str("skip"),
            Self::Install => fmt.write_str("install"),
            Self::Overwrite => fmt.write_str("overwrite"),
        }
    }
}

/// Result of deploying a single category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub decision: DeploymentDecision,

    /// Backup made of the old destination, if any.
    pub backup: Option<PathBuf>,
}

/// Deploys categories from repository to destination.
#[derive(Debug, Default)]
pub struct Deployer<C = SystemClock>
where
    C: Clock,
{
    clock: C,
}

impl Deployer<SystemClock> {
    /// Construct new deployer using system time for backups.
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl<C> Deployer<C>
where
    C: Clock,
{
    /// Construct new deployer using target clock for backups.
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Decide what deploying category would do, without touching anything.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError::MissingSource`] if repository content of
    ///   category does not exist.
    /// - Return [`DeployError::WrongKind`] if repository content is not of
    ///   the kind the category expects.
    pub fn decide(&self, category: &ConfigCategory, force: bool) -> Result<DeploymentDecision> {
        if !path_exists(category.repo_path()) {
            return Err(DeployError::MissingSource {
                name: category.name(),
                path: category.repo_path().to_path_buf(),
            });
        }

        if !category.kind().matches(category.repo_path()) {
            return Err(DeployError::WrongKind {
                name: category.name(),
                kind: category.kind(),
                path: category.repo_path().to_path_buf(),
            });
        }

        if !path_exists(category.destination()) {
            return Ok(DeploymentDecision::Install);
        }

        let unchanged = identical_excluding(
            category.destination(),
            category.repo_path(),
            category.excludes(),
        );
        if !force && unchanged {
            return Ok(DeploymentDecision::Skip);
        }

        Ok(DeploymentDecision::Overwrite)
    }

    /// Deploy category to its destination.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError::MissingSource`] if repository content of
    ///   category does not exist.
    /// - Return [`DeployError::WrongKind`] if repository content is not of
    ///   the kind the category expects.
    /// - Return [`DeployError::Backup`] if old destination cannot be moved to
    ///   its backup path.
    /// - Return [`DeployError::Restore`] if excluded content cannot be moved
    ///   back out of the backup.
    /// - Return [`DeployError::Copy`] if repository content cannot be copied.
    ///   Destination may be left partially copied, and the backup is the way
    ///   to recover it.
    #[instrument(skip(self, category), fields(category = %category.name()), level = "debug")]
    pub fn deploy(&self, category: &ConfigCategory, force: bool) -> Result<Deployment> {
        let decision = self.decide(category, force)?;
        debug!("decided to {decision} {:?}", category.destination().display());

        let backup = match decision {
            DeploymentDecision::Skip => {
                info!("{} is up to date", category.name());
                return Ok(Deployment {
                    decision,
                    backup: None,
                });
            }
            DeploymentDecision::Install => None,
            DeploymentDecision::Overwrite => Some(self.backup(category)?),
        };

        copy_tree(category.repo_path(), category.destination(), category.excludes()).map_err(
            |err| DeployError::Copy {
                name: category.name(),
                source: err,
            },
        )?;

        if let Some(backup) = &backup {
            self.restore_excluded(category, backup)?;
        }

        match decision {
            DeploymentDecision::Install => info!(
                "installed {} to {:?}",
                category.name(),
                category.destination().display()
            ),
            _ => info!(
                "overwrote {} at {:?}",
                category.name(),
                category.destination().display()
            ),
        }

        Ok(Deployment { decision, backup })
    }

    /// Deploy each category in turn.
    ///
    /// A failing category is logged and recorded, but does not stop the
    /// remaining categories from deploying.
    pub fn deploy_all<'a>(
        &self,
        categories: impl IntoIterator<Item = &'a ConfigCategory>,
        force: bool,
    ) -> CategoryReport<Deployment, DeployError> {
        let mut report = CategoryReport::new();
        for category in categories {
            let result = self.deploy(category, force);
            if let Err(err) = &result {
                error!("failed to deploy {}: {err}", category.name());
            }
            report.push(category.name(), result);
        }

        report
    }

    fn backup(&self, category: &ConfigCategory) -> Result<PathBuf> {
        let backup = deploy_backup_path(category.destination(), self.clock.now());

        // INVARIANT: Backup made in the same second replaces the older one.
        if path_exists(&backup) {
            warn!("replace existing backup {:?}", backup.display());
            let removal = if backup.is_dir() {
                fs::remove_dir_all(&backup)
            } else {
                fs::remove_file(&backup)
            };
            removal.map_err(|err| DeployError::Backup {
                name: category.name(),
                source: err,
                path: backup.clone(),
            })?;
        }

        fs::rename(category.destination(), &backup).map_err(|err| DeployError::Backup {
            name: category.name(),
            source: err,
            path: backup.clone(),
        })?;
        info!(
            "backed up {:?} to {:?}",
            category.destination().display(),
            backup.display()
        );

        Ok(backup)
    }

    fn restore_excluded(&self, category: &ConfigCategory, backup: &Path) -> Result<()> {
        let entries = excluded_entries(backup, category.excludes()).map_err(|err| {
            DeployError::Copy {
                name: category.name(),
                source: err,
            }
        })?;

        for relative in entries {
            let (from, to) = (backup.join(&relative), category.destination().join(&relative));
            let restore = |err: std::io::Error| DeployError::Restore {
                name: category.name(),
                source: err,
                path: to.clone(),
            };

            if let Some(parent) = to.parent() {
                mkdirp::mkdirp(parent).map_err(restore)?;
            }
            fs::rename(&from, &to).map_err(restore)?;
            debug!("keep excluded {:?} in place", to.display());
        }

        Ok(())
    }
}

/// Deployment error types.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Repository content for category is missing.
    #[error("repository content of {name} is missing at {:?}", path.display())]
    MissingSource { name: CategoryName, path: PathBuf },

    /// Repository content is not of the expected kind.
    #[error("repository content of {name} at {:?} is not a {kind}", path.display())]
    WrongKind {
        name: CategoryName,
        kind: CategoryKind,
        path: PathBuf,
    },

    /// Old destination cannot be moved to backup path.
    #[error("failed to back up {name} to {:?}", path.display())]
    Backup {
        name: CategoryName,
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Excluded content cannot be moved back from backup.
    #[error("failed to move excluded content of {name} back to {:?}", path.display())]
    Restore {
        name: CategoryName,
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Repository content cannot be copied to destination.
    #[error("failed to copy {name} to its destination")]
    Copy {
        name: CategoryName,
        #[source]
        source: TreeError,
    },
}

/// Friendly result alias :3
type Result<T, E = DeployError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backup::FixedClock,
        tree::{identical, Excludes},
    };
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::path::Path;

    fn editor() -> anyhow::Result<ConfigCategory> {
        let root = std::env::current_dir()?;
        fs::create_dir_all("repo/nvim/lua")?;
        fs::write("repo/nvim/init.lua", "A")?;
        fs::write("repo/nvim/lua/opts.lua", "vim.o.number = true")?;

        Ok(ConfigCategory::new(
            CategoryName::Editor,
            root.join("repo/nvim"),
            root.join("home/.config/nvim"),
            CategoryKind::Directory,
            Excludes::none(),
        ))
    }

    fn count_backups(category: &ConfigCategory) -> anyhow::Result<usize> {
        let parent = category.destination().parent().unwrap();
        let prefix = format!(
            "{}.backup.",
            category.destination().file_name().unwrap().to_string_lossy()
        );
        let mut count = 0;
        for entry in fs::read_dir(parent)? {
            if entry?.file_name().to_string_lossy().starts_with(&prefix) {
                count += 1;
            }
        }

        Ok(count)
    }

    #[sealed_test]
    fn deploy_installs_missing_destination() -> anyhow::Result<()> {
        let category = editor()?;
        let deployer = Deployer::with_clock(FixedClock(100));

        let result = deployer.deploy(&category, false)?;
        assert_eq!(
            result,
            Deployment {
                decision: DeploymentDecision::Install,
                backup: None
            }
        );
        assert!(identical(category.destination(), category.repo_path()));
        assert_eq!(count_backups(&category)?, 0);

        Ok(())
    }

    #[sealed_test]
    fn deploy_is_idempotent() -> anyhow::Result<()> {
        let category = editor()?;
        let deployer = Deployer::with_clock(FixedClock(100));

        deployer.deploy(&category, false)?;
        let first = deployer.deploy(&category, false)?;
        let second = deployer.deploy(&category, false)?;
        assert_eq!(first.decision, DeploymentDecision::Skip);
        assert_eq!(second.decision, DeploymentDecision::Skip);
        assert_eq!(count_backups(&category)?, 0);
        assert!(identical(category.destination(), category.repo_path()));

        Ok(())
    }

    #[sealed_test]
    fn force_always_backs_up() -> anyhow::Result<()> {
        let category = editor()?;
        Deployer::with_clock(FixedClock(100)).deploy(&category, false)?;

        let result = Deployer::with_clock(FixedClock(200)).deploy(&category, true)?;
        let backup = deploy_backup_path(category.destination(), 200);
        assert_eq!(
            result,
            Deployment {
                decision: DeploymentDecision::Overwrite,
                backup: Some(backup.clone()),
            }
        );
        assert_eq!(count_backups(&category)?, 1);
        assert!(identical(&backup, category.repo_path()));
        assert!(identical(category.destination(), category.repo_path()));

        Ok(())
    }

    #[sealed_test]
    fn overwrite_drops_files_absent_from_repo() -> anyhow::Result<()> {
        let category = editor()?;
        let deployer = Deployer::with_clock(FixedClock(100));
        deployer.deploy(&category, false)?;
        fs::write(category.destination().join("init.lua"), "B")?;
        fs::write(category.destination().join("scratch.lua"), "local only")?;

        let result = deployer.deploy(&category, false)?;
        assert_eq!(result.decision, DeploymentDecision::Overwrite);
        assert!(identical(category.destination(), category.repo_path()));

        let backup = result.backup.unwrap();
        assert_eq!(fs::read_to_string(backup.join("init.lua"))?, "B");
        assert_eq!(fs::read_to_string(backup.join("scratch.lua"))?, "local only");

        Ok(())
    }

    #[sealed_test]
    fn backup_collision_replaces_older_backup() -> anyhow::Result<()> {
        let category = editor()?;
        let deployer = Deployer::with_clock(FixedClock(100));
        deployer.deploy(&category, false)?;
        fs::write(category.destination().join("init.lua"), "B")?;
        deployer.deploy(&category, false)?;
        fs::write(category.destination().join("init.lua"), "C")?;

        let result = deployer.deploy(&category, false)?;
        let backup = result.backup.unwrap();
        assert_eq!(count_backups(&category)?, 1);
        assert_eq!(fs::read_to_string(backup.join("init.lua"))?, "C");

        Ok(())
    }

    #[sealed_test]
    fn deploy_single_file_category() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        fs::create_dir_all("repo/shell")?;
        fs::create_dir_all("home")?;
        fs::write("repo/shell/bashrc", "set -o vi\n")?;
        fs::write("home/.bashrc", "set -o emacs\n")?;
        let category = ConfigCategory::new(
            CategoryName::Bashrc,
            root.join("repo/shell/bashrc"),
            root.join("home/.bashrc"),
            CategoryKind::File,
            Excludes::none(),
        );

        let result = Deployer::with_clock(FixedClock(5)).deploy(&category, false)?;
        assert_eq!(result.decision, DeploymentDecision::Overwrite);
        assert_eq!(fs::read_to_string("home/.bashrc")?, "set -o vi\n");
        assert_eq!(fs::read_to_string("home/.bashrc.backup.5")?, "set -o emacs\n");

        Ok(())
    }

    #[sealed_test]
    fn missing_source_fails_without_touching_destination() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        fs::create_dir_all("home/.config/tmux")?;
        fs::write("home/.config/tmux/tmux.conf", "set -g mouse on")?;
        let category = ConfigCategory::new(
            CategoryName::Tmux,
            root.join("repo/tmux"),
            root.join("home/.config/tmux"),
            CategoryKind::Directory,
            Excludes::none(),
        );

        let result = Deployer::new().deploy(&category, true);
        assert!(matches!(result, Err(DeployError::MissingSource { .. })));
        assert!(Path::new("home/.config/tmux/tmux.conf").exists());
        assert_eq!(count_backups(&category)?, 0);

        Ok(())
    }

    #[sealed_test]
    fn deploy_all_continues_past_failure() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        let editor = editor()?;
        let tmux = ConfigCategory::new(
            CategoryName::Tmux,
            root.join("repo/tmux"),
            root.join("home/.config/tmux"),
            CategoryKind::Directory,
            Excludes::none(),
        );

        let report = Deployer::with_clock(FixedClock(1)).deploy_all([&tmux, &editor], false);
        assert_eq!(report.failed(), vec![CategoryName::Tmux]);
        assert!(!report.is_success());
        assert!(identical(editor.destination(), editor.repo_path()));

        Ok(())
    }

    #[sealed_test]
    fn excluded_content_stays_live_and_never_forces_overwrite() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        fs::create_dir_all("repo/claude/plugins")?;
        fs::write("repo/claude/settings.json", "{}")?;
        fs::write("repo/claude/plugins/installed.json", "{}")?;
        let category = ConfigCategory::new(
            CategoryName::Assistant,
            root.join("repo/claude"),
            root.join("home/.claude"),
            CategoryKind::Directory,
            Excludes::new(["plugins/marketplaces"])?,
        );
        let deployer = Deployer::with_clock(FixedClock(1));
        deployer.deploy(&category, false)?;

        let head = category
            .destination()
            .join("plugins/marketplaces/official/.git/HEAD");
        fs::create_dir_all(head.parent().unwrap())?;
        fs::write(&head, "ref: refs/heads/main")?;

        let result = deployer.deploy(&category, false)?;
        assert_eq!(result.decision, DeploymentDecision::Skip);

        fs::write(category.destination().join("settings.json"), "{\"theme\": \"dark\"}")?;
        let result = Deployer::with_clock(FixedClock(2)).deploy(&category, false)?;
        assert_eq!(result.decision, DeploymentDecision::Overwrite);
        assert_eq!(fs::read_to_string(&head)?, "ref: refs/heads/main");
        assert_eq!(
            fs::read_to_string(category.destination().join("settings.json"))?,
            "{}"
        );

        let backup = result.backup.unwrap();
        assert_eq!(
            fs::read_to_string(backup.join("settings.json"))?,
            "{\"theme\": \"dark\"}"
        );
        assert!(!path_exists(backup.join("plugins/marketplaces")));

        Ok(())
    }

    #[sealed_test]
    fn repository_content_of_wrong_kind_fails() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        fs::create_dir_all("repo/shell/bashrc")?;
        let category = ConfigCategory::new(
            CategoryName::Bashrc,
            root.join("repo/shell/bashrc"),
            root.join("home/.bashrc"),
            CategoryKind::File,
            Excludes::none(),
        );

        let result = Deployer::new().deploy(&category, false);
        assert!(matches!(
            result,
            Err(DeployError::WrongKind {
                kind: CategoryKind::File,
                ..
            })
        ));
        assert!(!path_exists("home/.bashrc"));

        Ok(())
    }
}
