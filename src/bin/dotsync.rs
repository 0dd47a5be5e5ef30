// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotsync::{
    backup::list_backups,
    category::{CategoryName, CategoryReport, CategoryTable, ConfigCategory, Platform},
    config::Configuration,
    deploy::{Deployer, DeploymentDecision},
    path::{default_backup_dir, default_config_file},
    sync::{repository_status, DiffOutcome, SyncDirection, Synchronizer},
};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use inquire::Confirm;
use std::{
    env,
    fmt::Display,
    path::{Path, PathBuf},
    process::exit,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "dotsync [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let context = Context::resolve(&self.global)?;
        match self.command {
            Command::Deploy(opts) => run_deploy(&context, opts),
            Command::Sync(opts) => run_sync(&context, opts),
            Command::Backups(opts) => run_backups(&context, opts),
            Command::List => run_list(&context),
        }
    }
}

#[derive(Args, Clone, Debug)]
struct GlobalOptions {
    /// Path to configuration file.
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Root of dotfiles repository.
    #[arg(long, global = true, value_name = "path")]
    pub repository: Option<PathBuf>,

    /// Root directory for backups taken before pulling from repository.
    #[arg(long, global = true, value_name = "path")]
    pub backup_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Deploy repository content to destinations.
    #[command(override_usage = "dotsync deploy [options]")]
    Deploy(DeployOptions),

    /// Synchronize repository and destinations.
    #[command(override_usage = "dotsync sync [options] <sync-command>")]
    Sync(SyncOptions),

    /// List backups left behind by deploy and sync.
    #[command(override_usage = "dotsync backups [options]")]
    Backups(BackupOptions),

    /// List categories available on this platform.
    #[command(override_usage = "dotsync list")]
    List,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DeployOptions {
    /// Category to deploy. Deploy every category if none are given.
    #[arg(short, long = "category", value_name = "category")]
    pub categories: Vec<CategoryName>,

    /// Back up and overwrite destinations even if they are up to date.
    #[arg(short, long)]
    pub force: bool,

    /// Do not ask for confirmation outside of a container.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SyncOptions {
    #[command(subcommand)]
    pub command: SyncCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum SyncCommand {
    /// Mirror destinations into repository.
    ToRepo(SelectOptions),

    /// Pull new repository content into destinations, keeping local edits.
    FromRepo(SelectOptions),

    /// Show differences between repository and destinations.
    Diff(DiffOptions),

    /// Show uncommitted changes of repository.
    Status,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SelectOptions {
    /// Category to operate on. Operate on every category if none are given.
    #[arg(short, long = "category", value_name = "category")]
    pub categories: Vec<CategoryName>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DiffOptions {
    /// Category to compare. Compare every category if none are given.
    #[arg(short, long = "category", value_name = "category")]
    pub categories: Vec<CategoryName>,

    /// Show line diff of changed files.
    #[arg(short, long)]
    pub patch: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BackupOptions {
    /// Category to list backups of. List every category if none are given.
    #[arg(short, long = "category", value_name = "category")]
    pub categories: Vec<CategoryName>,
}

/// Settings resolved from command line, configuration file, and defaults.
struct Context {
    repository: PathBuf,
    backup_dir: PathBuf,
    table: CategoryTable,
}

impl Context {
    fn resolve(opts: &GlobalOptions) -> Result<Self> {
        let config_file = match &opts.config {
            Some(path) => path.clone(),
            None => default_config_file()?,
        };
        let config = Configuration::load_or_default(&config_file)?;

        let repository = match opts.repository.clone().or(config.settings.repository) {
            Some(path) => path,
            None => env::current_dir()?,
        };
        let backup_dir = match opts.backup_dir.clone().or(config.settings.backup_dir) {
            Some(path) => path,
            None => default_backup_dir()?,
        };

        let table = CategoryTable::builtin(Platform::detect(), &repository)?
            .with_overrides(&repository, &config.categories)?;

        Ok(Self {
            repository,
            backup_dir,
            table,
        })
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_deploy(context: &Context, opts: DeployOptions) -> Result<()> {
    let categories = context.table.select(&opts.categories)?;
    if !opts.yes && !in_container() {
        let proceed = Confirm::new("deploy to local environment?")
            .with_default(false)
            .with_help_message("existing configuration that differs is backed up first")
            .prompt()?;
        if !proceed {
            warn!("deployment cancelled");
            return Ok(());
        }
    }

    let report = Deployer::new().deploy_all(categories, opts.force);
    for (name, result) in report.entries() {
        if let Ok(deployment) = result {
            match (deployment.decision, &deployment.backup) {
                (DeploymentDecision::Overwrite, Some(backup)) => {
                    info!("{name}: overwrite, old content at {:?}", backup.display())
                }
                (decision, _) => info!("{name}: {decision}"),
            }
        }
    }

    finish(report)
}

fn run_sync(context: &Context, opts: SyncOptions) -> Result<()> {
    let synchronizer = Synchronizer::new(&context.backup_dir);
    match opts.command {
        SyncCommand::ToRepo(select) => {
            let categories = context.table.select(&select.categories)?;
            finish(synchronizer.sync(SyncDirection::ToRepo, categories))
        }
        SyncCommand::FromRepo(select) => {
            let categories = context.table.select(&select.categories)?;
            finish(synchronizer.sync(SyncDirection::FromRepo, categories))
        }
        SyncCommand::Diff(diff) => run_diff(context, &synchronizer, diff),
        SyncCommand::Status => run_status(&context.repository),
    }
}

fn run_diff(context: &Context, synchronizer: &Synchronizer, opts: DiffOptions) -> Result<()> {
    let mut report = CategoryReport::new();
    for category in context.table.select(&opts.categories)? {
        let result = show_diff(synchronizer, category, opts.patch);
        if let Err(err) = &result {
            error!("failed to compare {}: {err:?}", category.name());
        }
        report.push(category.name(), result);
    }

    finish(report)
}

fn show_diff(synchronizer: &Synchronizer, category: &ConfigCategory, patch: bool) -> Result<()> {
    match synchronizer.diff(category)? {
        DiffOutcome::Identical => info!("{}: identical", category.name()),
        DiffOutcome::MissingDestination => warn!(
            "{}: nothing deployed at {:?}",
            category.name(),
            category.destination().display()
        ),
        DiffOutcome::MissingSource => warn!(
            "{}: nothing in repository at {:?}",
            category.name(),
            category.repo_path().display()
        ),
        DiffOutcome::Differs(changes) => {
            info!("{}: {} entries differ", category.name(), changes.len());
            print!("{changes}");
            if patch {
                print!("{}", synchronizer.patch(category, &changes)?);
            }
        }
    }

    Ok(())
}

fn run_status(repository: &Path) -> Result<()> {
    let entries = repository_status(repository)?;
    if entries.is_empty() {
        info!("repository at {:?} is clean", repository.display());
        return Ok(());
    }

    info!(
        "repository at {:?} has {} uncommitted changes",
        repository.display(),
        entries.len()
    );
    for entry in entries {
        println!("{:<10} {}", entry.change, entry.path.display());
    }

    Ok(())
}

fn run_backups(context: &Context, opts: BackupOptions) -> Result<()> {
    let mut found = 0;
    for category in context.table.select(&opts.categories)? {
        for backup in list_backups(category, &context.backup_dir)? {
            println!(
                "{:<10} {:<12} {}",
                backup.category,
                backup.timestamp,
                backup.path.display()
            );
            found += 1;
        }
    }

    if found == 0 {
        info!("no backups found");
    }

    Ok(())
}

fn run_list(context: &Context) -> Result<()> {
    info!("categories available on {}", context.table.platform());
    for category in context.table.iter() {
        println!(
            "{:<10} {:<10} {} -> {}",
            category.name(),
            category.kind(),
            category.repo_path().display(),
            category.destination().display()
        );
    }

    Ok(())
}

fn finish<T, E: Display>(report: CategoryReport<T, E>) -> Result<()> {
    let failed = report.failed();
    if failed.is_empty() {
        return Ok(());
    }

    let names = failed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    bail!("failed categories: {names}")
}

fn in_container() -> bool {
    Path::new("/.dockerenv").exists() || env::var_os("container").is_some()
}
