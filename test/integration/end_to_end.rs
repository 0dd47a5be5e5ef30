// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::Workspace;

use anyhow::Result;
use dotsync::{
    backup::FixedClock,
    category::CategoryName,
    deploy::{Deployer, DeploymentDecision},
    sync::{DiffOutcome, SyncDirection, SyncState, Synchronizer},
    tree::{identical, Excludes},
};
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;

#[sealed_test]
fn deploy_then_sync_editor() -> Result<()> {
    let workspace = Workspace::new()?;
    let editor = workspace.category(CategoryName::Editor, Excludes::none());
    workspace.write("repo/nvim/init.cfg", "A")?;

    let deployment = Deployer::with_clock(FixedClock(100)).deploy(&editor, false)?;
    assert_eq!(deployment.decision, DeploymentDecision::Install);
    assert_eq!(workspace.read("home/editor/init.cfg")?, "A");
    assert_eq!(workspace.deploy_backups(&editor)?.len(), 0);

    workspace.write("home/editor/init.cfg", "B")?;
    let deployment = Deployer::with_clock(FixedClock(200)).deploy(&editor, false)?;
    assert_eq!(deployment.decision, DeploymentDecision::Overwrite);
    assert_eq!(workspace.read("home/editor/init.cfg")?, "A");
    assert_eq!(workspace.read("home/editor.backup.200/init.cfg")?, "B");
    assert_eq!(workspace.deploy_backups(&editor)?.len(), 1);
    assert_eq!(workspace.read("repo/nvim/init.cfg")?, "A");

    let sync = Synchronizer::with_clock(workspace.backup_dir(), FixedClock(300));
    let report = sync.sync(SyncDirection::ToRepo, [&editor]);
    assert!(report.is_success());
    assert_eq!(workspace.read("repo/nvim/init.cfg")?, "A");

    workspace.write("home/editor/init.cfg", "C")?;
    let outcome = sync.to_repo(&editor)?;
    assert_eq!(outcome.state, SyncState::Synced);
    assert_eq!(workspace.read("repo/nvim/init.cfg")?, "C");

    Ok(())
}

#[sealed_test]
fn repeated_deploys_stay_silent() -> Result<()> {
    let workspace = Workspace::new()?;
    let editor = workspace.category(CategoryName::Editor, Excludes::none());
    let bashrc = workspace.category(CategoryName::Bashrc, Excludes::none());
    workspace.write("repo/nvim/init.lua", "vim.o.number = true")?;
    workspace.write("repo/nvim/lua/plugins.lua", "return {}")?;
    workspace.write("repo/shell/bashrc", "set -o vi\n")?;

    let deployer = Deployer::with_clock(FixedClock(100));
    let first = deployer.deploy_all([&editor, &bashrc], false);
    let second = deployer.deploy_all([&editor, &bashrc], false);
    assert!(first.is_success());

    let decisions = second
        .entries()
        .iter()
        .map(|(name, result)| (*name, result.as_ref().map(|d| d.decision).ok()))
        .collect::<Vec<_>>();
    let expect = vec![
        (CategoryName::Editor, Some(DeploymentDecision::Skip)),
        (CategoryName::Bashrc, Some(DeploymentDecision::Skip)),
    ];
    assert_eq!(decisions, expect);
    assert_eq!(workspace.deploy_backups(&editor)?.len(), 0);
    assert_eq!(workspace.deploy_backups(&bashrc)?.len(), 0);
    assert!(identical(editor.destination(), editor.repo_path()));
    assert!(identical(bashrc.destination(), bashrc.repo_path()));

    Ok(())
}

#[sealed_test]
fn pull_keeps_local_edits_and_diff_reports_them() -> Result<()> {
    let workspace = Workspace::new()?;
    let tmux = workspace.category(CategoryName::Tmux, Excludes::none());
    workspace.write("repo/tmux/tmux.conf", "set -g mouse on\n")?;
    workspace.write("repo/tmux/theme.conf", "set -g status-style bg=black\n")?;
    workspace.write("home/tmux/tmux.conf", "set -g mouse off\n")?;

    let sync = Synchronizer::with_clock(workspace.backup_dir(), FixedClock(400));
    let outcome = sync.from_repo(&tmux)?;
    assert_eq!(outcome.state, SyncState::Diverged);
    assert_eq!(workspace.read("home/tmux/tmux.conf")?, "set -g mouse off\n");
    assert_eq!(
        workspace.read("home/tmux/theme.conf")?,
        "set -g status-style bg=black\n"
    );
    assert_eq!(workspace.read("backups/tmux.400/tmux.conf")?, "set -g mouse off\n");

    let DiffOutcome::Differs(changes) = sync.diff(&tmux)? else {
        panic!("expected tmux to differ");
    };
    assert_eq!(changes.to_string(), "~ tmux.conf\n");

    Ok(())
}

#[sealed_test]
fn assistant_marketplaces_never_synced() -> Result<()> {
    let workspace = Workspace::new()?;
    let assistant = workspace.category(
        CategoryName::Assistant,
        Excludes::new(CategoryName::Assistant.default_excludes().iter().copied())?,
    );
    workspace.write("home/assistant/settings.json", "{}")?;
    workspace.write("home/assistant/plugins/marketplaces/tools/.git/HEAD", "ref: main")?;

    let sync = Synchronizer::with_clock(workspace.backup_dir(), FixedClock(500));
    sync.to_repo(&assistant)?;
    assert!(!workspace.repository().join("claude/plugins/marketplaces").exists());
    assert_eq!(sync.diff(&assistant)?, DiffOutcome::Identical);

    Ok(())
}
