// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{RepoFixture, Workspace};

use anyhow::Result;
use dotsync::{
    backup::FixedClock,
    category::CategoryName,
    sync::{repository_status, FileChange, StatusEntry, Synchronizer},
    tree::Excludes,
};
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::path::PathBuf;

#[sealed_test]
fn push_to_repo_shows_up_as_uncommitted() -> Result<()> {
    let workspace = Workspace::new()?;
    let zshrc = workspace.category(CategoryName::Zshrc, Excludes::none());
    workspace.write("repo/shell/zshrc", "bindkey -v\n")?;
    let fixture = RepoFixture::new(workspace.repository())?;
    fixture.commit_all("chore: add zshrc")?;
    assert_eq!(repository_status(workspace.repository())?, vec![]);

    workspace.write("home/zshrc", "bindkey -e\n")?;
    Synchronizer::with_clock(workspace.backup_dir(), FixedClock(1)).to_repo(&zshrc)?;

    let result = repository_status(workspace.repository())?;
    let expect = vec![StatusEntry {
        path: PathBuf::from("shell/zshrc"),
        change: FileChange::Modified,
    }];
    assert_eq!(result, expect);

    Ok(())
}
