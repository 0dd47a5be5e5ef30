// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tree equality and structural diffing.
//!
//! Equality is the idempotency primitive shared by deployment and sync. Two
//! trees are identical when the same set of relative entry names exists under
//! both roots, and every pair of same-named files holds byte-equal content.
//! Anything that prevents comparison, e.g., a missing root, counts as "not
//! identical", because callers react the same way to both outcomes.

use crate::tree::{resolve, snapshot, EntryKind, Excludes, Result, TreeError};

use similar::TextDiff;
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Check if two trees hold identical content.
///
/// Symmetric and reflexive for any existing path. Returns false if either
/// path is missing or unreadable.
pub fn identical(a: impl AsRef<Path>, b: impl AsRef<Path>) -> bool {
    identical_excluding(a, b, &Excludes::none())
}

/// Check if two trees hold identical content, ignoring excluded entries.
pub fn identical_excluding(a: impl AsRef<Path>, b: impl AsRef<Path>, excludes: &Excludes) -> bool {
    match diff(a.as_ref(), b.as_ref(), excludes) {
        Ok(diff) => diff.is_empty(),
        Err(error) => {
            debug!("treat trees as different: {error}");
            false
        }
    }
}

/// Compute structural diff going from one tree to another.
///
/// Entries only found under `to` are reported as added, entries only found
/// under `from` are reported as removed. Only the topmost entry of an added
/// or removed subtree is reported. A file that became a directory, or the
/// other way around, is reported as changed.
///
/// # Errors
///
/// - Return [`TreeError::Read`] or [`TreeError::Walk`] if either tree cannot
///   be read.
pub fn diff(from: impl AsRef<Path>, to: impl AsRef<Path>, excludes: &Excludes) -> Result<TreeDiff> {
    let (from, to) = (from.as_ref(), to.as_ref());
    let left = snapshot(from, excludes)?;
    let right = snapshot(to, excludes)?;
    let mut result = TreeDiff::default();
    let mut collapsed: Option<PathBuf> = None;

    let paths = left.keys().chain(right.keys()).collect::<BTreeSet<_>>();
    for path in paths {
        // INVARIANT: Descendants of an already reported subtree are skipped.
        if let Some(root) = &collapsed {
            if path != root && path.starts_with(root) {
                continue;
            }
        }

        match (left.get(path), right.get(path)) {
            (Some(_), None) => {
                result.removed.push(path.clone());
                collapsed = Some(path.clone());
            }
            (None, Some(_)) => {
                result.added.push(path.clone());
                collapsed = Some(path.clone());
            }
            (Some(EntryKind::File), Some(EntryKind::File)) => {
                if !same_content(&resolve(from, path), &resolve(to, path))? {
                    result.changed.push(path.clone());
                }
            }
            (Some(EntryKind::Directory), Some(EntryKind::Directory)) => {}
            (Some(_), Some(_)) => {
                result.changed.push(path.clone());
                collapsed = Some(path.clone());
            }
            (None, None) => {}
        }
    }

    Ok(result)
}

/// Render unified line diff of every changed file in a tree diff.
///
/// Files that are not valid UTF-8 on either side are summarized as differing
/// binaries.
///
/// # Errors
///
/// - Return [`TreeError::Read`] if a changed file cannot be read.
pub fn unified_patch(
    from: impl AsRef<Path>,
    to: impl AsRef<Path>,
    diff: &TreeDiff,
) -> Result<String> {
    let (from, to) = (from.as_ref(), to.as_ref());
    let mut patch = String::new();

    for path in &diff.changed {
        let (old_path, new_path) = (resolve(from, path), resolve(to, path));

        // INVARIANT: Kind changes have no line diff to show.
        if !old_path.is_file() || !new_path.is_file() {
            patch.push_str(&format!("{} changed kind\n", display_relative(path)));
            continue;
        }

        let old = read(&old_path)?;
        let new = read(&new_path)?;
        match (String::from_utf8(old), String::from_utf8(new)) {
            (Ok(old), Ok(new)) => {
                let name = display_relative(path);
                let text_diff = TextDiff::from_lines(&old, &new);
                patch.push_str(
                    &text_diff
                        .unified_diff()
                        .context_radius(3)
                        .header(&format!("a/{name}"), &format!("b/{name}"))
                        .to_string(),
                );
            }
            _ => patch.push_str(&format!("binary files differ: {}\n", display_relative(path))),
        }
    }

    Ok(patch)
}

/// Structural difference between two trees.
///
/// All listings are sorted. The empty path names the tree root itself.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeDiff {
    /// Entries only present in the second tree.
    pub added: Vec<PathBuf>,

    /// Entries only present in the first tree.
    pub removed: Vec<PathBuf>,

    /// Entries present in both trees with different content or kind.
    pub changed: Vec<PathBuf>,
}

impl TreeDiff {
    /// Check if trees were found to be identical.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Total number of differing entries.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

impl Display for TreeDiff {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let mut lines = Vec::with_capacity(self.len());
        lines.extend(self.added.iter().map(|path| ('+', path)));
        lines.extend(self.removed.iter().map(|path| ('-', path)));
        lines.extend(self.changed.iter().map(|path| ('~', path)));
        lines.sort_by(|(_, a), (_, b)| a.cmp(b));

        for (marker, path) in lines {
            writeln!(fmt, "{marker} {}", display_relative(path))?;
        }

        Ok(())
    }
}

fn display_relative(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        ".".into()
    } else {
        path.display().to_string()
    }
}

fn same_content(a: &Path, b: &Path) -> Result<bool> {
    let len_a = fs::metadata(a).map_err(|err| read_error(err, a))?.len();
    let len_b = fs::metadata(b).map_err(|err| read_error(err, b))?.len();
    if len_a != len_b {
        return Ok(false);
    }

    Ok(read(a)? == read(b)?)
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|err| read_error(err, path))
}

fn read_error(source: std::io::Error, path: &Path) -> TreeError {
    TreeError::Read {
        source,
        path: path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    fn write_tree(root: &str, files: &[(&str, &str)]) -> anyhow::Result<()> {
        fs::create_dir_all(root)?;
        for (path, contents) in files {
            let path = Path::new(root).join(path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, contents)?;
        }

        Ok(())
    }

    #[sealed_test]
    fn identical_is_reflexive_and_symmetric() -> anyhow::Result<()> {
        write_tree("a", &[("init.lua", "A"), ("lua/opts.lua", "B")])?;
        write_tree("b", &[("init.lua", "A"), ("lua/opts.lua", "B")])?;
        write_tree("c", &[("init.lua", "A"), ("lua/opts.lua", "C")])?;

        assert!(identical("a", "a"));
        assert!(identical("a", "b"));
        assert!(identical("b", "a"));
        assert!(!identical("a", "c"));
        assert!(!identical("c", "a"));

        Ok(())
    }

    #[cfg(unix)]
    #[sealed_test]
    fn identical_survives_link_to_ancestor() -> anyhow::Result<()> {
        write_tree("a", &[("sub/init.lua", "A")])?;
        std::os::unix::fs::symlink("..", "a/sub/up")?;

        assert!(identical("a", "a"));
        assert_eq!(diff("a", "a", &Excludes::none())?, TreeDiff::default());

        Ok(())
    }

    #[sealed_test]
    fn identical_detects_one_sided_entries() -> anyhow::Result<()> {
        write_tree("a", &[("init.lua", "A")])?;
        write_tree("b", &[("init.lua", "A"), ("extra.lua", "")])?;
        fs::create_dir_all("c/empty")?;
        fs::write("c/init.lua", "A")?;

        assert!(!identical("a", "b"));
        assert!(!identical("a", "c"));

        Ok(())
    }

    #[sealed_test]
    fn identical_degrades_to_false_when_missing() -> anyhow::Result<()> {
        write_tree("a", &[("init.lua", "A")])?;

        assert!(!identical("a", "missing"));
        assert!(!identical("missing", "a"));
        assert!(!identical("missing", "missing"));

        Ok(())
    }

    #[sealed_test]
    fn identical_single_files() -> anyhow::Result<()> {
        fs::write("bashrc.repo", "export EDITOR=nvim\n")?;
        fs::write("bashrc.home", "export EDITOR=nvim\n")?;
        fs::write("bashrc.edit", "export EDITOR=vim\n")?;
        write_tree("dir", &[("bashrc", "export EDITOR=nvim\n")])?;

        assert!(identical("bashrc.repo", "bashrc.home"));
        assert!(!identical("bashrc.repo", "bashrc.edit"));
        assert!(!identical("bashrc.repo", "dir"));

        Ok(())
    }

    #[sealed_test]
    fn identical_excluding_ignores_excluded_entries() -> anyhow::Result<()> {
        write_tree("repo", &[("settings.json", "{}")])?;
        write_tree(
            "home",
            &[
                ("settings.json", "{}"),
                ("plugins/marketplaces/official/README.md", "external"),
            ],
        )?;
        let excludes = Excludes::new(["plugins/marketplaces"])?;

        // INVARIANT: Empty "plugins" directory still differs.
        assert!(!identical_excluding("repo", "home", &excludes));
        fs::create_dir_all("repo/plugins")?;
        assert!(identical_excluding("repo", "home", &excludes));
        assert!(!identical("repo", "home"));

        Ok(())
    }

    #[sealed_test]
    fn diff_reports_topmost_entries() -> anyhow::Result<()> {
        write_tree(
            "repo",
            &[
                ("init.lua", "A"),
                ("lua/old/one.lua", "1"),
                ("lua/old/two.lua", "2"),
                ("lua/opts.lua", "x"),
            ],
        )?;
        write_tree(
            "home",
            &[
                ("init.lua", "B"),
                ("lua/new/one.lua", "1"),
                ("lua/opts.lua", "x"),
            ],
        )?;

        let result = diff("repo", "home", &Excludes::none())?;
        let expect = TreeDiff {
            added: vec![PathBuf::from("lua/new")],
            removed: vec![PathBuf::from("lua/old")],
            changed: vec![PathBuf::from("init.lua")],
        };
        assert_eq!(result, expect);

        let expect = indoc! {r#"
            ~ init.lua
            + lua/new
            - lua/old
        "#};
        assert_eq!(result.to_string(), expect);

        Ok(())
    }

    #[sealed_test]
    fn diff_reports_kind_change_once() -> anyhow::Result<()> {
        write_tree("repo", &[("lua/opts.lua", "x")])?;
        write_tree("home", &[("lua", "not a directory")])?;

        let result = diff("repo", "home", &Excludes::none())?;
        let expect = TreeDiff {
            added: vec![],
            removed: vec![],
            changed: vec![PathBuf::from("lua")],
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test]
    fn unified_patch_of_changed_text_file() -> anyhow::Result<()> {
        write_tree("repo", &[("init.lua", "set number\nset ruler\n")])?;
        write_tree("home", &[("init.lua", "set number\nset list\n")])?;

        let changes = diff("repo", "home", &Excludes::none())?;
        let result = unified_patch("repo", "home", &changes)?;
        let expect = indoc! {r#"
            --- a/init.lua
            +++ b/init.lua
            @@ -1,2 +1,2 @@
             set number
            -set ruler
            +set list
        "#};
        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test]
    fn unified_patch_of_binary_file() -> anyhow::Result<()> {
        fs::create_dir_all("repo")?;
        fs::create_dir_all("home")?;
        fs::write("repo/font.bin", [0xff, 0xfe, 0x00])?;
        fs::write("home/font.bin", [0xff, 0xfd, 0x00])?;

        let changes = diff("repo", "home", &Excludes::none())?;
        let result = unified_patch("repo", "home", &changes)?;
        assert_eq!(result, "binary files differ: font.bin\n");

        Ok(())
    }
}
