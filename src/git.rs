use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

const HEADS_PREFIX: &str = "refs/heads/";
const ORIGIN_HEAD: &str = "refs/remotes/origin/HEAD";
const ORIGIN_PREFIX: &str = "refs/remotes/origin/";

/// One entry of `git worktree list --porcelain`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worktree {
    pub path: PathBuf,
    pub head: String,
    pub branch: Option<String>,
    pub bare: bool,
    pub detached: bool,
}

impl Worktree {
    /// Branch name, or the path when HEAD is detached.
    pub fn label(&self) -> String {
        match &self.branch {
            Some(branch) => branch.clone(),
            None => self.path.display().to_string(),
        }
    }
}

/// Handle on the `git` binary, scoped to a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
}

impl Git {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Git scoped to the process working directory
    pub fn current() -> anyhow::Result<Self> {
        let dir = std::env::current_dir()?;
        Ok(Self::new(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get list of all git worktrees
    pub fn list_worktrees(&self) -> Result<Vec<Worktree>> {
        let stdout = run_checked(&self.dir, ["worktree", "list", "--porcelain"])?;
        Ok(parse_worktrees(&stdout))
    }

    /// Top level of the repository the handle points into
    pub fn repo_root(&self) -> Result<PathBuf> {
        let stdout = run_checked(&self.dir, ["rev-parse", "--show-toplevel"])?;
        Ok(PathBuf::from(stdout.trim()))
    }

    /// True iff a local branch with exactly this name exists.
    pub fn branch_exists(&self, name: &str) -> bool {
        let reference = format!("{HEADS_PREFIX}{name}");
        run(&self.dir, ["show-ref", "--verify", "--quiet", reference.as_str()])
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Best guess at the repository's primary branch.
    ///
    /// See [`resolve_default_branch`] for the fallback order.
    pub fn default_branch(&self) -> String {
        let remote_head = run(&self.dir, ["symbolic-ref", ORIGIN_HEAD])
            .ok()
            .filter(|output| output.status.success())
            .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string());

        resolve_default_branch(remote_head.as_deref(), |name| self.branch_exists(name))
    }

    /// Branch checked out in the handle's directory, `None` when detached.
    pub fn current_branch(&self) -> Option<String> {
        let output = run(&self.dir, ["rev-parse", "--abbrev-ref", "HEAD"]).ok()?;
        if !output.status.success() {
            return None;
        }

        let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if branch.is_empty() || branch == "HEAD" {
            None
        } else {
            Some(branch)
        }
    }

    /// Whether `git status` reports anything in the worktree at `path`.
    pub fn has_uncommitted_changes(&self, path: &Path) -> bool {
        match run(path, ["status", "--porcelain"]) {
            Ok(output) if output.status.success() => !output.stdout.trim_ascii().is_empty(),
            Ok(output) => {
                warn!(
                    path = %path.display(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "git status failed, assuming clean"
                );
                false
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "git status failed, assuming clean");
                false
            }
        }
    }

    /// Whether the branch in `path` has commits its upstream lacks.
    ///
    /// A branch with no upstream configured reports `false`. That cannot be
    /// told apart from "upstream configured and up to date", so a local-only
    /// branch full of work looks the same as a pushed one.
    pub fn has_unpushed_commits(&self, path: &Path) -> bool {
        match run(path, ["log", "@{u}..", "--oneline"]) {
            Ok(output) if output.status.success() => !output.stdout.trim_ascii().is_empty(),
            Ok(_) => {
                debug!(path = %path.display(), "no upstream configured");
                false
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "git log failed");
                false
            }
        }
    }

    /// Create a worktree at `path` on a new branch forked from `base`.
    pub fn create_worktree(&self, path: &Path, branch: &str, base: &str) -> Result<()> {
        let args: [&OsStr; 6] = [
            "worktree".as_ref(),
            "add".as_ref(),
            "-b".as_ref(),
            branch.as_ref(),
            path.as_os_str(),
            base.as_ref(),
        ];
        run_checked(&self.dir, args)?;
        info!(path = %path.display(), branch, base, "worktree created");
        Ok(())
    }

    pub fn remove_worktree(&self, path: &Path, force: bool) -> Result<()> {
        let mut args: Vec<&OsStr> = vec!["worktree".as_ref(), "remove".as_ref()];
        if force {
            args.push("--force".as_ref());
        }
        args.push(path.as_os_str());

        run_checked(&self.dir, args)?;
        info!(path = %path.display(), force, "worktree removed");
        Ok(())
    }

    /// Delete a local branch. Failure is logged and otherwise ignored.
    pub fn delete_branch(&self, name: &str, force: bool) {
        let flag = if force { "-D" } else { "-d" };
        match run_checked(&self.dir, ["branch", flag, name]) {
            Ok(_) => info!(branch = name, "branch deleted"),
            Err(e) => warn!(branch = name, error = %e, "could not delete branch"),
        }
    }
}

/// Pick the default branch from, in order: the remote's HEAD pointer, a
/// local `main`, a local `master`, and finally the literal `main`.
pub fn resolve_default_branch(
    remote_head: Option<&str>,
    local_exists: impl Fn(&str) -> bool,
) -> String {
    if let Some(branch) = remote_head
        .map(|head| head.trim())
        .map(|head| head.strip_prefix(ORIGIN_PREFIX).unwrap_or(head))
        .filter(|branch| !branch.is_empty())
    {
        return branch.to_string();
    }

    ["main", "master"]
        .into_iter()
        .find(|candidate| local_exists(candidate))
        .unwrap_or("main")
        .to_string()
}

/// Parse `git worktree list --porcelain` output.
pub fn parse_worktrees(output: &str) -> Vec<Worktree> {
    let mut worktrees = Vec::new();
    let mut current: Option<Worktree> = None;

    for line in output.lines() {
        if line.is_empty() {
            worktrees.extend(current.take().filter(|wt| !wt.path.as_os_str().is_empty()));
            continue;
        }

        let wt = current.get_or_insert_with(Worktree::default);
        if let Some(path) = line.strip_prefix("worktree ") {
            wt.path = PathBuf::from(path);
        } else if let Some(head) = line.strip_prefix("HEAD ") {
            wt.head = head.to_string();
        } else if let Some(reference) = line.strip_prefix("branch ") {
            let branch = reference.strip_prefix(HEADS_PREFIX).unwrap_or(reference);
            wt.branch = Some(branch.to_string());
        } else if line == "bare" {
            wt.bare = true;
        } else if line == "detached" {
            wt.detached = true;
        }
    }

    // Handle the last worktree if there's no trailing empty line
    worktrees.extend(current.filter(|wt| !wt.path.as_os_str().is_empty()));

    worktrees
}

fn run<I, S>(dir: &Path, args: I) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    debug!(dir = %dir.display(), ?args, "running git");

    Command::new("git")
        .args(&args)
        .current_dir(dir)
        .output()
        .map_err(|e| Error::Vcs(format!("failed to execute git: {e}")))
}

fn run_checked<I, S>(dir: &Path, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = run(dir, args)?;

    if !output.status.success() {
        return Err(Error::Vcs(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_worktrees() {
        let output = r#"worktree /Users/test/project
HEAD 1234567890abcdef
branch refs/heads/main

worktree /Users/test/project-feature
HEAD abcdef1234567890
branch refs/heads/feature

"#;

        let worktrees = parse_worktrees(output);
        assert_eq!(worktrees.len(), 2);
        assert_eq!(worktrees[0].path, PathBuf::from("/Users/test/project"));
        assert_eq!(worktrees[0].head, "1234567890abcdef");
        assert_eq!(worktrees[0].branch.as_deref(), Some("main"));
        assert_eq!(worktrees[1].path, PathBuf::from("/Users/test/project-feature"));
        assert_eq!(worktrees[1].branch.as_deref(), Some("feature"));
    }

    #[test]
    fn test_parse_without_trailing_blank_line() {
        let output = "worktree /a\nHEAD 111\nbranch refs/heads/a\n\nworktree /b\nHEAD 222\nbranch refs/heads/b";

        let worktrees = parse_worktrees(output);
        assert_eq!(worktrees.len(), 2);
        assert_eq!(worktrees[1].branch.as_deref(), Some("b"));
    }

    #[test]
    fn test_parse_extra_blank_lines_do_not_add_records() {
        let output = "\nworktree /a\nHEAD 111\n\n\n\nworktree /b\nHEAD 222\n\n\n";

        assert_eq!(parse_worktrees(output).len(), 2);
    }

    #[test]
    fn test_parse_strips_heads_prefix_once() {
        let output = "worktree /a\nHEAD 1\nbranch refs/heads/feature/x\n";

        let worktrees = parse_worktrees(output);
        assert_eq!(worktrees[0].branch.as_deref(), Some("feature/x"));
    }

    #[test]
    fn test_parse_bare_and_detached() {
        let output = r#"worktree /repo.git
bare

worktree /repo-detached
HEAD deadbeef
detached
locked reason here

"#;

        let worktrees = parse_worktrees(output);
        assert_eq!(worktrees.len(), 2);
        assert!(worktrees[0].bare);
        assert!(!worktrees[0].detached);
        assert_eq!(worktrees[0].head, "");
        assert_eq!(worktrees[0].branch, None);
        assert!(worktrees[1].detached);
        assert_eq!(worktrees[1].branch, None);
        assert_eq!(worktrees[1].label(), "/repo-detached");
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_worktrees("").is_empty());
    }

    #[test]
    fn test_default_branch_prefers_remote_head() {
        let branch = resolve_default_branch(Some("refs/remotes/origin/develop\n"), |_| true);
        assert_eq!(branch, "develop");
    }

    #[test]
    fn test_default_branch_falls_back_to_main_then_master() {
        assert_eq!(resolve_default_branch(None, |name| name == "main"), "main");
        assert_eq!(resolve_default_branch(None, |name| name == "master"), "master");
        assert_eq!(resolve_default_branch(None, |_| true), "main");
    }

    #[test]
    fn test_default_branch_checks_main_before_master() {
        let checked = std::cell::RefCell::new(Vec::new());
        let branch = resolve_default_branch(None, |name| {
            checked.borrow_mut().push(name.to_string());
            false
        });

        assert_eq!(branch, "main");
        assert_eq!(*checked.borrow(), vec!["main", "master"]);
    }

    #[test]
    fn test_default_branch_ignores_empty_remote_head() {
        assert_eq!(resolve_default_branch(Some("  "), |name| name == "master"), "master");
    }
}
