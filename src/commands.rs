use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use crate::cli::{CloseArgs, Command, CreateArgs, ListArgs, OpenArgs, OpenMode, SwitchArgs};
use crate::config::Config;
use crate::git::{Git, Worktree};
use crate::resolve::{normalize_path, resolve};
use crate::terminal::{Terminal, TerminalSession};

/// Everything a command needs: the repository, the terminal and settings.
pub struct Workspace<T: Terminal> {
    pub git: Git,
    pub terminal: T,
    pub config: Config,
}

impl<T: Terminal> Workspace<T> {
    pub fn new(git: Git, terminal: T, config: Config) -> Self {
        Self {
            git,
            terminal,
            config,
        }
    }

    fn open_mode(&self, requested: Option<OpenMode>) -> OpenMode {
        requested.unwrap_or(self.config.terminal.default_open_mode)
    }

    /// Find a worktree by branch, path or path suffix
    pub fn find_worktree(&self, token: &str) -> Result<Worktree> {
        let worktrees = self.git.list_worktrees()?;
        resolve(token, &worktrees)
            .cloned()
            .ok_or_else(|| anyhow!("Worktree '{}' not found", token))
    }
}

/// A worktree as printed by `list --json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedWorktree {
    #[serde(flatten)]
    pub worktree: Worktree,
    pub has_iterm_tab: bool,
}

/// Run one command and turn its outcome into an exit status.
pub fn execute<T: Terminal>(
    ws: &Workspace<T>,
    command: &Command,
    out: &mut impl Write,
    err: &mut impl Write,
) -> i32 {
    report(run(ws, command, out), err)
}

pub fn run<T: Terminal>(ws: &Workspace<T>, command: &Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Create(args) => create(ws, args, out),
        Command::Close(args) => close(ws, args, out),
        Command::List(args) => list(ws, args, out),
        Command::Switch(args) => switch(ws, args, out),
        Command::Open(args) => open(ws, args, out),
    }
}

/// Print `Error: <message>` for a failure. Returns 0 on success, 1 otherwise.
pub fn report(result: Result<()>, err: &mut impl Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            let _ = writeln!(err, "Error: {e:#}");
            1
        }
    }
}

/// Create a new worktree with a feature branch.
pub fn create<T: Terminal>(ws: &Workspace<T>, args: &CreateArgs, out: &mut impl Write) -> Result<()> {
    let repo_root = ws.git.repo_root()?;
    let branch = args.branch.as_str();

    let base = if args.from_current {
        let current = ws
            .git
            .current_branch()
            .ok_or_else(|| anyhow!("Could not determine current branch"))?;
        writeln!(out, "Branching from current branch: {current}")?;
        current
    } else if let Some(base) = &args.base {
        base.clone()
    } else {
        ws.git.default_branch()
    };

    let worktree_path = match &args.path {
        Some(path) => normalize_path(&ws.git.dir().join(path)),
        // Sibling of the repository, named after the branch
        None => repo_root.parent().unwrap_or(&repo_root).join(branch),
    };

    if ws.git.branch_exists(branch) {
        bail!("Branch '{}' already exists", branch);
    }

    if worktree_path.exists() {
        bail!("Path '{}' already exists", worktree_path.display());
    }

    writeln!(
        out,
        "Creating worktree at {} with branch {}...",
        worktree_path.display(),
        branch
    )?;
    ws.git.create_worktree(&worktree_path, branch, &base)?;

    if !args.no_iterm {
        let mode = ws.open_mode(args.open_mode);
        writeln!(out, "Opening in iTerm2 ({mode})...")?;
        let launch = args
            .claude
            .then(|| ws.config.assistant_launch(args.task.as_deref()));
        ws.terminal
            .open_session(&worktree_path, mode, launch.as_ref())?;
    }

    writeln!(out, "Worktree created successfully: {}", worktree_path.display())?;
    Ok(())
}

/// Close and remove a worktree.
///
/// Refuses to touch a worktree with uncommitted changes or unpushed commits
/// unless forced; nothing is removed when it refuses.
pub fn close<T: Terminal>(ws: &Workspace<T>, args: &CloseArgs, out: &mut impl Write) -> Result<()> {
    let target = ws.find_worktree(&args.worktree)?;

    if ws.git.has_uncommitted_changes(&target.path) {
        if !args.force {
            bail!("Worktree has uncommitted changes. Use --force to override.");
        }
        writeln!(out, "Warning: Forcing removal despite uncommitted changes")?;
    }

    if ws.git.has_unpushed_commits(&target.path) {
        if !args.force {
            bail!("Worktree has unpushed commits. Use --force to override.");
        }
        writeln!(out, "Warning: Forcing removal despite unpushed commits")?;
    }

    writeln!(out, "Removing worktree at {}...", target.path.display())?;
    ws.git.remove_worktree(&target.path, args.force)?;

    if args.delete_branch {
        if let Some(branch) = &target.branch {
            writeln!(out, "Deleting branch {branch}...")?;
            ws.git.delete_branch(branch, args.force);
        }
    }

    writeln!(out, "Worktree closed successfully")?;
    Ok(())
}

/// List all worktrees, marking the ones with an open terminal session.
pub fn list<T: Terminal>(ws: &Workspace<T>, args: &ListArgs, out: &mut impl Write) -> Result<()> {
    let worktrees = ws.git.list_worktrees()?;
    let sessions = if args.no_iterm {
        Vec::new()
    } else {
        ws.terminal.list_sessions().into_sessions()
    };

    let listed = annotate_sessions(worktrees, &sessions);

    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&listed)?)?;
        return Ok(());
    }

    writeln!(out, "Active Worktrees:")?;
    writeln!(out, "{}", "-".repeat(60))?;
    for entry in &listed {
        let branch = entry.worktree.branch.as_deref().unwrap_or("detached");
        let indicator = if entry.has_iterm_tab { " [iTerm]" } else { "" };
        writeln!(out, "  {}: {}{}", branch, entry.worktree.path.display(), indicator)?;
    }

    Ok(())
}

/// Pair each worktree with whether some session sits in its directory.
pub fn annotate_sessions(
    worktrees: Vec<Worktree>,
    sessions: &[TerminalSession],
) -> Vec<ListedWorktree> {
    let open: HashSet<PathBuf> = sessions
        .iter()
        .map(|session| normalize_path(&session.path))
        .collect();

    worktrees
        .into_iter()
        .map(|worktree| {
            let has_iterm_tab = open.contains(&normalize_path(&worktree.path));
            ListedWorktree {
                worktree,
                has_iterm_tab,
            }
        })
        .collect()
}

/// Focus the worktree's session, opening a new one if none exists.
pub fn switch<T: Terminal>(ws: &Workspace<T>, args: &SwitchArgs, out: &mut impl Write) -> Result<()> {
    let target = ws.find_worktree(&args.worktree)?;

    if ws.terminal.focus_session(&target.path) {
        writeln!(out, "Switched to worktree: {}", target.label())?;
        return Ok(());
    }

    writeln!(out, "No iTerm2 tab found for worktree. Opening new tab...")?;
    ws.terminal
        .open_session(&target.path, ws.open_mode(args.open_mode), None)?;
    Ok(())
}

/// Open an existing worktree, reusing its session unless forced.
pub fn open<T: Terminal>(ws: &Workspace<T>, args: &OpenArgs, out: &mut impl Write) -> Result<()> {
    let target = ws.find_worktree(&args.worktree)?;

    if !args.force && ws.terminal.focus_session(&target.path) {
        writeln!(out, "Worktree already open, switched to existing tab")?;
        return Ok(());
    }

    let launch = args
        .claude
        .then(|| ws.config.assistant_launch(args.task.as_deref()));
    ws.terminal
        .open_session(&target.path, ws.open_mode(args.open_mode), launch.as_ref())?;
    writeln!(out, "Opened worktree: {}", target.label())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worktree(path: &str, branch: Option<&str>) -> Worktree {
        Worktree {
            path: PathBuf::from(path),
            head: "abc".to_string(),
            branch: branch.map(str::to_string),
            ..Default::default()
        }
    }

    fn session(path: &str) -> TerminalSession {
        TerminalSession {
            window_id: "1".to_string(),
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn test_annotate_sessions_matches_normalized_paths() {
        let worktrees = vec![
            worktree("/w/main", Some("main")),
            worktree("/w/feature", Some("feature")),
            worktree("/w/other", None),
        ];
        let sessions = vec![session("/w/feature/"), session("/w/x/../main")];

        let listed = annotate_sessions(worktrees, &sessions);
        let flags: Vec<bool> = listed.iter().map(|l| l.has_iterm_tab).collect();
        assert_eq!(flags, vec![true, true, false]);
    }

    #[test]
    fn test_annotate_sessions_without_sessions() {
        let listed = annotate_sessions(vec![worktree("/w/main", Some("main"))], &[]);
        assert!(!listed[0].has_iterm_tab);
    }

    #[test]
    fn test_listed_worktree_json_field_names() {
        let listed = ListedWorktree {
            worktree: worktree("/w/main", Some("main")),
            has_iterm_tab: true,
        };
        let value = serde_json::to_value(&listed).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["bare", "branch", "detached", "has_iterm_tab", "head", "path"]);
        assert_eq!(value["path"], "/w/main");
    }

    #[test]
    fn test_report() {
        let mut err = Vec::new();
        assert_eq!(report(Ok(()), &mut err), 0);
        assert!(err.is_empty());

        assert_eq!(report(Err(anyhow!("Worktree 'x' not found")), &mut err), 1);
        assert_eq!(String::from_utf8(err).unwrap(), "Error: Worktree 'x' not found\n");
    }
}
