use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "worktab")]
#[command(about = "Git worktree manager with iTerm2 integration", long_about = None)]
pub struct Args {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Without a command, pick a worktree interactively
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new worktree
    Create(CreateArgs),
    /// Close and remove a worktree
    Close(CloseArgs),
    /// List active worktrees
    List(ListArgs),
    /// Switch to a worktree's iTerm2 tab
    Switch(SwitchArgs),
    /// Open an existing worktree in iTerm2
    Open(OpenArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CreateArgs {
    /// Name for the new branch
    pub branch: String,

    /// Base branch (default: main/master)
    #[arg(short = 'b', long, conflicts_with = "from_current")]
    pub base: Option<String>,

    /// Branch from current branch instead of main/master
    #[arg(short = 'f', long)]
    pub from_current: bool,

    /// Custom path for worktree
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    /// How to open in iTerm2
    #[arg(short, long, value_enum)]
    pub open_mode: Option<OpenMode>,

    /// Don't open in iTerm2
    #[arg(long)]
    pub no_iterm: bool,

    /// Run Claude in the new tab
    #[arg(short, long)]
    pub claude: bool,

    /// Task description for Claude (ignored without --claude)
    #[arg(short, long)]
    pub task: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CloseArgs {
    /// Branch name or path of worktree
    pub worktree: String,

    /// Force removal
    #[arg(short, long)]
    pub force: bool,

    /// Also delete the branch
    #[arg(short, long)]
    pub delete_branch: bool,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,

    /// Don't check iTerm2 tabs
    #[arg(long)]
    pub no_iterm: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SwitchArgs {
    /// Branch name or path of worktree
    pub worktree: String,

    /// How to open if no tab exists
    #[arg(short, long, value_enum)]
    pub open_mode: Option<OpenMode>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct OpenArgs {
    /// Branch name or path of worktree
    pub worktree: String,

    /// How to open in iTerm2
    #[arg(short, long, value_enum)]
    pub open_mode: Option<OpenMode>,

    /// Open new tab even if already open
    #[arg(short, long)]
    pub force: bool,

    /// Run Claude in the tab
    #[arg(short, long)]
    pub claude: bool,

    /// Task description for Claude (ignored without --claude)
    #[arg(short, long)]
    pub task: Option<String>,
}

/// How a new terminal session is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    #[default]
    NewTab,
    NewWindow,
    NewPaneRight,
    NewPaneBelow,
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpenMode::NewTab => "new_tab",
            OpenMode::NewWindow => "new_window",
            OpenMode::NewPaneRight => "new_pane_right",
            OpenMode::NewPaneBelow => "new_pane_below",
        };
        f.write_str(name)
    }
}
