// Library interface for worktab
// This allows integration tests to drive commands against a fake terminal

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod git;
pub mod iterm;
pub mod quoting;
pub mod resolve;
pub mod terminal;
pub mod tui;

// Re-export commonly used types for convenience
pub use cli::OpenMode;
pub use commands::Workspace;
pub use config::Config;
pub use error::Error;
pub use git::{Git, Worktree};
pub use terminal::{SessionListing, Terminal, TerminalSession};
