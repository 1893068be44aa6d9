use std::path::{Path, PathBuf};

use crate::cli::OpenMode;
use crate::error::Result;

/// A terminal tab, window or pane and the directory it was last seen in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalSession {
    pub window_id: String,
    pub path: PathBuf,
}

/// Outcome of asking the terminal for its sessions.
///
/// `Found` with an empty vector means the terminal answered and has nothing
/// open; `Unavailable` means it could not be asked at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionListing {
    Found(Vec<TerminalSession>),
    Unavailable { reason: String },
}

impl SessionListing {
    /// Best-effort view: a failed query is treated as no sessions.
    pub fn into_sessions(self) -> Vec<TerminalSession> {
        match self {
            SessionListing::Found(sessions) => sessions,
            SessionListing::Unavailable { .. } => Vec::new(),
        }
    }
}

/// Program to start in a freshly opened session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantLaunch {
    pub program: String,
    pub allowed_tools: Vec<String>,
    pub task: Option<String>,
}

impl AssistantLaunch {
    /// Arguments passed after the program name.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if !self.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(self.allowed_tools.join(","));
        }
        if let Some(task) = &self.task {
            args.push(task.clone());
        }
        args
    }
}

/// Scripting surface of the terminal application.
pub trait Terminal {
    /// Open a new session in `path`, optionally starting the assistant.
    fn open_session(
        &self,
        path: &Path,
        mode: OpenMode,
        launch: Option<&AssistantLaunch>,
    ) -> Result<()>;

    fn list_sessions(&self) -> SessionListing;

    /// Bring the session whose directory is `path` to the front.
    ///
    /// Returns `false`, and touches nothing, when no session matches.
    fn focus_session(&self, path: &Path) -> bool;
}
