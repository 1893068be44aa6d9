use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::OpenMode;
use crate::iterm::DEFAULT_APP;
use crate::terminal::AssistantLaunch;

/// Environment variable pointing at an alternative config file
pub const CONFIG_ENV: &str = "WORKTAB_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Application name used in `tell application`
    #[serde(default = "default_app")]
    pub app: String,
    #[serde(default)]
    pub default_open_mode: OpenMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_command")]
    pub command: String,
    #[serde(default = "default_allowed_tools")]
    pub allowed_tools: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

fn default_app() -> String {
    DEFAULT_APP.to_string()
}

fn default_assistant_command() -> String {
    "claude".to_string()
}

fn default_allowed_tools() -> Vec<String> {
    ["Bash", "Read", "Write", "Edit", "Glob", "Grep", "WebFetch", "WebSearch"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            app: default_app(),
            default_open_mode: OpenMode::default(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            command: default_assistant_command(),
            allowed_tools: default_allowed_tools(),
        }
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults
    /// when no file exists. The file is never created.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("worktab");

        Ok(config_dir.join("config.toml"))
    }

    /// What to start in a new session when the assistant is requested
    pub fn assistant_launch(&self, task: Option<&str>) -> AssistantLaunch {
        AssistantLaunch {
            program: self.assistant.command.clone(),
            allowed_tools: self.assistant.allowed_tools.clone(),
            task: task.map(str::to_string),
        }
    }
}
