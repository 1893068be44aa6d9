use thiserror::Error;

/// Failures from the two external processes this tool drives.
///
/// Both variants carry the raw diagnostic text of the failed subprocess.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Vcs(String),

    #[error("iTerm2 automation failed: {0}")]
    Automation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
