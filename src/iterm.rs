use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

use crate::cli::OpenMode;
use crate::error::{Error, Result};
use crate::quoting::{applescript_string, session_command};
use crate::resolve::normalize_path;
use crate::terminal::{AssistantLaunch, SessionListing, Terminal, TerminalSession};

pub const DEFAULT_APP: &str = "iTerm2";

/// iTerm2 driven through `osascript`.
#[derive(Debug, Clone)]
pub struct ITerm {
    app: String,
}

impl Default for ITerm {
    fn default() -> Self {
        Self::new(DEFAULT_APP)
    }
}

impl ITerm {
    pub fn new(app: impl Into<String>) -> Self {
        Self { app: app.into() }
    }
}

impl Terminal for ITerm {
    fn open_session(
        &self,
        path: &Path,
        mode: OpenMode,
        launch: Option<&AssistantLaunch>,
    ) -> Result<()> {
        let command = launch_command(path, launch)?;
        run_script(&open_script(&self.app, mode, &command))?;
        info!(path = %path.display(), mode = %mode, "session opened");
        Ok(())
    }

    fn list_sessions(&self) -> SessionListing {
        match run_script(&list_script(&self.app)) {
            Ok(stdout) => SessionListing::Found(parse_session_lines(&stdout)),
            Err(e) => {
                debug!(error = %e, "session listing unavailable");
                SessionListing::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn focus_session(&self, path: &Path) -> bool {
        let target = normalize_path(path);
        match run_script(&focus_script(&self.app, &target)) {
            Ok(stdout) => stdout.trim() == "found",
            Err(e) => {
                warn!(path = %target.display(), error = %e, "could not search sessions");
                false
            }
        }
    }
}

/// Shell line typed into a new session: `cd` into `path`, then start the
/// assistant if one is requested.
pub fn launch_command(path: &Path, launch: Option<&AssistantLaunch>) -> Result<String> {
    match launch {
        Some(launch) => {
            let args = launch.args();
            session_command(path, Some((launch.program.as_str(), &args)))
        }
        None => session_command(path, None),
    }
}

/// Script that opens a session per `mode` and types `command` into it.
pub fn open_script(app: &str, mode: OpenMode, command: &str) -> String {
    let app = applescript_string(app);
    let command = applescript_string(command);

    match mode {
        OpenMode::NewTab => format!(
            r#"tell application {app}
    if (count of windows) is 0 then
        create window with default profile
    else
        tell current window
            create tab with default profile
        end tell
    end if
    tell current session of current window
        write text {command}
    end tell
    activate
end tell"#
        ),
        OpenMode::NewWindow => format!(
            r#"tell application {app}
    create window with default profile
    tell current session of current window
        write text {command}
    end tell
    activate
end tell"#
        ),
        OpenMode::NewPaneRight | OpenMode::NewPaneBelow => {
            let split = if mode == OpenMode::NewPaneRight {
                "split vertically"
            } else {
                "split horizontally"
            };
            format!(
                r#"tell application {app}
    tell current session of current window
        set newSession to ({split} with default profile)
        tell newSession
            write text {command}
        end tell
    end tell
    activate
end tell"#
            )
        }
    }
}

/// Script printing one `<window id>\t<path>` line per session.
pub fn list_script(app: &str) -> String {
    let app = applescript_string(app);
    format!(
        r#"set sep to ASCII character 9
set output to ""
tell application {app}
    repeat with w in windows
        set windowId to (id of w) as text
        repeat with t in tabs of w
            repeat with s in sessions of t
                try
                    set sessionPath to variable named "session.path" in s
                    set output to output & windowId & sep & sessionPath & linefeed
                end try
            end repeat
        end repeat
    end repeat
end tell
return output"#
    )
}

/// Script that selects the first session in `target` and prints `found`,
/// or prints `not_found`.
pub fn focus_script(app: &str, target: &Path) -> String {
    let app = applescript_string(app);
    let target = applescript_string(&target.to_string_lossy());
    format!(
        r#"tell application {app}
    repeat with w in windows
        repeat with t in tabs of w
            repeat with s in sessions of t
                try
                    set sessionPath to variable named "session.path" in s
                    if sessionPath is equal to {target} then
                        select w
                        select t
                        select s
                        activate
                        return "found"
                    end if
                end try
            end repeat
        end repeat
    end repeat
    return "not_found"
end tell"#
    )
}

/// Parse the output of [`list_script`]; malformed lines are skipped.
pub fn parse_session_lines(output: &str) -> Vec<TerminalSession> {
    output
        .lines()
        .filter_map(|line| {
            let (window_id, path) = line.split_once('\t')?;
            let window_id = window_id.trim();
            if window_id.is_empty() || path.is_empty() {
                return None;
            }
            Some(TerminalSession {
                window_id: window_id.to_string(),
                path: PathBuf::from(path),
            })
        })
        .collect()
}

fn run_script(script: &str) -> Result<String> {
    debug!(script, "running osascript");
    let output = Command::new("osascript")
        .arg("-e")
        .arg(script)
        .output()
        .map_err(|e| Error::Automation(format!("failed to execute osascript: {e}")))?;

    if !output.status.success() {
        return Err(Error::Automation(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claude(task: Option<&str>) -> AssistantLaunch {
        AssistantLaunch {
            program: "claude".to_string(),
            allowed_tools: vec!["Bash".to_string(), "Read".to_string()],
            task: task.map(str::to_string),
        }
    }

    #[test]
    fn test_launch_command_without_assistant() {
        let command = launch_command(Path::new("/w/feature x"), None).unwrap();
        assert_eq!(command, "cd '/w/feature x'");
    }

    #[test]
    fn test_launch_command_with_task() {
        let task = r#"fix the "login" bug; don't touch $HOME"#;
        let launch = claude(Some(task));
        let command = launch_command(Path::new("/w/feature x"), Some(&launch)).unwrap();

        assert!(command.starts_with("cd '/w/feature x' && claude --allowedTools Bash,Read "));
        assert_eq!(
            shlex::split(&command).unwrap(),
            vec!["cd", "/w/feature x", "&&", "claude", "--allowedTools", "Bash,Read", task]
        );
    }

    #[test]
    fn test_launch_command_without_task() {
        let launch = claude(None);
        let command = launch_command(Path::new("/w/a"), Some(&launch)).unwrap();
        assert_eq!(command, "cd /w/a && claude --allowedTools Bash,Read");
    }

    #[test]
    fn test_launch_command_rejects_nul() {
        let launch = claude(Some("bad\0task"));
        let err = launch_command(Path::new("/w/a"), Some(&launch)).unwrap_err();
        assert!(matches!(err, Error::Automation(_)));
    }

    #[test]
    fn test_open_script_new_tab() {
        let script = open_script("iTerm2", OpenMode::NewTab, "cd '/w/a'");
        assert!(script.starts_with("tell application \"iTerm2\""));
        assert!(script.contains("create tab with default profile"));
        assert!(script.contains("create window with default profile"));
        assert!(script.contains("write text \"cd '/w/a'\""));
    }

    #[test]
    fn test_open_script_modes() {
        let window = open_script("iTerm2", OpenMode::NewWindow, "cd '/w'");
        assert!(window.contains("create window with default profile"));
        assert!(!window.contains("create tab"));

        let right = open_script("iTerm2", OpenMode::NewPaneRight, "cd '/w'");
        assert!(right.contains("split vertically with default profile"));

        let below = open_script("iTerm2", OpenMode::NewPaneBelow, "cd '/w'");
        assert!(below.contains("split horizontally with default profile"));
    }

    #[test]
    fn test_open_script_escapes_command() {
        let script = open_script("iTerm2", OpenMode::NewTab, r#"echo "hi" \ there"#);
        assert!(script.contains(r#"write text "echo \"hi\" \\ there""#));
    }

    #[test]
    fn test_focus_script_escapes_target() {
        let script = focus_script("iTerm2", Path::new(r#"/w/"odd""#));
        assert!(script.contains(r#"is equal to "/w/\"odd\"""#));
        assert!(script.contains("return \"not_found\""));
    }

    #[test]
    fn test_list_script_uses_custom_app() {
        let script = list_script("iTerm");
        assert!(script.contains("tell application \"iTerm\""));
        assert!(script.contains("variable named \"session.path\""));
    }

    #[test]
    fn test_parse_session_lines() {
        let output = "1234\t/Users/dev/app\n1234\t/Users/dev/app, with comma\n\nbroken line\n99\t\n\t/orphan\n";

        let sessions = parse_session_lines(output);
        assert_eq!(
            sessions,
            vec![
                TerminalSession {
                    window_id: "1234".to_string(),
                    path: PathBuf::from("/Users/dev/app"),
                },
                TerminalSession {
                    window_id: "1234".to_string(),
                    path: PathBuf::from("/Users/dev/app, with comma"),
                },
            ]
        );
    }

    #[test]
    fn test_parse_session_lines_empty() {
        assert!(parse_session_lines("").is_empty());
        assert!(parse_session_lines("\n").is_empty());
    }
}
