//! Quoting for commands typed into a terminal through AppleScript.
//!
//! A command reaches the shell through two layers: it is written as a
//! POSIX shell command line, and that line is then embedded in an
//! AppleScript string literal passed to `write text`. Each layer has its own
//! escaping rules and both must be applied, innermost first.

use std::path::Path;

use crate::error::{Error, Result};

/// Quote `arg` as a single POSIX shell word.
///
/// Fails only for arguments containing a NUL byte, which no shell word can
/// carry.
pub fn shell_quote(arg: &str) -> Result<String> {
    shlex::try_quote(arg)
        .map(|quoted| quoted.into_owned())
        .map_err(|e| Error::Automation(format!("cannot quote {arg:?} for the shell: {e}")))
}

/// Render `text` as an AppleScript string literal, quotes included.
pub fn applescript_string(text: &str) -> String {
    let mut literal = String::with_capacity(text.len() + 2);
    literal.push('"');
    for c in text.chars() {
        match c {
            '\\' => literal.push_str("\\\\"),
            '"' => literal.push_str("\\\""),
            _ => literal.push(c),
        }
    }
    literal.push('"');
    literal
}

/// Shell line that enters `path` and, if given, runs `program` with `args`.
pub fn session_command(path: &Path, program: Option<(&str, &[String])>) -> Result<String> {
    let mut command = format!("cd {}", shell_quote(&path.to_string_lossy())?);

    if let Some((program, args)) = program {
        command.push_str(" && ");
        command.push_str(program);
        for arg in args {
            command.push(' ');
            command.push_str(&shell_quote(arg)?);
        }
    }

    Ok(command)
}
