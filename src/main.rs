use anyhow::Result;
use clap::Parser;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use worktab::cli::{Args, OpenArgs, SwitchArgs};
use worktab::commands::{self, Workspace};
use worktab::iterm::ITerm;
use worktab::tui::{self, Selection};
use worktab::{Config, Git};

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut stdout = io::stdout();
    let status = commands::report(run(args, &mut stdout), &mut io::stderr());
    ExitCode::from(u8::try_from(status).unwrap_or(1))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(args: Args, out: &mut impl Write) -> Result<()> {
    let config = Config::load()?;
    let terminal = ITerm::new(config.terminal.app.clone());
    let ws = Workspace::new(Git::current()?, terminal, config);

    let Some(command) = args.command else {
        // Show the picker, then act on the choice once the screen is restored
        return match tui::run(&ws)? {
            Some(Selection::Switch(path)) => {
                let args = SwitchArgs {
                    worktree: path.to_string_lossy().into_owned(),
                    open_mode: None,
                };
                commands::switch(&ws, &args, out)
            }
            Some(Selection::Open(path)) => {
                let args = OpenArgs {
                    worktree: path.to_string_lossy().into_owned(),
                    open_mode: None,
                    force: true,
                    claude: false,
                    task: None,
                };
                commands::open(&ws, &args, out)
            }
            None => Ok(()),
        };
    };

    commands::run(&ws, &command, out)
}
