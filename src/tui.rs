use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame, Terminal as Screen,
};
use std::io;
use std::path::{Path, PathBuf};

use crate::commands::{annotate_sessions, ListedWorktree, Workspace};
use crate::resolve::normalize_path;
use crate::terminal::Terminal;

/// What the user picked before leaving the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Focus the worktree's session, or open one
    Switch(PathBuf),
    /// Always open a fresh session
    Open(PathBuf),
}

enum InputMode {
    Normal,
    Help,
}

struct App {
    entries: Vec<ListedWorktree>,
    list_state: ListState,
    input_mode: InputMode,
    error_message: Option<String>,
}

impl App {
    fn new(entries: Vec<ListedWorktree>, current: Option<&Path>) -> Self {
        let mut list_state = ListState::default();

        // Select the worktree we were started from, otherwise the first one
        if !entries.is_empty() {
            let initial_index = current
                .map(normalize_path)
                .and_then(|current| {
                    entries
                        .iter()
                        .position(|e| normalize_path(&e.worktree.path) == current)
                })
                .unwrap_or(0);
            list_state.select(Some(initial_index));
        }

        Self {
            entries,
            list_state,
            input_mode: InputMode::Normal,
            error_message: None,
        }
    }

    fn load<T: Terminal>(ws: &Workspace<T>) -> Result<Self> {
        let entries = load_entries(ws)?;
        let current = ws.git.repo_root().ok();
        Ok(Self::new(entries, current.as_deref()))
    }

    fn next(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < self.entries.len() => i + 1,
            _ => 0,
        };
        self.list_state.select(Some(i));
    }

    fn previous(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => self.entries.len() - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }

    fn refresh<T: Terminal>(&mut self, ws: &Workspace<T>) {
        match load_entries(ws) {
            Ok(entries) => {
                self.entries = entries;
                self.error_message = None;
                let selected = self
                    .list_state
                    .selected()
                    .filter(|&i| i < self.entries.len())
                    .or(if self.entries.is_empty() { None } else { Some(0) });
                self.list_state.select(selected);
            }
            Err(e) => {
                self.error_message = Some(format!("Failed to refresh: {e:#}"));
            }
        }
    }

    fn selected_path(&self) -> Option<PathBuf> {
        self.list_state
            .selected()
            .and_then(|i| self.entries.get(i))
            .map(|e| e.worktree.path.clone())
    }

    fn toggle_help(&mut self) {
        self.input_mode = match self.input_mode {
            InputMode::Help => InputMode::Normal,
            InputMode::Normal => InputMode::Help,
        };
    }
}

fn load_entries<T: Terminal>(ws: &Workspace<T>) -> Result<Vec<ListedWorktree>> {
    let worktrees = ws.git.list_worktrees().context("Failed to list worktrees")?;
    let sessions = ws.terminal.list_sessions().into_sessions();
    Ok(annotate_sessions(worktrees, &sessions))
}

/// Show the worktree picker. Returns `None` if the user quit.
pub fn run<T: Terminal>(ws: &Workspace<T>) -> Result<Option<Selection>> {
    let mut app = App::load(ws)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut screen = Screen::new(backend)?;

    let res = run_app(&mut screen, &mut app, ws);

    // Restore terminal
    disable_raw_mode()?;
    execute!(screen.backend_mut(), LeaveAlternateScreen)?;
    screen.show_cursor()?;

    res
}

fn run_app<B: ratatui::backend::Backend, T: Terminal>(
    screen: &mut Screen<B>,
    app: &mut App,
    ws: &Workspace<T>,
) -> Result<Option<Selection>> {
    loop {
        screen.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match app.input_mode {
                InputMode::Normal => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(None),
                    KeyCode::Char('j') | KeyCode::Down => app.next(),
                    KeyCode::Char('k') | KeyCode::Up => app.previous(),
                    KeyCode::Char('r') => app.refresh(ws),
                    KeyCode::Char('?') => app.toggle_help(),
                    KeyCode::Enter => {
                        if let Some(path) = app.selected_path() {
                            return Ok(Some(Selection::Switch(path)));
                        }
                    }
                    KeyCode::Char('o') => {
                        if let Some(path) = app.selected_path() {
                            return Ok(Some(Selection::Open(path)));
                        }
                    }
                    _ => {}
                },
                InputMode::Help => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc | KeyCode::Char('?') => app.toggle_help(),
                    _ => {}
                },
            }
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    let title = Paragraph::new("worktab - Git Worktrees")
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    match app.input_mode {
        InputMode::Normal => {
            render_worktree_list(f, app, chunks[1]);
            render_footer(f, app, chunks[2]);
        }
        InputMode::Help => {
            render_full_help(f, chunks[1]);
            let help_footer = Paragraph::new("Press ? or Esc to close")
                .style(Style::default().fg(Color::Gray))
                .block(Block::default().borders(Borders::ALL));
            f.render_widget(help_footer, chunks[2]);
        }
    }
}

fn render_worktree_list(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .entries
        .iter()
        .map(|entry| {
            let branch = entry.worktree.branch.as_deref().unwrap_or("detached");
            let mut spans = vec![
                Span::styled(format!("{:<30}", branch), Style::default().fg(Color::Green)),
                Span::styled(
                    entry.worktree.path.display().to_string(),
                    Style::default().fg(Color::Gray),
                ),
            ];
            if entry.has_iterm_tab {
                spans.push(Span::styled(" [iTerm]", Style::default().fg(Color::Cyan)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Worktrees (↑↓/jk to navigate, Enter to switch)"),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    f.render_stateful_widget(list, area, &mut app.list_state.clone());
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    if let Some(error) = &app.error_message {
        let error_widget = Paragraph::new(error.as_str())
            .style(Style::default().fg(Color::Red))
            .block(Block::default().borders(Borders::ALL).title("Error"));
        f.render_widget(error_widget, area);
        return;
    }

    let help_text = if area.width >= 70 {
        "q: Quit | Enter: Switch | o: Open new | r: Refresh | ?: Help"
    } else {
        "q: Quit | Enter | o | r | ?"
    };

    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL).title("Keys"));
    f.render_widget(help, area);
}

fn render_full_help(f: &mut Frame, area: Rect) {
    let key = |k: &'static str, what: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {:<11}", k), Style::default().fg(Color::Yellow)),
            Span::raw(what),
        ])
    };

    let help_text = vec![
        Line::from(Span::styled(
            "Keys",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        key("↑/k", "Move selection up"),
        key("↓/j", "Move selection down"),
        key("Enter", "Switch to the worktree's tab, opening one if needed"),
        key("o", "Open the worktree in a new tab"),
        key("r", "Refresh worktrees and tabs"),
        key("?", "Toggle this help screen"),
        key("q/Esc", "Quit"),
    ];

    let help = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .style(Style::default().fg(Color::Gray));

    f.render_widget(help, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::Worktree;

    fn entries(paths: &[&str]) -> Vec<ListedWorktree> {
        paths
            .iter()
            .map(|p| ListedWorktree {
                worktree: Worktree {
                    path: PathBuf::from(p),
                    ..Default::default()
                },
                has_iterm_tab: false,
            })
            .collect()
    }

    #[test]
    fn test_initial_selection_is_current_worktree() {
        let app = App::new(entries(&["/w/a", "/w/b", "/w/c"]), Some(Path::new("/w/b/")));
        assert_eq!(app.list_state.selected(), Some(1));
    }

    #[test]
    fn test_initial_selection_defaults_to_first() {
        let app = App::new(entries(&["/w/a", "/w/b"]), Some(Path::new("/elsewhere")));
        assert_eq!(app.list_state.selected(), Some(0));

        let empty = App::new(Vec::new(), None);
        assert_eq!(empty.list_state.selected(), None);
        assert_eq!(empty.selected_path(), None);
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = App::new(entries(&["/w/a", "/w/b"]), None);
        app.next();
        assert_eq!(app.selected_path(), Some(PathBuf::from("/w/b")));
        app.next();
        assert_eq!(app.selected_path(), Some(PathBuf::from("/w/a")));
        app.previous();
        assert_eq!(app.selected_path(), Some(PathBuf::from("/w/b")));
    }

    #[test]
    fn test_navigation_on_empty_list() {
        let mut app = App::new(Vec::new(), None);
        app.next();
        app.previous();
        assert_eq!(app.list_state.selected(), None);
    }

    #[test]
    fn test_toggle_help() {
        let mut app = App::new(Vec::new(), None);
        app.toggle_help();
        assert!(matches!(app.input_mode, InputMode::Help));
        app.toggle_help();
        assert!(matches!(app.input_mode, InputMode::Normal));
    }
}
