mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    cursor::Show,
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use pickrate::{
    app_dirs::AppDirs,
    clock::SystemClock,
    config::{Config, ConfigStore, FileConfigStore},
    logging::init_logging,
    recorder::SessionRecorder,
    runtime::{AppEvent, AppEventSource, CrosstermEventSource, Runner},
    session::CategoryRegistry,
    Category, Command, Dispatch, SessionController, SessionEvent, SessionState, Snapshot,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::mpsc::Receiver,
};

/// tally successes and failures over a timed session
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Counts successes and failures during a timed session, shows success rate and throughput live, and appends finished sessions to per-site CSV logs."
)]
pub struct Cli {
    /// directory the session logs are written under
    #[clap(short = 'd', long)]
    data_dir: Option<PathBuf>,

    /// config file to use instead of the platform default
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// site to select on startup (registered if new)
    #[clap(long)]
    site: Option<String>,

    /// outlet to select on startup (registered if new)
    #[clap(long)]
    outlet: Option<String>,

    /// reset the session after every successful save
    #[clap(long)]
    auto_reset: bool,

    /// log level for the log file (RUST_LOG overrides)
    #[clap(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    Normal,
    Editing(Category),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Info(String),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyOutcome {
    Continue,
    Quit,
}

pub struct App {
    pub controller: SessionController,
    pub events: Receiver<SessionEvent>,
    pub snapshot: Snapshot,
    pub mode: InputMode,
    pub status: Option<Status>,
}

impl App {
    pub fn new(cli: &Cli, config: &Config) -> Self {
        let root = cli
            .data_dir
            .clone()
            .or_else(|| config.data_dir.clone())
            .unwrap_or_else(AppDirs::records_dir);
        let recorder = SessionRecorder::new(root).with_utf8_bom(config.utf8_bom);
        let state = SessionState::new(
            CategoryRegistry::new(config.sites.clone()),
            CategoryRegistry::new(config.outlets.clone()),
        );
        let mut controller = SessionController::new(state, SystemClock, recorder)
            .with_auto_reset(cli.auto_reset || config.auto_reset_after_save);

        if let Some(site) = &cli.site {
            controller.select(Category::Site, site);
        }
        if let Some(outlet) = &cli.outlet {
            controller.select(Category::Outlet, outlet);
        }

        Self::from_controller(controller)
    }

    pub fn from_controller(mut controller: SessionController) -> Self {
        let events = controller.subscribe();
        let snapshot = controller.snapshot();
        Self {
            controller,
            events,
            snapshot,
            mode: InputMode::Normal,
            status: None,
        }
    }

    /// Pulls pending session events into the displayed snapshot.
    /// Returns true if anything changed.
    pub fn sync(&mut self) -> bool {
        let mut changed = false;
        for event in self.events.try_iter() {
            changed = true;
            match event {
                SessionEvent::Changed(snapshot) | SessionEvent::Ticked(snapshot) => {
                    self.snapshot = snapshot;
                }
                SessionEvent::Saved { session_id, path } => {
                    self.status = Some(Status::Info(format!(
                        "saved {} to {}",
                        session_id,
                        path.display()
                    )));
                }
            }
        }
        if changed {
            // auto-reset publishes after the save, so re-read once
            self.snapshot = self.controller.snapshot();
        }
        changed
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return KeyOutcome::Quit;
        }

        match self.mode {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::Editing(kind) => {
                self.handle_edit_key(kind, key);
                KeyOutcome::Continue
            }
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> KeyOutcome {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return KeyOutcome::Quit,
            KeyCode::Char(' ') | KeyCode::Char('s') => {
                self.run(Command::Start);
            }
            KeyCode::Char('f') => {
                self.run(Command::Finish);
            }
            KeyCode::Char('r') => {
                self.run(Command::Reset);
            }
            KeyCode::Right => {
                self.run(Command::RecordSuccess);
            }
            KeyCode::Left => {
                self.run(Command::RecordFail);
            }
            KeyCode::Char('w') => {
                self.run(Command::Save);
            }
            KeyCode::Char('a') => self.mode = InputMode::Editing(Category::Site),
            KeyCode::Char('o') => self.mode = InputMode::Editing(Category::Outlet),
            KeyCode::Char('[') => self.cycle(Category::Site, -1),
            KeyCode::Char(']') => self.cycle(Category::Site, 1),
            KeyCode::Char('{') => self.cycle(Category::Outlet, -1),
            KeyCode::Char('}') => self.cycle(Category::Outlet, 1),
            _ => {}
        }
        KeyOutcome::Continue
    }

    fn handle_edit_key(&mut self, kind: Category, key: KeyEvent) {
        let mut text = self.controller.pending().get(kind).to_string();
        match key.code {
            KeyCode::Esc => {
                self.controller.set_pending(kind, String::new());
                self.mode = InputMode::Normal;
            }
            KeyCode::Enter => {
                let command = match kind {
                    Category::Site => Command::AddCategory,
                    Category::Outlet => Command::SetCategory,
                };
                // blank input keeps the editor open
                if self.run(command) {
                    self.mode = InputMode::Normal;
                }
            }
            KeyCode::Backspace => {
                text.pop();
                self.controller.set_pending(kind, text);
            }
            KeyCode::Char(c) => {
                text.push(c);
                self.controller.set_pending(kind, text);
            }
            _ => {}
        }
    }

    /// Dispatches `command`, reporting save failures in the status line
    fn run(&mut self, command: Command) -> bool {
        match self.controller.dispatch(command) {
            Ok(Dispatch::Ignored) => false,
            Ok(_) => {
                if command != Command::Save {
                    self.status = None;
                }
                true
            }
            Err(e) => {
                self.status = Some(Status::Error(format!("save failed: {e}")));
                false
            }
        }
    }

    fn cycle(&mut self, kind: Category, delta: isize) {
        let registry = self.controller.state().registry(kind);
        if registry.is_empty() {
            return;
        }
        let len = registry.len() as isize;
        let next = match self
            .controller
            .state()
            .selection(kind)
            .and_then(|s| registry.position(s))
        {
            Some(idx) => (idx as isize + delta).rem_euclid(len),
            None => 0,
        };
        let label = registry.get(next as usize).map(str::to_string);
        if let Some(label) = label {
            self.controller.select(kind, &label);
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    init_logging(&AppDirs::log_path(), &cli.log_level)?;

    let store = cli
        .config
        .as_ref()
        .map(FileConfigStore::with_path)
        .unwrap_or_default();
    let mut config = store.load();
    let mut app = App::new(&cli, &config);

    enable_raw_mode()?;
    let result = with_restore(|| run_terminal(&mut app), restore_terminal);

    config.absorb_registries(app.controller.state());
    if let Err(e) = store.save(&config) {
        tracing::warn!(path = %store.path().display(), error = %e, "could not save config");
    }

    result
}

fn run_terminal(app: &mut App) -> Result<(), Box<dyn Error>> {
    execute!(io::stdout(), EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    let runner = Runner::new(CrosstermEventSource::new());
    start_tui(&mut terminal, app, &runner)
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, Show)
}

/// Runs `body` and then `restore`, whichever way `body` ends. The body's
/// error wins over a restore error.
fn with_restore<T>(
    body: impl FnOnce() -> Result<T, Box<dyn Error>>,
    restore: impl FnOnce() -> io::Result<()>,
) -> Result<T, Box<dyn Error>> {
    let result = body();
    let restored = restore();
    let value = result?;
    restored?;
    Ok(value)
}

fn start_tui<B: Backend, E: AppEventSource>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E>,
) -> Result<(), Box<dyn Error>> {
    let mut dirty = true;

    loop {
        if dirty {
            terminal.draw(|f| ui::draw(app, f))?;
            dirty = false;
        }

        match runner.step(app.controller.tick_timeout()) {
            AppEvent::Tick => {
                app.controller.on_tick();
            }
            AppEvent::Resize => dirty = true,
            AppEvent::Closed => {
                tracing::warn!("terminal input closed, exiting");
                break;
            }
            AppEvent::Key(key) => {
                if app.handle_key(key) == KeyOutcome::Quit {
                    break;
                }
                dirty = true;
            }
        }

        dirty |= app.sync();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Local, TimeDelta, TimeZone};
    use pickrate::{
        clock::ManualClock,
        runtime::TestEventSource,
        ticker::Ticker,
        Phase,
    };
    use ratatui::backend::TestBackend;
    use std::{sync::mpsc, time::Duration};
    use tempfile::{tempdir, TempDir};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn test_app() -> (App, ManualClock, TempDir) {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(Local.with_ymd_and_hms(2024, 5, 14, 8, 30, 0).unwrap());
        let state = SessionState::new(
            CategoryRegistry::new(["North", "South"]),
            CategoryRegistry::new(["Bin 1"]),
        );
        let controller =
            SessionController::new(state, clock.clone(), SessionRecorder::new(dir.path()));
        (App::from_controller(controller), clock, dir)
    }

    fn press(app: &mut App, codes: &[KeyCode]) {
        for &code in codes {
            app.handle_key(key(code));
        }
        app.sync();
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["pickrate"]);

        assert_eq!(cli.data_dir, None);
        assert_eq!(cli.config, None);
        assert_eq!(cli.site, None);
        assert_eq!(cli.outlet, None);
        assert!(!cli.auto_reset);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "pickrate",
            "-d",
            "/tmp/logs",
            "--site",
            "Dock 4",
            "--outlet",
            "Chute",
            "--auto-reset",
        ]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/logs")));
        assert_eq!(cli.site.as_deref(), Some("Dock 4"));
        assert_eq!(cli.outlet.as_deref(), Some("Chute"));
        assert!(cli.auto_reset);
    }

    #[test]
    fn test_app_new_applies_cli_selection() {
        let dir = tempdir().unwrap();
        let cli = Cli::parse_from([
            "pickrate",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "--site",
            "Dock 4",
        ]);
        let app = App::new(&cli, &Config::default());

        assert_eq!(app.snapshot.site.as_deref(), Some("Dock 4"));
        assert_eq!(app.snapshot.sites, vec!["Site 1", "Site 2", "Dock 4"]);
        assert_eq!(app.snapshot.outlet, None);
        assert_eq!(app.controller.recorder().root(), dir.path());
    }

    #[test]
    fn test_arrow_keys_count_only_while_running() {
        let (mut app, _clock, _dir) = test_app();
        press(&mut app, &[KeyCode::Right, KeyCode::Left]);
        assert_eq!(app.snapshot.total, 0);

        press(
            &mut app,
            &[KeyCode::Char(' '), KeyCode::Right, KeyCode::Right, KeyCode::Left],
        );
        assert_eq!(app.snapshot.phase, Phase::Running);
        assert_eq!((app.snapshot.success, app.snapshot.fail), (2, 1));
        assert_eq!(app.snapshot.success_rate, "66.7");
    }

    #[test]
    fn test_finish_and_reset_keys() {
        let (mut app, clock, _dir) = test_app();
        press(&mut app, &[KeyCode::Char('s'), KeyCode::Right]);
        clock.advance(TimeDelta::seconds(30));
        press(&mut app, &[KeyCode::Char('f')]);
        assert_eq!(app.snapshot.phase, Phase::Stopped);
        assert_eq!(app.snapshot.elapsed, "00:00:30");
        assert_eq!(app.snapshot.items_per_minute, "2.0");

        press(&mut app, &[KeyCode::Char('r')]);
        assert_eq!(app.snapshot.phase, Phase::Idle);
        assert_eq!(app.snapshot.total, 0);
    }

    #[test]
    fn test_editing_site_label() {
        let (mut app, _clock, _dir) = test_app();
        press(&mut app, &[KeyCode::Char('a')]);
        assert_eq!(app.mode, InputMode::Editing(Category::Site));

        press(
            &mut app,
            &[
                KeyCode::Char('E'),
                KeyCode::Char('a'),
                KeyCode::Char('x'),
                KeyCode::Backspace,
                KeyCode::Char('s'),
                KeyCode::Char('t'),
            ],
        );
        assert_eq!(app.snapshot.pending.site, "East");
        assert!(app.snapshot.is_enabled(Command::AddCategory));

        press(&mut app, &[KeyCode::Enter]);
        assert_eq!(app.mode, InputMode::Normal);
        assert_eq!(app.snapshot.site.as_deref(), Some("East"));
        assert_eq!(app.snapshot.sites, vec!["North", "South", "East"]);
        assert!(app.snapshot.pending.site.is_empty());
    }

    #[test]
    fn test_blank_label_keeps_editor_open() {
        let (mut app, _clock, _dir) = test_app();
        press(&mut app, &[KeyCode::Char('o'), KeyCode::Char(' '), KeyCode::Enter]);
        assert_eq!(app.mode, InputMode::Editing(Category::Outlet));
        assert_eq!(app.snapshot.outlet, None);

        press(&mut app, &[KeyCode::Esc]);
        assert_eq!(app.mode, InputMode::Normal);
        assert!(app.snapshot.pending.outlet.is_empty());
    }

    #[test]
    fn test_cycle_selection_wraps() {
        let (mut app, _clock, _dir) = test_app();
        press(&mut app, &[KeyCode::Char(']')]);
        assert_eq!(app.snapshot.site.as_deref(), Some("North"));
        press(&mut app, &[KeyCode::Char(']')]);
        assert_eq!(app.snapshot.site.as_deref(), Some("South"));
        press(&mut app, &[KeyCode::Char(']')]);
        assert_eq!(app.snapshot.site.as_deref(), Some("North"));
        press(&mut app, &[KeyCode::Char('[')]);
        assert_eq!(app.snapshot.site.as_deref(), Some("South"));
    }

    #[test]
    fn test_save_key_reports_status() {
        let (mut app, _clock, _dir) = test_app();
        press(
            &mut app,
            &[
                KeyCode::Char(']'),
                KeyCode::Char('}'),
                KeyCode::Char('s'),
                KeyCode::Right,
                KeyCode::Char('w'),
            ],
        );
        assert_eq!(app.status, None, "save is disabled while running");

        press(&mut app, &[KeyCode::Char('f'), KeyCode::Char('w')]);
        assert_matches!(&app.status, Some(Status::Info(msg)) if msg.contains("20240514_North.csv"));
    }

    #[test]
    fn test_save_failure_reports_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let mut controller = SessionController::new(
            SessionState::default(),
            ManualClock::default(),
            SessionRecorder::new(&blocker),
        );
        controller.select(Category::Site, "North");
        controller.select(Category::Outlet, "Bin 1");
        let mut app = App::from_controller(controller);

        press(
            &mut app,
            &[KeyCode::Char('s'), KeyCode::Left, KeyCode::Char('f'), KeyCode::Char('w')],
        );
        assert_matches!(&app.status, Some(Status::Error(msg)) if msg.starts_with("save failed"));
        assert_eq!(app.snapshot.total, 1);
    }

    #[test]
    fn test_quit_keys() {
        let (mut app, _clock, _dir) = test_app();
        assert_eq!(app.handle_key(key(KeyCode::Char('q'))), KeyOutcome::Quit);
        assert_eq!(app.handle_key(key(KeyCode::Esc)), KeyOutcome::Quit);
        assert_eq!(
            app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            KeyOutcome::Quit
        );
    }

    #[test]
    fn test_q_while_editing_is_text() {
        let (mut app, _clock, _dir) = test_app();
        press(&mut app, &[KeyCode::Char('a')]);
        assert_eq!(app.handle_key(key(KeyCode::Char('q'))), KeyOutcome::Continue);
        app.sync();
        assert_eq!(app.snapshot.pending.site, "q");
    }

    #[test]
    fn test_start_tui_runs_until_quit() {
        let (app, clock, _dir) = test_app();
        let mut app = App::from_controller(
            app.controller
                .with_ticker(Ticker::new(Duration::from_millis(1))),
        );
        let (tx, rx) = mpsc::channel();
        for code in [KeyCode::Char('s'), KeyCode::Right, KeyCode::Right] {
            tx.send(AppEvent::Key(key(code))).unwrap();
        }
        clock.advance(TimeDelta::seconds(4));
        tx.send(AppEvent::Resize).unwrap();
        tx.send(AppEvent::Key(key(KeyCode::Char('q')))).unwrap();

        let runner = Runner::new(TestEventSource::new(rx));
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        start_tui(&mut terminal, &mut app, &runner).unwrap();

        assert_eq!(app.snapshot.success, 2);
        assert_eq!(app.snapshot.phase, Phase::Running);
        let content: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(content.contains("Success"));
    }

    #[test]
    fn test_start_tui_exits_when_input_closes() {
        let (mut app, _clock, _dir) = test_app();
        let (tx, rx) = mpsc::channel();
        tx.send(AppEvent::Key(key(KeyCode::Char('s')))).unwrap();
        drop(tx);

        let runner = Runner::new(TestEventSource::new(rx));
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        start_tui(&mut terminal, &mut app, &runner).unwrap();

        assert_eq!(app.snapshot.phase, Phase::Running);
    }

    #[test]
    fn test_restore_runs_when_setup_fails() {
        let restored = std::cell::Cell::new(false);
        let result: Result<(), _> = with_restore(
            || Err("no terminal".into()),
            || {
                restored.set(true);
                Ok(())
            },
        );
        assert!(restored.get());
        assert_eq!(result.unwrap_err().to_string(), "no terminal");
    }

    #[test]
    fn test_restore_error_surfaces_after_success() {
        let result = with_restore(|| Ok(7), || Err(io::Error::other("tty gone")));
        assert_eq!(result.unwrap_err().to_string(), "tty gone");
    }
}
