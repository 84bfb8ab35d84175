mod ui;

use std::{
    error::Error,
    io::{self, stdin},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};

use mindbell::{
    app_dirs::AppDirs,
    chime::{ChimePlayer, SilentChime, TerminalBell},
    config::{Config, ConfigStore, FileConfigStore},
    intention::{HttpIntentionSource, IntentionFetcher, IntentionSource, OfflineIntentions},
    keep_awake::{InhibitorKeepAwake, KeepAwake, NoKeepAwake},
    logging,
    practice::{Practice, SystemClock},
    runtime::{BellEvent, BellEventSource, CrosstermEventSource, FixedTicker, Runner, Ticker},
    session::SessionConfig,
    util::{clamp_duration_minutes, clamp_reminder_count, duration_arg, reminders_arg},
    TICK_RATE_MS,
};

use crate::ui::screen::{current_screen, KeyOutcome};

pub const DURATION_PRESETS: [u32; 7] = [5, 10, 15, 20, 30, 45, 60];
pub const REMINDER_PRESETS: [u32; 5] = [1, 2, 3, 5, 8];

/// calm mindfulness timer with interval chimes and mindful intentions
#[derive(Parser, Debug, Clone, Default)]
#[clap(
    version,
    about,
    long_about = "A quiet terminal meditation timer. Set a duration and a number of reminders; a gentle chime and a fresh mindful intention mark each reminder."
)]
pub struct Cli {
    /// session length in minutes (1-120, out-of-range values are clamped)
    #[clap(short = 'd', long, value_parser = duration_arg)]
    duration: Option<u32>,

    /// number of reminders during the session (1-30, clamped)
    #[clap(short = 'n', long, value_parser = reminders_arg)]
    reminders: Option<u32>,

    /// place each reminder at a random point of its own slice of the session
    #[clap(long)]
    random: bool,

    /// do not ring the terminal bell
    #[clap(long)]
    quiet: bool,

    /// do not try to keep the display awake during a session
    #[clap(long)]
    no_keep_awake: bool,

    /// never contact the intention service; use built-in phrases only
    #[clap(long)]
    no_intentions: bool,

    /// read settings from this file instead of the default location
    #[clap(long)]
    config: Option<PathBuf>,

    /// write the effective settings to the config file and exit
    #[clap(long)]
    write_config: bool,
}

impl Cli {
    /// Overlay command line flags on the loaded configuration
    fn apply_to(&self, cfg: &mut Config) {
        if let Some(d) = self.duration {
            cfg.duration_minutes = i64::from(d);
        }
        if let Some(n) = self.reminders {
            cfg.reminder_count = i64::from(n);
        }
        if self.random {
            cfg.random_spacing = true;
        }
        if self.quiet {
            cfg.chime = false;
        }
        if self.no_keep_awake {
            cfg.keep_awake = false;
        }
        if self.no_intentions {
            cfg.intention.endpoint = None;
        }
    }

    fn store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }
}

pub struct App {
    /// Settings for the next session, edited on the configure screen
    pub draft: SessionConfig,
    pub practice: Practice,
}

impl App {
    pub fn new(draft: SessionConfig, practice: Practice) -> Self {
        Self { draft, practice }
    }

    pub fn adjust_duration(&mut self, delta: i64) {
        self.draft.duration_minutes =
            clamp_duration_minutes(i64::from(self.draft.duration_minutes) + delta);
    }

    pub fn adjust_reminders(&mut self, delta: i64) {
        self.draft.reminder_count =
            clamp_reminder_count(i64::from(self.draft.reminder_count) + delta);
    }

    pub fn next_duration_preset(&mut self) {
        self.draft.duration_minutes = next_preset(&DURATION_PRESETS, self.draft.duration_minutes);
    }

    pub fn next_reminder_preset(&mut self) {
        self.draft.reminder_count = next_preset(&REMINDER_PRESETS, self.draft.reminder_count);
    }

    pub fn toggle_spacing(&mut self) {
        self.draft.is_random = !self.draft.is_random;
    }

    pub fn begin(&mut self) {
        if let Err(err) = self.practice.start(self.draft) {
            tracing::warn!(error = %err, "start ignored");
        }
    }
}

/// The first preset above `current`, wrapping to the smallest
fn next_preset(presets: &[u32], current: u32) -> u32 {
    presets
        .iter()
        .copied()
        .find(|p| *p > current)
        .unwrap_or(presets[0])
}

fn logging_disabled_notice(path: &Path, err: &io::Error) -> String {
    format!("mindbell: logging disabled, {}: {err}", path.display())
}

fn build_practice(cfg: &Config, fetcher: IntentionFetcher) -> Practice {
    let chime: Box<dyn ChimePlayer> = if cfg.chime {
        Box::new(TerminalBell)
    } else {
        Box::new(SilentChime)
    };
    let keep_awake: Box<dyn KeepAwake> = if cfg.keep_awake {
        Box::new(InhibitorKeepAwake::new())
    } else {
        Box::new(NoKeepAwake)
    };
    Practice::new(Box::new(SystemClock), chime, keep_awake, fetcher)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let store = cli.store();
    let mut cfg = store.load();
    cli.apply_to(&mut cfg);

    if cli.write_config {
        store.save(&cfg)?;
        println!("{}", store.path().display());
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(log_path) = AppDirs::log_path() {
        // a session without a log file is still a session
        if let Err(err) = logging::init(&log_path) {
            eprintln!("{}", logging_disabled_notice(&log_path, &err));
        }
    }

    let source: Arc<dyn IntentionSource> = if cli.no_intentions {
        Arc::new(OfflineIntentions)
    } else {
        HttpIntentionSource::from_config(&cfg.intention)
    };

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let fetcher = IntentionFetcher::new(source, runner.sender());
    let mut app = App::new(cfg.session_config(), build_practice(&cfg, fetcher));

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, &runner);
    app.practice.stop();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, E: BellEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| ui(app, f))?;

        match runner.step() {
            BellEvent::Tick => app.practice.tick(),
            BellEvent::Resize => {}
            BellEvent::FocusGained => app.practice.on_focus_gained(),
            BellEvent::Intention(reply) => {
                app.practice.on_intention(reply);
            }
            BellEvent::Key(key) => {
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
                {
                    break;
                }
                let mut screen = current_screen(app.practice.phase());
                if screen.on_key(key, app) == KeyOutcome::Quit {
                    break;
                }
            }
        }
    }
    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    current_screen(app.practice.phase()).render(app, f);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEvent;
    use mindbell::{
        chime::{Chime, RecordingChime},
        keep_awake::FakeKeepAwake,
        practice::ManualClock,
        session::Phase,
    };
    use ratatui::backend::TestBackend;
    use std::sync::mpsc;

    struct TestApp {
        app: App,
        clock: ManualClock,
        chime: RecordingChime,
        _rx: mpsc::Receiver<BellEvent>,
    }

    fn test_app(draft: SessionConfig) -> TestApp {
        let (tx, rx) = mpsc::channel();
        let clock = ManualClock::new();
        let chime = RecordingChime::new();
        let practice = Practice::new(
            Box::new(clock.clone()),
            Box::new(chime.clone()),
            Box::new(FakeKeepAwake::new()),
            IntentionFetcher::new(Arc::new(OfflineIntentions), tx),
        );
        TestApp {
            app: App::new(draft, practice),
            clock,
            chime,
            _rx: rx,
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn press(app: &mut App, code: KeyCode) -> KeyOutcome {
        current_screen(app.practice.phase()).on_key(key(code), app)
    }

    fn rendered(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| ui(app, f)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["mindbell"]).unwrap();
        assert_eq!(cli.duration, None);
        assert_eq!(cli.reminders, None);
        assert!(!cli.random);
        assert!(!cli.write_config);
    }

    #[test]
    fn test_cli_clamps_instead_of_rejecting() {
        let cli = Cli::try_parse_from(["mindbell", "-d", "500", "-n", "zero"]).unwrap();
        assert_eq!(cli.duration, Some(120));
        assert_eq!(cli.reminders, Some(1));
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "mindbell",
            "--duration",
            "25",
            "--reminders",
            "4",
            "--random",
            "--quiet",
            "--no-keep-awake",
            "--no-intentions",
        ])
        .unwrap();
        let mut cfg = Config::default();
        cfg.intention.endpoint = Some("http://example.invalid".into());
        cli.apply_to(&mut cfg);

        assert_eq!(
            cfg.session_config(),
            SessionConfig {
                duration_minutes: 25,
                reminder_count: 4,
                is_random: true
            }
        );
        assert!(!cfg.chime);
        assert!(!cfg.keep_awake);
        assert_eq!(cfg.intention.endpoint, None);
    }

    #[test]
    fn test_next_preset_wraps() {
        assert_eq!(next_preset(&DURATION_PRESETS, 10), 15);
        assert_eq!(next_preset(&DURATION_PRESETS, 12), 15);
        assert_eq!(next_preset(&DURATION_PRESETS, 60), 5);
        assert_eq!(next_preset(&REMINDER_PRESETS, 30), 1);
    }

    #[test]
    fn test_configure_keys_edit_draft_within_bounds() {
        let mut t = test_app(SessionConfig::clamped(1, 1, false));
        press(&mut t.app, KeyCode::Left);
        press(&mut t.app, KeyCode::Down);
        assert_eq!(t.app.draft.duration_minutes, 1);
        assert_eq!(t.app.draft.reminder_count, 1);

        press(&mut t.app, KeyCode::Right);
        press(&mut t.app, KeyCode::Up);
        press(&mut t.app, KeyCode::Char('m'));
        assert_eq!(t.app.draft.duration_minutes, 2);
        assert_eq!(t.app.draft.reminder_count, 2);
        assert!(t.app.draft.is_random);

        press(&mut t.app, KeyCode::Char('p'));
        press(&mut t.app, KeyCode::Char('r'));
        assert_eq!(t.app.draft.duration_minutes, 5);
        assert_eq!(t.app.draft.reminder_count, 3);
    }

    #[test]
    fn test_full_session_through_keys() {
        let mut t = test_app(SessionConfig::clamped(2, 1, false));
        assert_eq!(press(&mut t.app, KeyCode::Enter), KeyOutcome::Continue);
        assert_eq!(t.app.practice.phase(), Phase::Running);
        assert_eq!(t.chime.calls(), vec![Chime::Unlock]);

        t.clock.advance(Duration::from_secs(60));
        t.app.practice.tick();
        assert_eq!(t.chime.count(Chime::Gentle), 1);

        t.clock.advance(Duration::from_secs(90));
        t.app.practice.tick();
        assert_eq!(t.app.practice.phase(), Phase::Finished);
        assert_eq!(t.app.practice.session().elapsed_ms(), 120_000);

        press(&mut t.app, KeyCode::Enter);
        assert_eq!(t.app.practice.phase(), Phase::Idle);
        assert_eq!(press(&mut t.app, KeyCode::Esc), KeyOutcome::Quit);
    }

    #[test]
    fn test_escape_stops_running_session_without_quitting() {
        let mut t = test_app(SessionConfig::default());
        press(&mut t.app, KeyCode::Char(' '));
        assert_eq!(press(&mut t.app, KeyCode::Esc), KeyOutcome::Continue);
        assert_eq!(t.app.practice.phase(), Phase::Idle);
        assert!(t.app.practice.session().schedule().is_empty());
    }

    #[test]
    fn test_render_configure_screen() {
        let t = test_app(SessionConfig::clamped(10, 3, false));
        let content = rendered(&t.app);
        assert!(content.contains("mindbell"));
        assert!(content.contains("10 min"));
        assert!(content.contains("02:30"));
    }

    #[test]
    fn test_schedule_preview_random() {
        let t = test_app(SessionConfig::clamped(10, 4, true));
        assert_eq!(
            ui::schedule_preview(&t.app),
            "one reminder somewhere in each 02:30 window"
        );
    }

    #[test]
    fn test_render_running_screen() {
        let mut t = test_app(SessionConfig::clamped(10, 3, false));
        t.app.begin();
        t.clock.advance(Duration::from_secs(200));
        t.app.practice.tick();

        assert_eq!(ui::reminder_indicators(&t.app), "● ○ ○");
        let content = rendered(&t.app);
        assert!(content.contains("06:40"));
        assert!(content.contains("stop"));
    }

    #[test]
    fn test_render_finished_screen() {
        let mut t = test_app(SessionConfig::clamped(1, 2, false));
        t.app.begin();
        t.clock.advance(Duration::from_secs(25));
        t.app.practice.tick();
        t.clock.advance(Duration::from_secs(600));
        t.app.practice.tick();

        let summary = ui::finished_summary(&t.app);
        assert!(summary.starts_with("01:00 of practice   1/2 reminders"));
        assert!(rendered(&t.app).contains("session complete"));
    }

    #[test]
    fn test_logging_notice_names_path_and_cause() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "read-only");
        let notice = logging_disabled_notice(Path::new("/state/mindbell.log"), &err);
        assert_eq!(
            notice,
            "mindbell: logging disabled, /state/mindbell.log: read-only"
        );
    }

    #[test]
    fn test_finished_footer_is_centered() {
        let mut t = test_app(SessionConfig::clamped(1, 1, false));
        t.app.begin();
        t.clock.advance(Duration::from_secs(90));
        t.app.practice.tick();

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| ui(&t.app, f)).unwrap();
        let buffer = terminal.backend().buffer();
        let row = (0..30u16)
            .map(|y| (0..100u16).map(|x| buffer[(x, y)].symbol()).collect::<String>())
            .find(|r| r.contains("new session"))
            .unwrap();
        let left = row.len() - row.trim_start().len();
        let right = row.len() - row.trim_end().len();
        assert!(left.abs_diff(right) <= 1, "footer not centered: {row:?}");
    }

    #[test]
    fn test_tick_rate_constant() {
        assert_eq!(TICK_RATE_MS, 100);
        const _: () = assert!(TICK_RATE_MS <= 1000);
    }
}
