use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;

use mindbell::session::Phase;

use crate::App;

/// What a key press asks the event loop to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Quit,
}

/// A UI Screen boundary: responsible for rendering and key handling
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame) {
        f.render_widget(app, f.area());
    }

    fn on_key(&mut self, key: KeyEvent, app: &mut App) -> KeyOutcome;
}

/// Session setup
pub struct ConfigureScreen;

impl Screen for ConfigureScreen {
    fn on_key(&mut self, key: KeyEvent, app: &mut App) -> KeyOutcome {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return KeyOutcome::Quit,
            KeyCode::Left => app.adjust_duration(-1),
            KeyCode::Right => app.adjust_duration(1),
            KeyCode::Up => app.adjust_reminders(1),
            KeyCode::Down => app.adjust_reminders(-1),
            KeyCode::Char('p') => app.next_duration_preset(),
            KeyCode::Char('r') => app.next_reminder_preset(),
            KeyCode::Char('m') => app.toggle_spacing(),
            KeyCode::Enter | KeyCode::Char(' ') => app.begin(),
            _ => {}
        }
        KeyOutcome::Continue
    }
}

/// Countdown while a session is in progress
pub struct RunningScreen;

impl Screen for RunningScreen {
    fn on_key(&mut self, key: KeyEvent, app: &mut App) -> KeyOutcome {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('s')) {
            app.practice.stop();
        }
        KeyOutcome::Continue
    }
}

/// Summary after the session ran to completion
pub struct FinishedScreen;

impl Screen for FinishedScreen {
    fn on_key(&mut self, key: KeyEvent, app: &mut App) -> KeyOutcome {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => KeyOutcome::Quit,
            KeyCode::Enter | KeyCode::Char('r') => {
                app.practice.stop();
                KeyOutcome::Continue
            }
            _ => KeyOutcome::Continue,
        }
    }
}

/// Helper to construct the appropriate screen for the current phase
pub fn current_screen(phase: Phase) -> Box<dyn Screen> {
    match phase {
        Phase::Idle => Box::new(ConfigureScreen),
        Phase::Running => Box::new(RunningScreen),
        Phase::Finished => Box::new(FinishedScreen),
    }
}
