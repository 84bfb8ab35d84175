pub mod screen;

use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Gauge, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use mindbell::{session::Phase, util::format_countdown};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

const FIRED: &str = "●";
const PENDING: &str = "○";

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.practice.phase() {
            Phase::Idle => render_configure(self, area, buf),
            Phase::Running => render_running(self, area, buf),
            Phase::Finished => render_finished(self, area, buf),
        }
    }
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

fn italic() -> Style {
    Style::default().add_modifier(Modifier::ITALIC)
}

fn centered_rows(area: Rect, rows: &[u16]) -> Vec<Rect> {
    let content: u16 = rows.iter().sum();
    let pad = area.height.saturating_sub(content) / 2;

    let mut constraints = vec![Constraint::Length(pad)];
    constraints.extend(rows.iter().map(|r| Constraint::Length(*r)));
    constraints.push(Constraint::Min(0));

    Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints(constraints)
        .split(area)
        .iter()
        .skip(1)
        .copied()
        .collect()
}

/// Lines needed to show `text` wrapped to `width` columns
fn wrapped_height(text: &str, width: u16) -> u16 {
    let width = width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    (text.width() as f64 / f64::from(width)).ceil().max(1.0) as u16
}

fn render_configure(app: &App, area: Rect, buf: &mut Buffer) {
    let draft = &app.draft;
    let rows = centered_rows(area, &[2, 1, 1, 1, 2, 2, 1]);

    Paragraph::new(Span::styled("mindbell", bold().fg(Color::Cyan)))
        .alignment(Alignment::Center)
        .render(rows[0], buf);

    let field = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{label:<12}"), dim_bold()),
            Span::styled(value, bold()),
        ])
    };

    Paragraph::new(field(
        "duration",
        format!("‹ {} min ›", draft.duration_minutes),
    ))
    .alignment(Alignment::Center)
    .render(rows[1], buf);

    Paragraph::new(field("reminders", format!("‹ {} ›", draft.reminder_count)))
        .alignment(Alignment::Center)
        .render(rows[2], buf);

    Paragraph::new(field(
        "spacing",
        String::from(if draft.is_random { "random" } else { "even" }),
    ))
    .alignment(Alignment::Center)
    .render(rows[3], buf);

    Paragraph::new(Span::styled(schedule_preview(app), italic().fg(Color::Gray)))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(rows[4], buf);

    Paragraph::new(Span::styled(
        "(←/→) minutes  (p)resets  (↑/↓) reminders  (r)eminder presets  (m)ode",
        italic(),
    ))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .render(rows[5], buf);

    Paragraph::new(Span::styled("(enter) begin / (esc)ape", italic()))
        .alignment(Alignment::Center)
        .render(rows[6], buf);
}

/// Describe where the reminders of the drafted session will fall
pub fn schedule_preview(app: &App) -> String {
    let draft = &app.draft;
    let duration_ms = draft.duration_ms();
    let count = u64::from(draft.reminder_count);

    if draft.is_random {
        format!(
            "one reminder somewhere in each {} window",
            format_countdown(duration_ms / count)
        )
    } else {
        let times = (1..=count)
            .map(|i| format_countdown(i * duration_ms / (count + 1)))
            .join(" · ");
        format!("reminders at {times}")
    }
}

/// "●●○○" style reminder indicators
pub fn reminder_indicators(app: &App) -> String {
    app.practice
        .session()
        .schedule()
        .iter()
        .map(|p| if p.triggered { FIRED } else { PENDING })
        .join(" ")
}

fn intention_line(app: &App) -> Span<'static> {
    match (app.practice.intention(), app.practice.intention_loading()) {
        (Some(text), _) => Span::styled(text.to_string(), italic().fg(Color::Magenta)),
        (None, true) => Span::styled("…", dim_bold()),
        (None, false) => Span::raw(""),
    }
}

fn render_running(app: &App, area: Rect, buf: &mut Buffer) {
    let session = app.practice.session();
    let intention_rows = app
        .practice
        .intention()
        .map(|t| wrapped_height(t, area.width))
        .unwrap_or(1);
    let rows = centered_rows(area, &[2, 2, 1, 2, intention_rows, 2, 1]);

    Paragraph::new(Span::styled(
        format_countdown(session.remaining_ms()),
        bold().fg(Color::Cyan),
    ))
    .alignment(Alignment::Center)
    .render(rows[0], buf);

    Paragraph::new(Span::styled(reminder_indicators(app), bold()))
        .alignment(Alignment::Center)
        .render(rows[1], buf);

    Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black))
        .ratio(session.progress())
        .label(format!("{:.0}%", session.progress() * 100.0))
        .render(rows[2], buf);

    Paragraph::new(intention_line(app))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(rows[4], buf);

    Paragraph::new(Span::styled("(esc) stop", italic()))
        .alignment(Alignment::Center)
        .render(rows[6], buf);
}

/// One-line summary of a finished session
pub fn finished_summary(app: &App) -> String {
    let session = app.practice.session();
    let started = session
        .started_wall()
        .map(|t| format!("   started {}", t.format("%H:%M")))
        .unwrap_or_default();
    format!(
        "{} of practice   {}/{} reminders{}",
        format_countdown(session.elapsed_ms()),
        session.fired_count(),
        session.schedule().len(),
        started
    )
}

fn render_finished(app: &App, area: Rect, buf: &mut Buffer) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(Span::styled("session complete", bold().fg(Color::Green)))
        .alignment(Alignment::Center)
        .render(rows[1], buf);

    Paragraph::new(Span::styled(finished_summary(app), bold()))
        .alignment(Alignment::Center)
        .render(rows[2], buf);

    Paragraph::new(Span::styled(reminder_indicators(app), dim_bold()))
        .alignment(Alignment::Center)
        .render(rows[3], buf);

    Paragraph::new(intention_line(app))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(rows[4], buf);

    Paragraph::new(Span::styled("(enter) new session / (esc)ape", italic()))
        .alignment(Alignment::Center)
        .render(rows[6], buf);
}
