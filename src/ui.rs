use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::{App, InputMode, Status};
use pickrate::{Category, Command, Phase, Snapshot};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

pub fn draw(app: &App, f: &mut Frame) {
    let snapshot = &app.snapshot;
    let bold_style = Style::default().add_modifier(Modifier::BOLD);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // phase
            Constraint::Length(1), // success rate
            Constraint::Length(1), // padding
            Constraint::Length(5), // counters
            Constraint::Length(1), // elapsed / throughput
            Constraint::Length(1), // padding
            Constraint::Length(3), // labels
            Constraint::Min(0),
            Constraint::Length(1), // status
            Constraint::Length(1), // legend
        ])
        .split(f.area());

    let (phase_text, phase_color) = match snapshot.phase {
        Phase::Idle => ("READY", Color::Gray),
        Phase::Running => ("RUNNING", Color::Green),
        Phase::Stopped => ("FINISHED", Color::Yellow),
    };
    f.render_widget(
        Paragraph::new(Span::styled(phase_text, bold_style.fg(phase_color)))
            .alignment(Alignment::Center),
        chunks[0],
    );

    let rate = Paragraph::new(Span::styled(
        format!(
            "Success rate {}% ({}/{})",
            snapshot.success_rate, snapshot.success, snapshot.total
        ),
        bold_style,
    ))
    .alignment(Alignment::Center);
    f.render_widget(rate, chunks[1]);

    render_counters(snapshot, f, chunks[3]);

    let timing = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[4]);
    f.render_widget(
        Paragraph::new(format!("Elapsed {}", snapshot.elapsed)),
        timing[0],
    );
    f.render_widget(
        Paragraph::new(format!("{} items/min", snapshot.items_per_minute))
            .alignment(Alignment::Right),
        timing[1],
    );

    render_labels(app, f, chunks[6]);

    if let Some(status) = &app.status {
        let (text, color) = match status {
            Status::Info(msg) => (msg.as_str(), Color::Cyan),
            Status::Error(msg) => (msg.as_str(), Color::Red),
        };
        f.render_widget(
            Paragraph::new(Span::styled(text, Style::default().fg(color))),
            chunks[8],
        );
    }

    f.render_widget(Paragraph::new(legend(app)), chunks[9]);
}

fn render_counters(snapshot: &Snapshot, f: &mut Frame, area: Rect) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let counters = [
        ("Fail (←)", snapshot.fail, Color::Red, Command::RecordFail),
        ("Success (→)", snapshot.success, Color::Green, Command::RecordSuccess),
    ];
    for ((title, count, color, command), chunk) in counters.into_iter().zip(halves.iter()) {
        let mut style = Style::default().fg(color);
        if !snapshot.is_enabled(command) {
            style = style.add_modifier(Modifier::DIM);
        }
        let widget = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(count.to_string(), style.add_modifier(Modifier::BOLD))),
        ])
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(title).border_style(style));
        f.render_widget(widget, *chunk);
    }
}

fn render_labels(app: &App, f: &mut Frame, area: Rect) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    for (kind, chunk) in [Category::Site, Category::Outlet].into_iter().zip(halves.iter()) {
        let snapshot = &app.snapshot;
        let (selection, labels, pending) = match kind {
            Category::Site => (&snapshot.site, &snapshot.sites, &snapshot.pending.site),
            Category::Outlet => (&snapshot.outlet, &snapshot.outlets, &snapshot.pending.outlet),
        };

        if app.mode == InputMode::Editing(kind) {
            let widget = Paragraph::new(pending.as_str()).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("New {}", kind.to_string().to_lowercase()))
                    .border_style(Style::default().fg(Color::Yellow)),
            );
            f.render_widget(widget, *chunk);
            let x = chunk.x + 1 + pending.width() as u16;
            f.set_cursor_position((x.min(chunk.right().saturating_sub(2)), chunk.y + 1));
            continue;
        }

        let position = selection
            .as_ref()
            .and_then(|s| labels.iter().position(|l| l == s))
            .map(|idx| format!(" {}/{}", idx + 1, labels.len()))
            .unwrap_or_default();
        let text = match selection {
            Some(label) => Span::raw(label.clone()),
            None => Span::styled("none", Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM)),
        };
        let widget = Paragraph::new(text).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{kind}{position}")),
        );
        f.render_widget(widget, *chunk);
    }
}

fn legend(app: &App) -> Line<'static> {
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);
    if let InputMode::Editing(_) = app.mode {
        return Line::from(Span::styled("(enter) select / (esc) cancel", italic_style));
    }

    let entries: [(&str, Option<Command>); 9] = [
        ("(s)tart", Some(Command::Start)),
        ("(f)inish", Some(Command::Finish)),
        ("(r)eset", Some(Command::Reset)),
        ("(w)rite", Some(Command::Save)),
        ("(a) site", None),
        ("(o)utlet", None),
        ("[ ] site", None),
        ("{ } outlet", None),
        ("(q)uit", None),
    ];
    let mut spans = Vec::new();
    for (idx, (label, command)) in entries.into_iter().enumerate() {
        if idx > 0 {
            spans.push(Span::raw(" / "));
        }
        let enabled = command.map_or(true, |c| app.snapshot.is_enabled(c));
        let style = if enabled {
            italic_style
        } else {
            italic_style.add_modifier(Modifier::DIM | Modifier::CROSSED_OUT)
        };
        spans.push(Span::styled(label, style));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use pickrate::{
        clock::ManualClock, recorder::SessionRecorder, session::CategoryRegistry,
        SessionController, SessionState,
    };
    use ratatui::{backend::TestBackend, Terminal};
    use tempfile::tempdir;

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 24)).unwrap();
        terminal.draw(|f| draw(app, f)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    fn app() -> App {
        let dir = tempdir().unwrap();
        let state = SessionState::new(
            CategoryRegistry::new(["North", "South"]),
            CategoryRegistry::new(["Bin 1"]),
        );
        let clock = ManualClock::new(Local.with_ymd_and_hms(2024, 5, 14, 8, 30, 0).unwrap());
        App::from_controller(SessionController::new(
            state,
            clock,
            SessionRecorder::new(dir.path()),
        ))
    }

    #[test]
    fn test_idle_screen() {
        let content = render(&app());
        assert!(content.contains("READY"));
        assert!(content.contains("Success rate 0.0% (0/0)"));
        assert!(content.contains("Elapsed 00:00:00"));
        assert!(content.contains("0.0 items/min"));
        assert!(content.contains("none"));
    }

    #[test]
    fn test_running_screen_shows_counts_and_selection() {
        let mut app = app();
        app.controller.select(Category::Site, "South");
        app.controller.dispatch(Command::Start).unwrap();
        app.controller.dispatch(Command::RecordSuccess).unwrap();
        app.controller.dispatch(Command::RecordFail).unwrap();
        app.sync();

        let content = render(&app);
        assert!(content.contains("RUNNING"));
        assert!(content.contains("Success rate 50.0% (1/2)"));
        assert!(content.contains("South"));
        assert!(content.contains("Site 2/2"));
    }

    #[test]
    fn test_editing_shows_pending_text() {
        let mut app = app();
        app.mode = InputMode::Editing(Category::Outlet);
        app.controller.set_pending(Category::Outlet, "Chute 9");
        app.sync();

        let content = render(&app);
        assert!(content.contains("New outlet"));
        assert!(content.contains("Chute 9"));
        assert!(content.contains("(enter) select"));
    }

    #[test]
    fn test_status_line() {
        let mut app = app();
        app.status = Some(Status::Error("save failed: disk full".into()));
        assert!(render(&app).contains("save failed: disk full"));
    }
}
