use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use iris_core::console::Console;
use iris_core::logging::LogLevel;

fn level_color(level: LogLevel) -> Color {
    match level {
        LogLevel::Error => Color::Red,
        LogLevel::Warn => Color::Yellow,
        LogLevel::Info => Color::Green,
        LogLevel::Debug => Color::Cyan,
        LogLevel::Trace => Color::DarkGray,
    }
}

/// Render the log console as an overlay covering the top half of `area`.
///
/// A title bar (label, scroll position, key hints) sits above the most recent
/// log entries that fit. Scrolling back moves the window toward older entries.
pub fn render_console(f: &mut Frame, area: Rect, console: &Console) {
    let height = (area.height / 2).max(3).min(area.height);
    if height < 2 {
        return;
    }
    let overlay = Rect { height, ..area };
    f.render_widget(Clear, overlay);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(overlay);

    let position = if console.scroll_offset() == 0 {
        "live".to_string()
    } else {
        format!("-{}", console.scroll_offset())
    };
    let title = Line::from(vec![
        Span::styled(
            " LOGS ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("  {} entries [{}]  ", console.log_lines().len(), position)),
        Span::styled(
            "` to close, PgUp/PgDn to scroll",
            Style::default().fg(Color::Gray),
        ),
    ]);
    f.render_widget(
        Paragraph::new(title).style(Style::default().bg(Color::DarkGray).fg(Color::White)),
        chunks[0],
    );

    let block = Block::default()
        .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
        .style(Style::default().bg(Color::Black));
    let rows = block.inner(chunks[1]).height as usize;

    let entries = console.log_lines();
    let lines: Vec<Line> = console
        .visible_range(rows)
        .filter_map(|i| entries.get(i))
        .map(|entry| {
            Line::from(vec![
                Span::styled(
                    format!(" {:5} ", entry.level),
                    Style::default()
                        .fg(level_color(entry.level))
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("[{}] ", entry.target),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(entry.message.as_str()),
            ])
        })
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), chunks[1]);
}
