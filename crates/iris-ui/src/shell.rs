use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use iris_core::state::ConnectionState;

use crate::layout::VisionRects;

pub struct ShellView<'a> {
    pub connection: ConnectionState,
    pub caption: &'a str,
    pub trigger_key: char,
    /// A read-text request is outstanding.
    pub busy: bool,
    pub hud: Vec<String>,
}

/// `Read Text (Press 'R')` for trigger key `r`.
pub fn button_label(key: char) -> String {
    format!("Read Text (Press '{}')", key.to_uppercase())
}

/// Columns the button needs: the label plus borders and two cells of padding
/// on each side.
pub fn button_width(key: char) -> u16 {
    let label = button_label(key).width();
    u16::try_from(label + 6).unwrap_or(u16::MAX)
}

/// Cut `text` to at most `max` display columns, ending in `…` when shortened.
pub fn truncate(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max - 1 {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

fn badge(connection: ConnectionState) -> Span<'static> {
    let color = if connection.is_connected() {
        Color::Green
    } else {
        Color::Red
    };
    Span::styled(
        format!("● {}", connection.label()),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )
}

pub fn render_shell(
    f: &mut Frame,
    rects: VisionRects,
    view: ShellView<'_>,
    video: impl FnOnce(&mut Frame, Rect),
) {
    let top = Line::from(vec![
        Span::styled(
            " IRIS ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        badge(view.connection),
    ]);
    f.render_widget(Paragraph::new(top), rects.top);

    video(f, rects.video);

    let caption = Paragraph::new(Text::from(view.caption))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("SCENE"));
    f.render_widget(caption, rects.caption);

    let button_style = if view.busy {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    };
    let inner_width = rects.button.width.saturating_sub(2) as usize;
    let label = truncate(&button_label(view.trigger_key), inner_width);
    let button = Paragraph::new(Line::from(label))
        .alignment(Alignment::Center)
        .style(button_style)
        .block(Block::default().borders(Borders::ALL).border_style(button_style));
    f.render_widget(button, rects.button);

    let hud_width = rects.hud.width.saturating_sub(2) as usize;
    let hud_lines: Vec<Line> = view
        .hud
        .iter()
        .map(|line| Line::from(truncate(line, hud_width)))
        .collect();
    let hud = Paragraph::new(hud_lines).block(Block::default().borders(Borders::ALL).title("HUD"));
    f.render_widget(hud, rects.hud);
}
