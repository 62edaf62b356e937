use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};

#[derive(Debug, Clone, Copy)]
pub struct VisionRects {
    pub top: Rect,
    pub video: Rect,
    pub caption: Rect,
    pub controls: Rect,
    /// Clickable read-text button inside `controls`.
    pub button: Rect,
    pub hud: Rect,
}

impl VisionRects {
    pub fn button_hit(&self, column: u16, row: u16) -> bool {
        self.button.contains(Position::new(column, row))
    }
}

pub fn vision_layout(area: Rect, caption_height: u16, button_width: u16) -> VisionRects {
    let caption_height = caption_height.max(3);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),              // top bar
            Constraint::Min(3),                 // video
            Constraint::Length(caption_height), // caption
            Constraint::Length(5),              // controls + hud
        ])
        .split(area);

    let bottom = chunks[3];
    let button_width = button_width.min(bottom.width);
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(button_width), Constraint::Min(0)])
        .split(bottom);

    let controls = cols[0];
    // Button is the middle three rows of the controls pane.
    let button = Rect {
        x: controls.x,
        y: controls.y + controls.height.saturating_sub(3) / 2,
        width: controls.width,
        height: controls.height.min(3),
    };

    VisionRects {
        top: chunks[0],
        video: chunks[1],
        caption: chunks[2],
        controls,
        button,
        hud: cols[1],
    }
}
