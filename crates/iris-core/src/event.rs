use std::time::Instant;

use crossterm::event::{KeyEvent, MouseEvent};

use crate::state::Update;

#[derive(Debug, Clone)]
pub enum Event {
    Tick { now: Instant },
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize { cols: u16, rows: u16 },
    /// A state mutation produced by a poll tick or a read-text request.
    Update(Update),
    Quit,
}
