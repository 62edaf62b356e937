//! TUI rendering layer for Iris.
//!
//! Provides the screen layout, shell chrome, video frame renderer and the log
//! console overlay. Everything here draws from borrowed state; [`iris_core`]
//! owns the state itself.

pub mod console;
pub mod frame;
pub mod layout;
pub mod shell;
