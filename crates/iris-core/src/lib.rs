//! Core state and plumbing for the Iris vision client.
//!
//! This crate owns everything the view needs that is independent of both the
//! network and the terminal renderer: the caption/connectivity state container,
//! the event bus that carries input and remote outcomes onto the loop, the
//! keyboard binding for the read-text action, the log console model, and the
//! logging subsystem.

pub mod bus;
pub mod console;
pub mod event;
pub mod input;
pub mod logging;
pub mod rate;
pub mod state;
pub mod video;
