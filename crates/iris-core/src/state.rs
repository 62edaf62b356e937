//! The view's state container.
//!
//! Caption text and connectivity are the only shared mutable state in the
//! client. Both are owned by [`AppState`] and change only through
//! [`AppState::apply`], which takes one [`Update`] per poll outcome or
//! read-text outcome. Once the view is torn down the container is
//! [disposed](AppState::dispose) and every later update is dropped.

use std::fmt;
use std::time::{Duration, Instant};

/// Caption shown before the first successful poll.
pub const INITIAL_CAPTION: &str = "Waiting for scene...";
/// Caption used when the service reports an empty or missing caption.
pub const EMPTY_CAPTION: &str = "Analyzing scene...";
/// Caption shown while a read-text request is in flight.
pub const READING_CAPTION: &str = "Reading text...";
/// Caption shown when a read-text request got no usable response.
pub const READ_FAILED_CAPTION: &str = "Failed to connect for OCR";

/// Connectivity to the vision service, as observed by the last completed poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Label for the status badge.
    pub fn label(self) -> &'static str {
        match self {
            Self::Connected => "System Online",
            Self::Disconnected => "Connecting to Server...",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// A single mutation of [`AppState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// A status poll completed and its body parsed. `None` or an empty string
    /// means the service had no caption to report.
    PollSucceeded { caption: Option<String> },
    /// A status poll failed for any reason.
    PollFailed,
    /// A read-text request was issued.
    ReadTextStarted,
    /// The service recognised text.
    ReadTextSucceeded { text: String },
    /// The service answered with a non-success status.
    ReadTextRejected { message: String },
    /// The read-text request got no usable response.
    ReadTextUnreachable,
}

pub struct AppState {
    pub started_at: Instant,
    caption: String,
    connection: ConnectionState,
    pending_reads: usize,
    polls_ok: u64,
    polls_failed: u64,
    disposed: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            caption: INITIAL_CAPTION.to_string(),
            connection: ConnectionState::Disconnected,
            pending_reads: 0,
            polls_ok: 0,
            polls_failed: 0,
            disposed: false,
        }
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Number of read-text requests started but not yet resolved.
    pub fn pending_reads(&self) -> usize {
        self.pending_reads
    }

    /// Completed polls as `(succeeded, failed)`.
    pub fn poll_counts(&self) -> (u64, u64) {
        (self.polls_ok, self.polls_failed)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Mark the view as torn down. Every later [`apply`](Self::apply) is a no-op.
    pub fn dispose(&mut self) {
        self.disposed = true;
    }

    /// Apply one update. Returns `false` if the update was dropped because the
    /// state has been disposed.
    pub fn apply(&mut self, update: Update) -> bool {
        if self.disposed {
            tracing::trace!(?update, "dropping update after dispose");
            return false;
        }

        match update {
            Update::PollSucceeded { caption } => {
                self.polls_ok += 1;
                self.caption = match caption {
                    Some(caption) if !caption.is_empty() => caption,
                    _ => EMPTY_CAPTION.to_string(),
                };
                self.connection = ConnectionState::Connected;
            }
            Update::PollFailed => {
                self.polls_failed += 1;
                self.connection = ConnectionState::Disconnected;
            }
            Update::ReadTextStarted => {
                self.pending_reads += 1;
                self.caption = READING_CAPTION.to_string();
            }
            Update::ReadTextSucceeded { text } => {
                self.finish_read();
                self.caption = format!("OCR: {text}");
            }
            Update::ReadTextRejected { message } => {
                self.finish_read();
                self.caption = format!("Error: {message}");
            }
            Update::ReadTextUnreachable => {
                self.finish_read();
                self.caption = READ_FAILED_CAPTION.to_string();
            }
        }
        true
    }

    fn finish_read(&mut self) {
        self.pending_reads = self.pending_reads.saturating_sub(1);
    }
}
