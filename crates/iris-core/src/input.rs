//! Keyboard alias for the read-text action.
//!
//! [`InputBinding::mount`] starts a listener over the terminal event stream.
//! Key presses matching the trigger character invoke a [`Trigger`]; every
//! event, trigger key included, is forwarded to the [`EventBus`] untouched so
//! the loop still sees it. Dropping the returned [`InputGuard`] stops the
//! listener.
//!
//! [`EventBus`]: crate::bus::EventBus

use std::io;

use crossterm::event::{Event as TermEvent, KeyCode, KeyEvent, KeyEventKind};
use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bus::Publisher;
use crate::event::Event;

/// Something the binding can fire. Implemented by the read-text requester.
pub trait Trigger: Send + Sync + 'static {
    fn trigger(&self);
}

/// Maps a single character key (case-insensitive) to a [`Trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputBinding {
    key: char,
}

impl InputBinding {
    pub fn new(key: char) -> Self {
        Self { key }
    }

    /// Returns `true` for a press (or auto-repeat) of the trigger character in
    /// either case. Modifiers are not inspected.
    pub fn matches(&self, key: &KeyEvent) -> bool {
        if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
            return false;
        }
        match key.code {
            KeyCode::Char(c) => c.to_lowercase().eq(self.key.to_lowercase()),
            _ => false,
        }
    }

    /// Start listening on `events`. The listener runs until the stream ends,
    /// the bus is dropped, or the guard is dropped.
    pub fn mount<S, T>(self, events: S, trigger: T, publisher: Publisher) -> InputGuard
    where
        S: Stream<Item = io::Result<TermEvent>> + Send + Unpin + 'static,
        T: Trigger,
    {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(listen(self, events, trigger, publisher, cancel.clone()));
        tracing::debug!(key = %self.key, "input binding mounted");
        InputGuard {
            cancel,
            handle: Some(handle),
        }
    }
}

async fn listen<S, T>(
    binding: InputBinding,
    mut events: S,
    trigger: T,
    publisher: Publisher,
    cancel: CancellationToken,
) where
    S: Stream<Item = io::Result<TermEvent>> + Unpin,
    T: Trigger,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = events.next() => next,
        };

        let event = match next {
            Some(Ok(event)) => event,
            Some(Err(err)) => {
                tracing::warn!(error = %err, "terminal event stream error");
                continue;
            }
            None => {
                tracing::debug!("terminal event stream ended");
                break;
            }
        };

        let forwarded = match event {
            TermEvent::Key(key) => {
                if binding.matches(&key) {
                    trigger.trigger();
                }
                Event::Key(key)
            }
            TermEvent::Mouse(mouse) => Event::Mouse(mouse),
            TermEvent::Resize(cols, rows) => Event::Resize { cols, rows },
            _ => continue,
        };

        if !publisher.publish(forwarded) {
            break;
        }
    }
    tracing::debug!("input binding unmounted");
}

/// Keeps an [`InputBinding`] listener alive. Dropping it deregisters the
/// listener.
pub struct InputGuard {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl InputGuard {
    /// Returns `true` while the listener task is still running.
    pub fn is_mounted(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the listener and wait for it to exit.
    pub async fn unmount(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "input listener task failed");
            }
        }
    }
}

impl Drop for InputGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
