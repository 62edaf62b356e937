use std::collections::VecDeque;

use tokio::sync::mpsc;

use crate::event::Event;

/// A FIFO event queue fed from two sides.
///
/// The loop publishes directly with [`publish`](EventBus::publish). Spawned
/// tasks (poll ticks, read-text requests, the input listener) hold a
/// [`Publisher`] and push through a channel. The app loop uses the bus in a
/// three-phase cycle:
/// 1. **Publish**: input, timers and remote completions push events.
/// 2. **Drain**: all pending events are pulled out in arrival order.
/// 3. **Apply**: each event is handled on the loop, the only place state is
///    mutated.
pub struct EventBus {
    queue: VecDeque<Event>,
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

/// Cloneable handle for publishing onto an [`EventBus`] from spawned tasks.
#[derive(Clone)]
pub struct Publisher {
    tx: mpsc::UnboundedSender<Event>,
}

impl Publisher {
    /// Send an event to the bus. Returns `false` once the bus has been dropped.
    pub fn publish(&self, event: Event) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Returns `true` once the owning bus is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create an empty event bus.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            queue: VecDeque::new(),
            tx,
            rx,
        }
    }

    /// Hand out a publisher for use by spawned tasks.
    pub fn publisher(&self) -> Publisher {
        Publisher {
            tx: self.tx.clone(),
        }
    }

    /// Enqueue an event at the back of the queue.
    pub fn publish(&mut self, event: Event) {
        self.queue.push_back(event);
    }

    /// Move everything the publishers have sent so far into the queue.
    fn collect(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.queue.push_back(event);
        }
    }

    /// Remove and return all pending events, preserving insertion order.
    pub fn drain(&mut self) -> Vec<Event> {
        self.collect();
        self.queue.drain(..).collect()
    }

    /// Return `true` if the queue contains at least one event.
    pub fn has_pending(&mut self) -> bool {
        self.collect();
        !self.queue.is_empty()
    }

    /// Wait until a publisher sends something. Cancel-safe, so it can sit in
    /// a `select!` next to a frame timer.
    pub async fn wait(&mut self) {
        if !self.queue.is_empty() {
            return;
        }
        // The bus owns a sender, so the channel never closes while we wait.
        if let Some(event) = self.rx.recv().await {
            self.queue.push_back(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Update;
    use std::time::Instant;

    #[test]
    fn publish_enqueues_events() {
        let mut bus = EventBus::new();
        bus.publish(Event::Tick {
            now: Instant::now(),
        });
        bus.publish(Event::Quit);
        assert!(bus.has_pending());
    }

    #[test]
    fn drain_returns_all_and_empties() {
        let mut bus = EventBus::new();
        bus.publish(Event::Tick {
            now: Instant::now(),
        });
        bus.publisher().publish(Event::Quit);
        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert!(!bus.has_pending());
    }

    #[test]
    fn drain_on_empty_returns_empty() {
        let mut bus = EventBus::new();
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn publisher_events_keep_send_order() {
        let mut bus = EventBus::new();
        let publisher = bus.publisher();
        publisher.publish(Event::Update(Update::ReadTextStarted));
        publisher.publish(Event::Update(Update::PollFailed));
        publisher.publish(Event::Quit);
        let events = bus.drain();
        assert!(matches!(
            &events[0],
            Event::Update(Update::ReadTextStarted)
        ));
        assert!(matches!(&events[1], Event::Update(Update::PollFailed)));
        assert!(matches!(&events[2], Event::Quit));
    }

    #[test]
    fn publisher_reports_closed_bus() {
        let bus = EventBus::new();
        let publisher = bus.publisher();
        assert!(!publisher.is_closed());
        drop(bus);
        assert!(publisher.is_closed());
        assert!(!publisher.publish(Event::Quit));
    }

    #[tokio::test]
    async fn wait_returns_when_a_task_publishes() {
        let mut bus = EventBus::new();
        let publisher = bus.publisher();
        tokio::spawn(async move {
            publisher.publish(Event::Update(Update::PollFailed));
        });
        bus.wait().await;
        assert_eq!(bus.drain().len(), 1);
    }
}
