use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use iris_core::bus::Publisher;
use iris_core::event::Event;
use iris_core::input::Trigger;
use iris_core::state::Update;

use crate::client::VisionApi;

/// Issues read-text requests on demand.
///
/// Each [`invoke`](Self::invoke) publishes [`Update::ReadTextStarted`] right
/// away, then one outcome update once the service answers. Clones share the
/// pending counter and the cancellation token.
pub struct ActionRequester<C: VisionApi> {
    client: Arc<C>,
    publisher: Publisher,
    cancel: CancellationToken,
    in_flight: Arc<AtomicUsize>,
    single_flight: bool,
}

impl<C: VisionApi> Clone for ActionRequester<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            publisher: self.publisher.clone(),
            cancel: self.cancel.clone(),
            in_flight: Arc::clone(&self.in_flight),
            single_flight: self.single_flight,
        }
    }
}

impl<C: VisionApi> ActionRequester<C> {
    pub fn new(client: Arc<C>, publisher: Publisher, cancel: CancellationToken) -> Self {
        Self {
            client,
            publisher,
            cancel,
            in_flight: Arc::new(AtomicUsize::new(0)),
            single_flight: false,
        }
    }

    /// Ignore invocations while an earlier request is still pending.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    /// Requests issued and not yet answered.
    pub fn pending(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Fire one read-text request. Returns `false` if nothing was sent, either
    /// because the view is torn down or a single-flight request is pending.
    pub fn invoke(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if self.single_flight {
            if self
                .in_flight
                .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                tracing::debug!("read_text already pending, ignoring trigger");
                return false;
            }
        } else {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
        }

        self.publisher.publish(Event::Update(Update::ReadTextStarted));
        tracing::info!("read_text requested");

        let client = Arc::clone(&self.client);
        let publisher = self.publisher.clone();
        let cancel = self.cancel.clone();
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            let outcome = client.read_text().await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            if cancel.is_cancelled() {
                tracing::trace!("discarding read_text result after teardown");
                return;
            }

            let update = match outcome {
                Ok(result) => {
                    if result.is_success() {
                        let chars = result.text.as_deref().map_or(0, str::len);
                        tracing::info!(chars, "read_text succeeded");
                    } else {
                        tracing::warn!(
                            status = %result.status,
                            message = ?result.message,
                            "read_text rejected"
                        );
                    }
                    result.into_update()
                }
                Err(err) => {
                    tracing::warn!(error = %err, "read_text unreachable");
                    Update::ReadTextUnreachable
                }
            };
            publisher.publish(Event::Update(update));
        });
        true
    }
}

impl<C: VisionApi> Trigger for ActionRequester<C> {
    fn trigger(&self) {
        self.invoke();
    }
}
