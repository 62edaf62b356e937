//! Fixed-cadence status polling.
//!
//! Every tick spawns its own request, so a slow response never delays the
//! next tick. Completions are published in whatever order they finish; the
//! last one to land decides the caption and connection state.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use iris_core::bus::Publisher;
use iris_core::event::Event;
use iris_core::state::Update;

use crate::client::VisionApi;

pub struct Poller<C: VisionApi> {
    client: Arc<C>,
    period: Duration,
    publisher: Publisher,
}

impl<C: VisionApi> Poller<C> {
    pub fn new(client: Arc<C>, period: Duration, publisher: Publisher) -> Self {
        Self {
            client,
            period,
            publisher,
        }
    }

    /// Start ticking. The first tick fires one period from now. Cancelling
    /// `cancel` stops the timer and suppresses the results of requests still
    /// in flight.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn run(self, cancel: CancellationToken) {
        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(period_ms = self.period.as_millis() as u64, "status poller started");

        let mut seq: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if self.publisher.is_closed() {
                        tracing::debug!("event bus gone, stopping poller");
                        break;
                    }
                    seq += 1;
                    tokio::spawn(poll_once(
                        Arc::clone(&self.client),
                        seq,
                        self.publisher.clone(),
                        cancel.clone(),
                    ));
                }
            }
        }
        tracing::info!(ticks = seq, "status poller stopped");
    }
}

async fn poll_once<C: VisionApi>(
    client: Arc<C>,
    seq: u64,
    publisher: Publisher,
    cancel: CancellationToken,
) {
    let outcome = client.status().await;
    if cancel.is_cancelled() {
        tracing::trace!(seq, "discarding poll result after teardown");
        return;
    }

    let update = match outcome {
        Ok(snapshot) => {
            tracing::trace!(seq, caption = ?snapshot.caption, "status poll ok");
            snapshot.into_update()
        }
        Err(err) => {
            tracing::debug!(seq, error = %err, "status poll failed");
            Update::PollFailed
        }
    };
    publisher.publish(Event::Update(update));
}
