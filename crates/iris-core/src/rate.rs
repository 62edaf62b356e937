use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Counts occurrences per second over a sliding window.
///
/// The app records one sample per decoded video frame and shows the rate in
/// the HUD. Samples older than the window are pruned on every
/// [`record`](RateMeter::record).
pub struct RateMeter {
    samples: VecDeque<Instant>,
    window: Duration,
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl RateMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            window,
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.samples.push_back(now);
        self.prune(now);
    }

    /// Occurrences per second as of `now`. Zero once the source goes quiet for
    /// a whole window.
    pub fn per_second(&self, now: Instant) -> f64 {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return self.samples.len() as f64 / self.window.as_secs_f64();
        };
        let live = self.samples.iter().filter(|&&t| t >= cutoff).count();
        live as f64 / self.window.as_secs_f64()
    }

    /// Forget every sample, e.g. when the source is stopped.
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    fn prune(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };
        while self.samples.front().is_some_and(|&t| t < cutoff) {
            self.samples.pop_front();
        }
    }
}
