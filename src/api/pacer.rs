use core::time::Duration;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces outbound requests so that consecutive calls are at least `interval` apart.
///
/// Every client that talks to a remote service shares one `Pacer` (wrap it in an `Arc` via
/// [`Pacer::new`]) and calls [`Pacer::wait`] right before issuing a request. The first call
/// returns immediately; each later call sleeps until `interval` has elapsed since the previous
/// call was released.
///
/// Callers are serialized on an async mutex, so the effective request rate never exceeds one
/// request per `interval` even if the pacer is shared across tasks.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    /// Create a new pacer releasing at most one request per `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            interval,
            next_slot: Mutex::new(None),
        })
    }

    /// A pacer that never waits.
    #[must_use]
    pub fn unpaced() -> Arc<Self> {
        Self::new(Duration::ZERO)
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next free request slot.
    pub async fn wait(&self) {
        let mut next_slot = self.next_slot.lock().await;
        if let Some(slot) = *next_slot {
            tokio::time::sleep_until(slot).await;
        }

        *next_slot = Some(Instant::now() + self.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_request_is_not_delayed() {
        let pacer = Pacer::new(Duration::from_millis(500));

        let start = Instant::now();
        pacer.wait().await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_requests_are_spaced() {
        let pacer = Pacer::new(Duration::from_millis(500));

        let start = Instant::now();
        for _ in 0..4 {
            pacer.wait().await;
        }

        // three gaps between four requests
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_counts_toward_the_interval() {
        let pacer = Pacer::new(Duration::from_millis(500));
        pacer.wait().await;

        tokio::time::sleep(Duration::from_millis(800)).await;

        let start = Instant::now();
        pacer.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn unpaced_never_waits() {
        let pacer = Pacer::unpaced();
        let start = std::time::Instant::now();
        for _ in 0..100 {
            pacer.wait().await;
        }

        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
