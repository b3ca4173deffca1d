//! Request pacing shared by all pollers.
//!
//! Exchanges throttle aggressively, so every exchange call in the process
//! goes through one [`RateLimiter`] that enforces a minimum interval between
//! consecutive requests, regardless of which market issues them.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Global minimum-interval gate.
///
/// Callers reserve the next free send slot under a short lock and then
/// sleep until that slot outside the lock, so waiters are served in
/// reservation order and the lock is never held across an await.
pub struct RateLimiter {
    /// Minimum spacing between two requests.
    min_interval: Duration,
    /// Earliest instant at which the next request may go out.
    next_slot: Mutex<Option<Instant>>,
    /// Total slots handed out.
    acquired: AtomicU64,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// # Arguments
    /// * `min_interval` - Minimum time between consecutive requests
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
            acquired: AtomicU64::new(0),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until this caller may issue a request.
    pub async fn acquire(&self) {
        let slot = self.reserve();
        let now = Instant::now();
        if slot > now {
            trace!(wait_ms = (slot - now).as_millis() as u64, "Waiting for rate limit slot");
            tokio::time::sleep_until(slot).await;
        }
    }

    /// Time a caller arriving now would have to wait.
    pub fn pending_delay(&self) -> Duration {
        let now = Instant::now();
        match *self.next_slot.lock() {
            Some(slot) if slot > now => slot - now,
            _ => Duration::ZERO,
        }
    }

    /// Total number of slots handed out.
    pub fn acquired_count(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    /// Reset rate limiter state.
    pub fn reset(&self) {
        *self.next_slot.lock() = None;
    }

    fn reserve(&self) -> Instant {
        let now = Instant::now();
        let mut next = self.next_slot.lock();
        let slot = match *next {
            Some(t) if t > now => t,
            _ => now,
        };
        *next = Some(slot + self.min_interval);
        self.acquired.fetch_add(1, Ordering::Relaxed);
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(4));
        let start = Instant::now();

        limiter.acquire().await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.pending_delay(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_acquires_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_secs(4));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert_eq!(start.elapsed(), Duration::from_secs(8));
        assert_eq!(limiter.acquired_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_gate() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(500)));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap() - start);
        }
        finished.sort();

        assert_eq!(
            finished,
            vec![
                Duration::ZERO,
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(1500),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_gap_does_not_accumulate_credit() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        limiter.acquire().await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(limiter.pending_delay(), Duration::ZERO);

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }
}
