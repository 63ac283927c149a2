//! Fixed-interval pacing for outbound requests.
//!
//! A [`Pacer`] lets the first call through immediately and makes every
//! later call wait until one interval has passed since the previous one.
//! A zero interval disables pacing.

use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct Pacer {
    limiter: Option<DirectLimiter>,
    interval: Duration,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        let limiter = Quota::with_period(interval).map(RateLimiter::direct);
        Self { limiter, interval }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next slot.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn first_call_is_immediate_then_spaced() {
        let pacer = Pacer::from_millis(200);
        let start = Instant::now();
        pacer.wait().await;
        assert!(start.elapsed() < Duration::from_millis(100));
        pacer.wait().await;
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(350));
    }

    #[tokio::test]
    async fn zero_interval_never_waits() {
        let pacer = Pacer::from_millis(0);
        let start = Instant::now();
        for _ in 0..50 {
            pacer.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
