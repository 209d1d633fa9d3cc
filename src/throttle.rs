//! Minimum-spacing throttle
//!
//! A leaky bucket of depth one: every `acquire` is granted at least
//! `interval` after the previous grant. Waiters queue on a fair mutex, so
//! concurrent callers (real-time counting and a backfill) share the same
//! ceiling instead of each sleeping on their own.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Throttle that never waits
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next free slot and claim it.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }

        let mut next_slot = self.next_slot.lock().await;
        if let Some(slot) = *next_slot {
            if slot > Instant::now() {
                sleep_until(slot).await;
            }
        }
        *next_slot = Some(Instant::now() + self.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let throttle = Throttle::new(Duration::from_millis(150));
        let start = Instant::now();
        throttle.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquires_are_spaced_by_interval() {
        let throttle = Throttle::new(Duration::from_millis(50));
        let start = Instant::now();
        for _ in 0..4 {
            throttle.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_counts_toward_interval() {
        let throttle = Throttle::new(Duration::from_millis(50));
        throttle.acquire().await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let start = Instant::now();
        throttle.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_ceiling() {
        let throttle = Arc::new(Throttle::new(Duration::from_millis(100)));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let throttle = throttle.clone();
                tokio::spawn(async move { throttle.acquire().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let throttle = Throttle::unlimited();
        for _ in 0..1000 {
            throttle.acquire().await;
        }
        assert_eq!(throttle.interval(), Duration::ZERO);
    }
}
