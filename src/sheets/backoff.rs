//! Retry pacing for spreadsheet API calls

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_delay_ms: u64,
    max_delay_ms: u64,
    max_retries: u32,
    current_attempt: u32,
}

#[derive(Debug, thiserror::Error)]
#[error("Maximum retry attempts exceeded")]
pub struct MaxRetriesExceeded;

impl ExponentialBackoff {
    pub fn new(initial_ms: u64, max_ms: u64, retries: u32) -> Self {
        Self {
            initial_delay_ms: initial_ms,
            max_delay_ms: max_ms,
            max_retries: retries,
            current_attempt: 0,
        }
    }

    /// Backoff used for Sheets requests: 500ms doubling to 8s, four retries
    pub fn for_sheets() -> Self {
        Self::new(500, 8_000, 4)
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }

    /// Base delay for the current attempt, before jitter
    pub fn base_delay(&self) -> Duration {
        let factor = 2_u64.saturating_pow(self.current_attempt);
        Duration::from_millis(std::cmp::min(
            self.initial_delay_ms.saturating_mul(factor),
            self.max_delay_ms,
        ))
    }

    pub async fn sleep(&mut self) -> Result<(), MaxRetriesExceeded> {
        if self.current_attempt >= self.max_retries {
            return Err(MaxRetriesExceeded);
        }

        let base = self.base_delay();
        let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 4);
        let delay = base + Duration::from_millis(jitter_ms);

        log::warn!(
            "⏳ Retry attempt {} of {} in {}ms",
            self.current_attempt + 1,
            self.max_retries,
            delay.as_millis()
        );

        sleep(delay).await;
        self.current_attempt += 1;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_delay_doubles_and_caps() {
        let mut backoff = ExponentialBackoff::new(100, 350, 10);
        assert_eq!(backoff.base_delay(), Duration::from_millis(100));
        backoff.current_attempt = 1;
        assert_eq!(backoff.base_delay(), Duration::from_millis(200));
        backoff.current_attempt = 2;
        assert_eq!(backoff.base_delay(), Duration::from_millis(350));
        backoff.current_attempt = 60;
        assert_eq!(backoff.base_delay(), Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_gives_up_after_max_retries() {
        let mut backoff = ExponentialBackoff::new(10, 100, 2);
        assert!(backoff.sleep().await.is_ok());
        assert!(backoff.sleep().await.is_ok());
        assert!(backoff.sleep().await.is_err());
        assert_eq!(backoff.attempts(), 2);

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
    }
}
