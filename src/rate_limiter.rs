//! Fixed-delay throttling between chunk fetches
//!
//! Providers throttle aggressive batch callers, so the batch fetcher pauses for a
//! fixed delay after each chunk before starting the next one. The pause is not
//! adaptive: it never looks at rate-limit response headers, and it applies the
//! same delay regardless of chunk size or response time. No pause follows the
//! final chunk.

use crate::cancel::CancelHandle;
use crate::error::Result;
use std::time::Duration;

/// Chunk throttle for the fetch loops of one run
#[derive(Clone, Copy, Debug)]
pub struct RateLimiter {
    /// Zero disables throttling
    delay: Duration,
}

impl RateLimiter {
    /// Create a throttle with a fixed delay between chunks
    ///
    /// # Examples
    ///
    /// ```
    /// use acquisition::rate_limiter::RateLimiter;
    /// use std::time::Duration;
    ///
    /// let limiter = RateLimiter::new(Duration::from_millis(1000));
    /// assert_eq!(limiter.delay(), Duration::from_millis(1000));
    /// ```
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Delay between chunks
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Pause after completing chunk `index` (0-based) of `total`
    ///
    /// Sleeps for the configured delay unless this was the last chunk. The sleep
    /// wakes early with a cancellation error if the run is cancelled.
    pub async fn pause_after(&self, index: usize, total: usize, cancel: &CancelHandle) -> Result<()> {
        if index + 1 >= total {
            return Ok(());
        }

        let delay = self.delay();
        if delay.is_zero() {
            return cancel.check();
        }

        tracing::trace!(chunk = index, delay_ms = delay.as_millis() as u64, "Throttling before next chunk");
        cancel.sleep(delay).await
    }
}
