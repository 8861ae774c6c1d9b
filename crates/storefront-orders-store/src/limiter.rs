//! Rate limiter for spreadsheet API calls.
//!
//! Every call to the spreadsheet goes through [`RateLimiter::execute`], which
//! enforces two ceilings:
//!
//! - at most `max_concurrent` operations in flight, and
//! - at least `min_interval` between the starts of consecutive operations.
//!
//! Concurrency is a fair tokio semaphore. Pacing is a `governor` quota of one
//! start per `min_interval` with no burst, checked once a slot is held. The
//! limiter never retries; the wrapped operation's output is returned
//! unchanged, and its slot is released on every exit path because the permit
//! is a guard dropped with the future.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota};
use tokio::sync::Semaphore;
use tracing::debug;

/// Rate limiter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Maximum operations in flight at once.
    pub max_concurrent: usize,

    /// Minimum spacing between operation starts.
    pub min_interval: Duration,
}

impl RateLimiterConfig {
    /// Limit concurrency only, without spacing between calls.
    #[must_use]
    pub const fn concurrency(max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            min_interval: Duration::ZERO,
        }
    }
}

impl Default for RateLimiterConfig {
    /// One call at a time, one per second (the per-user Sheets quota is 60/min).
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            min_interval: Duration::from_secs(1),
        }
    }
}

/// Serializes and throttles calls to an external API.
pub struct RateLimiter {
    permits: Semaphore,
    max_concurrent: usize,
    pacer: Option<DefaultDirectRateLimiter>,
    min_interval: Duration,
    queued: AtomicUsize,
}

impl RateLimiter {
    /// Create a limiter from configuration. A ceiling of zero is treated as one.
    #[must_use]
    pub fn new(config: RateLimiterConfig) -> Self {
        let max_concurrent = config.max_concurrent.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            permits: Semaphore::new(max_concurrent),
            max_concurrent,
            pacer: Quota::with_period(config.min_interval).map(DefaultDirectRateLimiter::direct),
            min_interval: config.min_interval,
            queued: AtomicUsize::new(0),
        }
    }

    /// Run `operation` once a slot is free and the pacing interval has passed.
    ///
    /// The caller is suspended while queued. The operation's result, success or
    /// failure, is returned as-is.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let waiting = QueuedGuard::enter(&self.queued);
        // the semaphore is never closed, so acquire cannot fail
        let permit = self.permits.acquire().await.ok();
        self.wait_for_turn().await;
        drop(waiting);

        let output = operation().await;
        drop(permit);
        output
    }

    /// Operations currently holding a slot.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    /// Callers waiting for a slot or for their pacing turn.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    /// Configured concurrency ceiling.
    #[must_use]
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Configured spacing between operation starts.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    async fn wait_for_turn(&self) {
        let Some(pacer) = &self.pacer else {
            return;
        };
        if pacer.check().is_err() {
            debug!(
                min_interval_ms = self.min_interval.as_millis(),
                "rate limiter spacing call"
            );
            pacer.until_ready().await;
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_concurrent", &self.max_concurrent)
            .field("min_interval", &self.min_interval)
            .field("in_flight", &self.in_flight())
            .field("queued", &self.queued())
            .finish()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

struct QueuedGuard<'a>(&'a AtomicUsize);

impl<'a> QueuedGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
