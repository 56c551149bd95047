//! Request pacing shared by every search against one site
//!
//! The limiter enforces:
//! - A minimum interval between successive acquisitions (`1 / rps`)
//! - An optional ceiling on requests in flight at once
//!
//! The interval is measured from one acquisition to the next, i.e. from
//! request start to request start. A slow response does not push the next
//! request further out.

use crate::ConfigError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Rate limiter safe to share between concurrent tasks
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum time between two acquisitions
    interval: Duration,

    /// Time of the most recent acquisition; the lock is the pacing lock
    last_request: Mutex<Instant>,

    /// Concurrency gate, absent when no ceiling is configured
    slots: Option<Arc<Semaphore>>,
}

/// Held for the duration of one request
///
/// Dropping the guard frees the concurrency slot. Pacing state was already
/// updated when the guard was handed out.
#[derive(Debug)]
pub struct RateLimitGuard {
    _slot: Option<OwnedSemaphorePermit>,
}

impl RateLimitGuard {
    /// Frees the concurrency slot now rather than at end of scope
    pub fn release(self) {}
}

impl RateLimiter {
    /// Creates a limiter allowing `rps` requests per second and, optionally,
    /// at most `concurrent_requests` unreleased guards at once
    ///
    /// The pacing clock starts now, so the first acquisition also waits one
    /// interval.
    pub fn new(rps: f64, concurrent_requests: Option<usize>) -> Result<Self, ConfigError> {
        if !rps.is_finite() || rps <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "rps must be a positive number, got {}",
                rps
            )));
        }

        let interval = Duration::try_from_secs_f64(1.0 / rps)
            .map_err(|e| ConfigError::Validation(format!("invalid rps {}: {}", rps, e)))?;

        let slots = match concurrent_requests {
            Some(0) => {
                return Err(ConfigError::Validation(
                    "concurrent_requests must be >= 1".to_string(),
                ))
            }
            Some(n) => Some(Arc::new(Semaphore::new(n))),
            None => None,
        };

        Ok(Self {
            interval,
            last_request: Mutex::new(Instant::now()),
            slots,
        })
    }

    /// Waits for a concurrency slot (if capped) and for the pacing interval
    ///
    /// Waiters for the pacing lock sleep while holding it, so two callers can
    /// never both observe the same stale `last_request`.
    pub async fn acquire(&self) -> RateLimitGuard {
        let slot = match &self.slots {
            // The semaphore is never closed, so acquisition cannot fail
            Some(slots) => slots.clone().acquire_owned().await.ok(),
            None => None,
        };

        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        if elapsed < self.interval {
            let wait = self.interval - elapsed;
            tracing::trace!("Pacing request for {:?}", wait);
            tokio::time::sleep(wait).await;
        }
        *last = Instant::now();

        RateLimitGuard { _slot: slot }
    }

    /// Returns the minimum interval between acquisitions
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the number of free concurrency slots, if capped
    pub fn available_slots(&self) -> Option<usize> {
        self.slots.as_ref().map(|s| s.available_permits())
    }
}
