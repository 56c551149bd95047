//! Bounded retry with a fixed delay
//!
//! Each attempt reports its own outcome through [`Attempt`]: retryable
//! failures are tried again, fatal ones are returned untouched.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Outcome of a single attempt
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Finished, stop retrying
    Done(T),
    /// Failed in a way worth another attempt
    Retry(E),
    /// Failed in a way no retry can fix
    Fatal(E),
}

/// Fixed-delay retry policy bounded by a total attempt count
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    cancel: Option<CancellationToken>,
}

impl RetryPolicy {
    /// Creates a policy making at most `max_attempts` attempts in total
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            cancel: None,
        }
    }

    /// Cuts the delay short once `token` is cancelled
    ///
    /// The operation itself is expected to notice cancellation on its next
    /// attempt and report it as fatal.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Runs `op` until it is done, fails fatally, or attempts run out
    ///
    /// `op` receives the 1-based attempt number. On exhaustion the error of
    /// the last attempt is returned.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Attempt::Done(value) => return Ok(value),
                Attempt::Fatal(err) => return Err(err),
                Attempt::Retry(err) => {
                    if attempt >= self.max_attempts {
                        tracing::warn!(
                            "Retries exhausted after {} attempts: {}",
                            attempt,
                            err
                        );
                        return Err(err);
                    }
                    tracing::debug!(
                        "Attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        err,
                        self.delay
                    );
                    self.pause().await;
                    attempt += 1;
                }
            }
        }
    }

    async fn pause(&self) {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay) => {}
                    _ = token.cancelled() => {}
                }
            }
            None => tokio::time::sleep(self.delay).await,
        }
    }
}
