//! Ordered egress proxy pool with a forward-only cursor

use crate::WatchError;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Hands out proxies in pool order, never wrapping around
///
/// Once the cursor passes the end of the pool every further call fails with
/// [`WatchError::ProxiesExhausted`]; the pool is spent for its lifetime.
#[derive(Debug)]
pub struct ProxyRotator {
    pool: Vec<String>,
    cursor: AtomicUsize,
}

impl ProxyRotator {
    pub fn new(pool: Vec<String>) -> Self {
        Self {
            pool,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Returns the next proxy address in pool order
    pub fn next(&self) -> Result<&str, WatchError> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);

        match self.pool.get(index) {
            Some(proxy) => {
                tracing::debug!("Switching to proxy {} ({}/{})", proxy, index + 1, self.pool.len());
                Ok(proxy.as_str())
            }
            None => {
                // Pin the cursor at the end so repeated calls cannot overflow it
                self.cursor.store(self.pool.len(), Ordering::SeqCst);
                tracing::error!("Ran out of proxies ({} in pool)", self.pool.len());
                Err(WatchError::ProxiesExhausted {
                    used: self.pool.len(),
                    total: self.pool.len(),
                })
            }
        }
    }

    /// Number of proxies handed out so far
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::SeqCst).min(self.pool.len())
    }

    /// Number of proxies not yet handed out
    pub fn remaining(&self) -> usize {
        self.pool.len() - self.position()
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}
