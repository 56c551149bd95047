//! Delivery of new-listing alerts

mod telegram;

pub use telegram::{truncate_message, TelegramNotifier, MESSAGE_CHAR_LIMIT};

use async_trait::async_trait;

/// A sink for alert messages
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `text`, returning whether it was delivered
    ///
    /// Failures are reported through the return value and logged by the
    /// implementation; they never abort the run.
    async fn send(&self, text: &str) -> bool;
}

/// Formats the alert for a single listing
pub fn listing_message(listing: &str) -> String {
    format!("New listing: \n{}", listing)
}
