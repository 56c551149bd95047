//! Telegram Bot API notifier

use crate::config::NotifierConfig;
use crate::crawler::{Attempt, RateLimiter, RetryPolicy};
use crate::notify::Notifier;
use crate::WatchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Longest message the Bot API accepts, in characters
pub const MESSAGE_CHAR_LIMIT: usize = 4096;

const SEND_ATTEMPTS: u32 = 6;
const SEND_RETRY_DELAY: Duration = Duration::from_secs(2);
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts messages to one chat through a bot
pub struct TelegramNotifier {
    client: Client,
    send_url: String,
    chat_id: i64,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl TelegramNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self, WatchError> {
        let client = Client::builder().timeout(SEND_TIMEOUT).build()?;

        Ok(Self {
            client,
            send_url: format!(
                "{}/bot{}/{}",
                config.base_url.trim_end_matches('/'),
                config.bot_secret,
                config.send_endpoint
            ),
            chat_id: config.chat_id,
            limiter: RateLimiter::new(config.rps, None)?,
            retry: RetryPolicy::new(SEND_ATTEMPTS, SEND_RETRY_DELAY),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> bool {
        let form = [
            ("chat_id", self.chat_id.to_string()),
            ("text", truncate_message(text).to_string()),
        ];
        let form = &form;

        let result = self
            .retry
            .run(|_| async move {
                let guard = self.limiter.acquire().await;
                let response = self.client.post(&self.send_url).form(form).send().await;
                guard.release();

                match response {
                    Ok(response) => Attempt::Done(response.status()),
                    // The request URL carries the bot secret
                    Err(e) => Attempt::Retry(e.without_url()),
                }
            })
            .await;

        match result {
            Ok(status) if status == StatusCode::OK => true,
            Ok(status) => {
                tracing::warn!("Message rejected with status {}", status);
                false
            }
            Err(e) => {
                tracing::warn!("Message delivery failed: {}", e);
                false
            }
        }
    }
}

/// Cuts `text` down to [`MESSAGE_CHAR_LIMIT`] characters
pub fn truncate_message(text: &str) -> &str {
    match text.char_indices().nth(MESSAGE_CHAR_LIMIT) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
