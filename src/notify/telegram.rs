use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::Notifier;

const API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API `sendMessage` with bounded retries.
#[derive(Clone)]
pub struct TelegramNotifier {
    token: String,
    api_base: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

impl TelegramNotifier {
    pub fn new(token: String) -> Self {
        Self {
            token,
            api_base: API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Bot API compatible server (local bot-api instance or test server).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base.trim_end_matches('/'), self.token)
    }
}

fn retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// 500ms doubling per attempt, capped at 2^10 steps (~8.5 min).
fn backoff(attempt: u8) -> Duration {
    let shift = u32::from(attempt.saturating_sub(1)).min(10);
    Duration::from_millis(500u64 << shift)
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        let payload = SendMessage { chat_id, text };
        let url = self.endpoint();

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&url)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    let status = rsp.status();
                    if status.is_success() {
                        return Ok(());
                    }
                    if retryable(status) && attempt < self.max_retries {
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Err(anyhow!("Telegram sendMessage HTTP error: {status}"));
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    // reqwest errors embed the URL, which carries the bot token
                    return Err(anyhow!(
                        "Telegram sendMessage request failed: {}",
                        e.without_url()
                    ));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
