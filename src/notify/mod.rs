// src/notify/mod.rs
//! Delivery: the "deliver" trigger reads the day's compliment if it is ready
//! and pushes it to every configured chat.

pub mod telegram;

use anyhow::Result;
use chrono::NaiveDate;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;

use crate::daily::{text_id, DailyGenerationStateMachine};

pub use telegram::TelegramNotifier;

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Used when no bot token is configured: logs instead of sending.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        tracing::info!(target: "notify", chat_id, text_id = %text_id(text), "delivery (log only)");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub date: NaiveDate,
    pub text: String,
    pub used_fallback: bool,
    pub sent: usize,
    pub failed: usize,
}

pub struct Delivery {
    machine: Arc<DailyGenerationStateMachine>,
    notifier: Arc<dyn Notifier>,
    chat_ids: Vec<i64>,
}

impl Delivery {
    pub fn new(
        machine: Arc<DailyGenerationStateMachine>,
        notifier: Arc<dyn Notifier>,
        chat_ids: Vec<i64>,
    ) -> Self {
        Self {
            machine,
            notifier,
            chat_ids,
        }
    }

    /// Text to deliver for `date`: the stored row if ready; otherwise run
    /// generation (joins an in-flight run); the fallback text as last resort.
    pub async fn resolve_text(&self, date: NaiveDate) -> (String, bool) {
        match self.machine.store().get_by_date(date).await {
            Ok(Some(row)) => return (row.text, false),
            Ok(None) => {
                tracing::warn!(target: "notify", %date, "no compliment stored yet, generating before delivery");
            }
            Err(e) => {
                tracing::warn!(target: "notify", %date, error = %e, "store read failed before delivery");
            }
        }
        match self.machine.run(date).await {
            Ok(outcome) => (outcome.compliment.text, false),
            Err(e) => {
                tracing::error!(target: "notify", %date, error = %e, "delivering fallback text");
                (self.machine.fallback_text().to_string(), true)
            }
        }
    }

    pub async fn deliver(&self, date: NaiveDate) -> DeliveryReport {
        let (text, used_fallback) = self.resolve_text(date).await;
        let mut sent = 0usize;
        let mut failed = 0usize;

        for &chat_id in &self.chat_ids {
            match self.notifier.send(chat_id, &text).await {
                Ok(()) => {
                    sent += 1;
                    counter!("compliment_deliveries_total", "result" => "ok").increment(1);
                }
                Err(e) => {
                    failed += 1;
                    counter!("compliment_deliveries_total", "result" => "error").increment(1);
                    tracing::warn!(
                        target: "notify",
                        notifier = self.notifier.name(),
                        chat_id,
                        error = %e,
                        "delivery failed"
                    );
                }
            }
        }

        tracing::info!(target: "notify", %date, sent, failed, used_fallback, "delivery finished");
        DeliveryReport {
            date,
            text,
            used_fallback,
            sent,
            failed,
        }
    }
}
