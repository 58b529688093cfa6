// src/lib.rs
// Public library surface for the service binary, the CLI and integration tests.

pub mod api;
pub mod config;
pub mod daily;
pub mod dedup;
pub mod error;
pub mod generate;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod scheduler;
pub mod select;
pub mod store;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::daily::DailyGenerationStateMachine;
use crate::generate::provider::OpenAiProvider;
use crate::generate::CandidateGenerator;
use crate::ingest::providers::NewsApiProvider;
use crate::ingest::HeadlineSource;
use crate::notify::{Delivery, LogNotifier, Notifier, TelegramNotifier};
use crate::select::Selector;
use crate::store::{Datastore, MemoryStore, SqliteStore};

// Convenient access to the router: `crate_root::api::router` and `crate_root::router`
pub use crate::api::router;

/// SQLite when `storage.sqlite_path` is set, otherwise in-memory.
pub fn open_store(cfg: &AppConfig) -> Result<Arc<dyn Datastore>> {
    match cfg.storage.sqlite_path.as_deref() {
        Some(path) => {
            let store = SqliteStore::open(Path::new(path))
                .with_context(|| format!("opening sqlite store at {path}"))?;
            info!(path, "using sqlite store");
            Ok(Arc::new(store))
        }
        None => {
            info!("no storage.sqlite_path configured, using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Wire the production pipeline (NewsAPI + OpenAI) over the given store.
pub fn build_machine(cfg: &AppConfig, store: Arc<dyn Datastore>) -> Arc<DailyGenerationStateMachine> {
    let news_key = cfg.news.resolved_api_key();
    if news_key.is_none() {
        tracing::warn!("NEWSAPI_API_KEY not set, fallback headlines will be used");
    }
    let llm_key = cfg.llm.resolved_api_key();
    if llm_key.is_none() {
        tracing::warn!("OPENAI_API_KEY not set, every day will use the fallback text");
    }

    let news = Arc::new(NewsApiProvider::new(news_key, cfg.news.timeout()));
    let headlines = HeadlineSource::new(news, cfg.news.fallback(), cfg.news.timeout());

    let policy = cfg.llm.retry_policy();
    let llm = Arc::new(OpenAiProvider::new(llm_key, policy.call_timeout));
    let generator = CandidateGenerator::new(
        llm,
        cfg.llm.prompt_template(),
        cfg.llm.model_params(),
        policy,
    );

    let selector = Selector::new(Arc::new(cfg.pipeline.scorer()));

    Arc::new(DailyGenerationStateMachine::new(
        headlines,
        cfg.news.request(),
        generator,
        selector,
        store,
        cfg.pipeline.settings(),
    ))
}

/// Telegram when a bot token resolves, otherwise log-only delivery.
pub fn build_delivery(cfg: &AppConfig, machine: Arc<DailyGenerationStateMachine>) -> Delivery {
    let notifier: Arc<dyn Notifier> = match cfg.telegram.resolved_token() {
        Some(token) => Arc::new(TelegramNotifier::new(token)),
        None => {
            tracing::warn!("TG_BOT_TOKEN not set, deliveries are only logged");
            Arc::new(LogNotifier)
        }
    };
    Delivery::new(machine, notifier, cfg.telegram.chat_ids.clone())
}
