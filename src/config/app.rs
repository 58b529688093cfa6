// src/config/app.rs
use anyhow::{anyhow, bail, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::daily::DailySettings;
use crate::generate::prompt::PromptTemplate;
use crate::generate::provider::ModelParams;
use crate::generate::RetryPolicy;
use crate::ingest::types::{Headline, HeadlineRequest};
use crate::scheduler::ScheduleCfg;
use crate::select::scoring::DefaultScorer;

/// Marker value meaning "read the secret from the environment".
const ENV_MARKER: &str = "ENV";

fn default_query() -> String {
    "News".to_string()
}
fn default_sources() -> Vec<String> {
    vec!["the-verge".to_string()]
}
fn default_language() -> String {
    "en".to_string()
}
fn default_sort_by() -> String {
    "popularity".to_string()
}
fn default_page_size() -> u32 {
    10
}
fn default_lookback_days() -> u32 {
    7
}
fn default_news_timeout_secs() -> u64 {
    10
}
fn default_env_marker() -> String {
    ENV_MARKER.to_string()
}
fn default_fallback_headlines() -> Vec<FallbackHeadline> {
    vec![
        FallbackHeadline {
            title: "A brand new day has started".to_string(),
            description: Some("Nothing dramatic happened yet, which is news in itself.".to_string()),
        },
        FallbackHeadline {
            title: "People around the world keep trying their best".to_string(),
            description: None,
        },
    ]
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    8_000
}
fn default_llm_timeout_secs() -> u64 {
    20
}
fn default_system_prompt() -> String {
    "Generate a funny compliment based on recent news:".to_string()
}
fn default_user_prompt() -> String {
    "title: {title}\ndescription: {description}".to_string()
}

fn default_candidate_count() -> usize {
    3
}
fn default_max_regenerations() -> u32 {
    2
}
fn default_history_window_days() -> u32 {
    30
}
fn default_fallback_text() -> String {
    "You are doing great today, and that is the best news of all.".to_string()
}
fn default_min_len() -> usize {
    40
}
fn default_max_len() -> usize {
    280
}

fn default_generate_at() -> String {
    "00:00".to_string()
}
fn default_deliver_offset_mins() -> u32 {
    480
}
fn default_first_run_delay_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub news: NewsConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub schedule: ScheduleConfig,
    pub storage: StorageConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackHeadline {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_news_timeout_secs")]
    pub timeout_secs: u64,
    /// "ENV" means: read from NEWSAPI_API_KEY
    #[serde(default = "default_env_marker")]
    pub api_key: String,
    #[serde(default = "default_fallback_headlines")]
    pub fallback_headlines: Vec<FallbackHeadline>,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            query: default_query(),
            sources: default_sources(),
            language: default_language(),
            sort_by: default_sort_by(),
            page_size: default_page_size(),
            lookback_days: default_lookback_days(),
            timeout_secs: default_news_timeout_secs(),
            api_key: default_env_marker(),
            fallback_headlines: default_fallback_headlines(),
        }
    }
}

impl NewsConfig {
    pub fn request(&self) -> HeadlineRequest {
        HeadlineRequest {
            query: self.query.clone(),
            sources: self.sources.clone(),
            language: self.language.clone(),
            sort_by: self.sort_by.clone(),
            lookback_days: self.lookback_days,
            page_size: self.page_size,
        }
    }

    pub fn fallback(&self) -> Vec<Headline> {
        self.fallback_headlines
            .iter()
            .map(|h| Headline::fallback(&h.title, h.description.as_deref()))
            .collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_secret(&self.api_key, "NEWSAPI_API_KEY")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default = "default_system_prompt")]
    pub system: String,
    #[serde(default = "default_user_prompt")]
    pub user: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system: default_system_prompt(),
            user: default_user_prompt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Total provider calls allowed per headline.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default = "default_env_marker")]
    pub api_key: String,
    #[serde(default)]
    pub prompts: PromptConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            timeout_secs: default_llm_timeout_secs(),
            api_key: default_env_marker(),
            prompts: PromptConfig::default(),
        }
    }
}

impl LlmConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            call_timeout: Duration::from_secs(self.timeout_secs.max(1)),
        }
    }

    pub fn model_params(&self) -> ModelParams {
        ModelParams {
            model: self.model.clone(),
            temperature: self.temperature,
        }
    }

    pub fn prompt_template(&self) -> PromptTemplate {
        PromptTemplate::new(&self.prompts.system, &self.prompts.user)
    }

    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_secret(&self.api_key, "OPENAI_API_KEY")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_candidate_count")]
    pub candidate_count: usize,
    #[serde(default = "default_max_regenerations")]
    pub max_regenerations: u32,
    #[serde(default = "default_history_window_days")]
    pub history_window_days: u32,
    #[serde(default = "default_fallback_text")]
    pub fallback_text: String,
    /// Topics the scorer should steer away from (case-insensitive substrings).
    #[serde(default)]
    pub ignored_topics: Vec<String>,
    #[serde(default = "default_min_len")]
    pub min_len: usize,
    #[serde(default = "default_max_len")]
    pub max_len: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            candidate_count: default_candidate_count(),
            max_regenerations: default_max_regenerations(),
            history_window_days: default_history_window_days(),
            fallback_text: default_fallback_text(),
            ignored_topics: Vec::new(),
            min_len: default_min_len(),
            max_len: default_max_len(),
        }
    }
}

impl PipelineConfig {
    pub fn settings(&self) -> DailySettings {
        DailySettings {
            candidate_count: self.candidate_count,
            max_regenerations: self.max_regenerations,
            history_window_days: self.history_window_days,
            fallback_text: self.fallback_text.clone(),
        }
    }

    pub fn scorer(&self) -> DefaultScorer {
        DefaultScorer::new(self.min_len, self.max_len, self.ignored_topics.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// "HH:MM", UTC.
    #[serde(default = "default_generate_at")]
    pub generate_at: String,
    #[serde(default = "default_deliver_offset_mins")]
    pub deliver_offset_mins: u32,
    #[serde(default = "default_first_run_delay_secs")]
    pub first_run_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            generate_at: default_generate_at(),
            deliver_offset_mins: default_deliver_offset_mins(),
            first_run_delay_secs: default_first_run_delay_secs(),
        }
    }
}

impl ScheduleConfig {
    pub fn generate_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.generate_at.trim(), "%H:%M")
            .map_err(|e| anyhow!("schedule.generate_at '{}' is not HH:MM: {e}", self.generate_at))
    }

    /// Delivery must fall on the same UTC date as generation.
    pub fn cfg(&self) -> Result<ScheduleCfg> {
        let cfg = ScheduleCfg {
            generate_at: self.generate_time()?,
            deliver_offset: Duration::from_secs(u64::from(self.deliver_offset_mins) * 60),
            first_run_delay: Duration::from_secs(self.first_run_delay_secs),
        };
        if cfg.deliver_at().is_none() {
            bail!(
                "schedule.deliver_offset_mins {} pushes delivery past midnight after generate_at {}",
                self.deliver_offset_mins,
                self.generate_at
            );
        }
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Absent means in-memory storage (nothing survives a restart).
    #[serde(default)]
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// "ENV" means: read from TG_BOT_TOKEN
    #[serde(default = "default_env_marker")]
    pub bot_token: String,
    #[serde(default)]
    pub chat_ids: Vec<i64>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: default_env_marker(),
            chat_ids: Vec::new(),
        }
    }
}

impl TelegramConfig {
    pub fn resolved_token(&self) -> Option<String> {
        resolve_secret(&self.bot_token, "TG_BOT_TOKEN")
    }
}

impl AppConfig {
    /// Reject configurations the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.news.page_size < 1 {
            bail!("news.page_size must be >= 1");
        }
        if self.news.fallback_headlines.is_empty()
            || self
                .news
                .fallback_headlines
                .iter()
                .any(|h| h.title.trim().is_empty())
        {
            bail!("news.fallback_headlines must contain at least one non-empty title");
        }
        if self.llm.max_retries < 1 {
            bail!("llm.max_retries must be >= 1");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!("llm.temperature must be within 0.0..=2.0");
        }
        if self.llm.base_delay_ms > self.llm.max_delay_ms {
            bail!("llm.base_delay_ms must not exceed llm.max_delay_ms");
        }
        if self.pipeline.candidate_count < 1 {
            bail!("pipeline.candidate_count must be >= 1");
        }
        if self.pipeline.fallback_text.trim().is_empty() {
            bail!("pipeline.fallback_text must not be empty");
        }
        if self.pipeline.min_len > self.pipeline.max_len {
            bail!("pipeline.min_len must not exceed pipeline.max_len");
        }
        self.schedule.cfg()?;
        Ok(())
    }
}

/// `"ENV"` (any case) reads `env_name`; an empty value counts as absent.
fn resolve_secret(raw: &str, env_name: &str) -> Option<String> {
    let raw = raw.trim();
    let value = if raw.eq_ignore_ascii_case(ENV_MARKER) {
        std::env::var(env_name).ok()?
    } else {
        raw.to_string()
    };
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}
