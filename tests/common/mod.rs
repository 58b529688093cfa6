// tests/common/mod.rs
//
// Stub collaborators shared by the integration tests: scripted news and
// text providers with call counters, a store that fails on demand, and a
// builder for the state machine.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use daily_compliment::daily::{DailyGenerationStateMachine, DailySettings};
use daily_compliment::error::{ProviderError, StoreError};
use daily_compliment::generate::prompt::{Prompt, PromptTemplate};
use daily_compliment::generate::provider::{GenerativeTextProvider, ModelParams};
use daily_compliment::generate::{CandidateGenerator, RetryPolicy};
use daily_compliment::ingest::types::{Headline, HeadlineRequest, NewsProvider, NewsQuery, RawArticle};
use daily_compliment::ingest::HeadlineSource;
use daily_compliment::select::Selector;
use daily_compliment::store::{Datastore, MemoryStore, StoredCompliment};

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ---------------- news ----------------

pub struct StaticNews {
    titles: Vec<String>,
    pub calls: AtomicUsize,
}

impl StaticNews {
    pub fn new(titles: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            titles: titles.iter().map(|t| t.to_string()).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewsProvider for StaticNews {
    async fn search(&self, _q: &NewsQuery) -> Result<Vec<RawArticle>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .titles
            .iter()
            .map(|t| RawArticle {
                title: Some(t.clone()),
                description: None,
                source: "the-verge".into(),
                published_at: None,
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

pub struct FailingNews;

#[async_trait]
impl NewsProvider for FailingNews {
    async fn search(&self, _q: &NewsQuery) -> Result<Vec<RawArticle>, ProviderError> {
        Err(ProviderError::RateLimited)
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

// ---------------- text ----------------

type Reply = Result<String, ProviderError>;

/// Plays back `script` first; once it runs dry, answers with
/// `"<n>: a wonderful compliment about <user prompt>"` (unique per call).
pub struct ScriptedText {
    script: Mutex<VecDeque<Reply>>,
    by_title: Vec<(String, String)>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedText {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            by_title: Vec::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn script(self, replies: Vec<Reply>) -> Self {
        *self.script.lock().unwrap() = replies.into();
        self
    }

    /// Fixed reply whenever the prompt mentions `title`.
    pub fn reply_for(mut self, title: &str, reply: &str) -> Self {
        self.by_title.push((title.to_string(), reply.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeTextProvider for ScriptedText {
    async fn complete(&self, prompt: &Prompt, _p: &ModelParams) -> Result<String, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(reply) = self.script.lock().unwrap().pop_front() {
            return reply;
        }
        if let Some((_, reply)) = self.by_title.iter().find(|(t, _)| prompt.user.contains(t.as_str())) {
            return Ok(reply.clone());
        }
        Ok(format!("{n}: a wonderful compliment about {}", prompt.user.replace('\n', " ")))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

// ---------------- store ----------------

/// In-memory store whose next `fail_inserts` inserts fail with an i/o error.
pub struct FlakyStore {
    inner: MemoryStore,
    fail_inserts: AtomicUsize,
    pub inserts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(fail_inserts: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            fail_inserts: AtomicUsize::new(fail_inserts),
            inserts: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Datastore for FlakyStore {
    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<StoredCompliment>, StoreError> {
        self.inner.get_by_date(date).await
    }

    async fn insert(&self, row: StoredCompliment) -> Result<(), StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let left = self.fail_inserts.load(Ordering::SeqCst);
        if left > 0 {
            self.fail_inserts.store(left - 1, Ordering::SeqCst);
            return Err(StoreError::Io("disk on fire".into()));
        }
        self.inner.insert(row).await
    }

    async fn recent_texts(&self, around: NaiveDate, window_days: u32) -> Result<Vec<String>, StoreError> {
        self.inner.recent_texts(around, window_days).await
    }
}

// ---------------- wiring ----------------

pub fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        call_timeout: Duration::from_secs(2),
    }
}

pub fn request() -> HeadlineRequest {
    HeadlineRequest {
        query: "News".into(),
        sources: vec!["the-verge".into()],
        language: "en".into(),
        sort_by: "popularity".into(),
        lookback_days: 7,
        page_size: 10,
    }
}

pub fn fallback_headlines() -> Vec<Headline> {
    vec![Headline::fallback("A brand new day has started", None)]
}

pub struct Harness {
    pub news: Arc<dyn NewsProvider>,
    pub text: Arc<ScriptedText>,
    pub store: Arc<dyn Datastore>,
    pub policy: RetryPolicy,
    pub settings: DailySettings,
}

impl Harness {
    pub fn new(news: Arc<dyn NewsProvider>, text: ScriptedText) -> Self {
        Self {
            news,
            text: Arc::new(text),
            store: Arc::new(MemoryStore::new()),
            policy: fast_policy(3),
            settings: DailySettings::default(),
        }
    }

    pub fn store(mut self, store: Arc<dyn Datastore>) -> Self {
        self.store = store;
        self
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn settings(mut self, settings: DailySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(&self) -> Arc<DailyGenerationStateMachine> {
        let headlines = HeadlineSource::new(
            self.news.clone(),
            fallback_headlines(),
            Duration::from_secs(2),
        );
        let generator = CandidateGenerator::new(
            self.text.clone(),
            PromptTemplate::default(),
            ModelParams::default(),
            self.policy.clone(),
        );
        Arc::new(DailyGenerationStateMachine::new(
            headlines,
            request(),
            generator,
            Selector::default(),
            self.store.clone(),
            self.settings.clone(),
        ))
    }
}

pub fn stored(date: NaiveDate, text: &str) -> StoredCompliment {
    StoredCompliment {
        date,
        text: text.into(),
        headline_title: "yesterday".into(),
        created_at: chrono::Utc::now(),
    }
}
