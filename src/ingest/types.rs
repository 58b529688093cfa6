// src/ingest/types.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Source id carried by configured fallback headlines.
pub const FALLBACK_SOURCE_ID: &str = "fallback";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Headline {
    pub title: String,        // normalized text
    pub source_id: String,    // e.g. "the-verge"
    pub published_at: DateTime<Utc>,
    pub description: Option<String>,
}

impl Headline {
    pub fn fallback(title: &str, description: Option<&str>) -> Self {
        Self {
            title: title.trim().to_string(),
            source_id: FALLBACK_SOURCE_ID.to_string(),
            published_at: DateTime::<Utc>::default(),
            description: description.map(|d| d.trim().to_string()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source_id == FALLBACK_SOURCE_ID
    }
}

/// What the pipeline asks the headline source for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlineRequest {
    pub query: String,
    pub sources: Vec<String>,
    pub language: String,
    pub sort_by: String,
    pub lookback_days: u32,
    pub page_size: u32,
}

/// Provider-level search parameters, resolved against a concrete date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub query: String,
    pub sources: Vec<String>,
    pub language: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub sort_by: String,
    pub page_size: u32,
}

/// One article as returned by the provider, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[async_trait::async_trait]
pub trait NewsProvider: Send + Sync {
    async fn search(&self, query: &NewsQuery) -> Result<Vec<RawArticle>, ProviderError>;
    fn name(&self) -> &'static str;
}
