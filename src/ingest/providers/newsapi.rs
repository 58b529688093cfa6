// src/ingest/providers/newsapi.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::error::ProviderError;
use crate::ingest::types::{NewsProvider, NewsQuery, RawArticle};

const EVERYTHING_URL: &str = "https://newsapi.org/v2/everything";

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    articles: Vec<Article>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    source: ArticleSource,
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ArticleSource {
    id: Option<String>,
    name: Option<String>,
}

fn parse_published(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// NewsAPI `/v2/everything` client. Requires an API key.
pub struct NewsApiProvider {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl NewsApiProvider {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("daily-compliment/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key,
            base_url: EVERYTHING_URL.to_string(),
        }
    }

    /// Point at a different endpoint (self-hosted mirror or test server).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn query_params(q: &NewsQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", q.query.clone()),
            ("language", q.language.clone()),
            ("from", q.from.format("%Y-%m-%d").to_string()),
            ("to", q.to.format("%Y-%m-%d").to_string()),
            ("sortBy", q.sort_by.clone()),
            ("pageSize", q.page_size.to_string()),
        ];
        if !q.sources.is_empty() {
            params.push(("sources", q.sources.join(",")));
        }
        params
    }
}

#[async_trait]
impl NewsProvider for NewsApiProvider {
    async fn search(&self, query: &NewsQuery) -> Result<Vec<RawArticle>, ProviderError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(ProviderError::Malformed("NEWSAPI_API_KEY not configured".into()));
        };

        let resp = self
            .http
            .get(&self.base_url)
            .header("X-Api-Key", key)
            .query(&Self::query_params(query))
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;
        if !status.is_success() {
            return Err(ProviderError::from_status(status, &body));
        }

        let env: Envelope = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Malformed(format!("newsapi json: {e}")))?;
        if env.status != "ok" {
            return Err(match env.code.as_deref() {
                Some("rateLimited") => ProviderError::RateLimited,
                _ => ProviderError::Malformed(env.message.unwrap_or(env.status)),
            });
        }

        Ok(env
            .articles
            .into_iter()
            .map(|a| RawArticle {
                title: a.title,
                description: a.description,
                source: a.source.id.or(a.source.name).unwrap_or_default(),
                published_at: a.published_at.as_deref().and_then(parse_published),
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "newsapi"
    }
}
