// src/ingest/mod.rs
pub mod providers;
pub mod types;

use chrono::{Days, NaiveDate};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::dedup::normalize_key;
use crate::error::ProviderError;
use crate::ingest::types::{Headline, HeadlineRequest, NewsProvider, NewsQuery, RawArticle};

/// NewsAPI puts this in place of titles of removed articles.
const REMOVED_MARKER: &str = "[Removed]";

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("news_articles_total", "Articles returned by the news provider.");
        describe_counter!(
            "news_dedup_total",
            "Articles dropped as duplicate titles within a batch."
        );
        describe_counter!(
            "news_fallback_total",
            "Fetches answered with the configured fallback headlines."
        );
        describe_histogram!("news_fetch_ms", "News provider round-trip in milliseconds.");
    });
}

/// Normalize text: decode entities, strip tags, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Length cap: 500 chars
    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }

    out
}

/// Normalize raw articles into headlines, dropping empty/removed titles and
/// repeated titles (first occurrence wins). Returns (kept, dedup_count).
pub fn normalize_and_dedup(raw: Vec<RawArticle>, page_size: usize) -> (Vec<Headline>, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(raw.len().min(page_size));
    let mut dedup_out = 0usize;

    for art in raw {
        let title = normalize_text(art.title.as_deref().unwrap_or_default());
        if title.is_empty() || title == REMOVED_MARKER {
            continue;
        }
        if !seen.insert(normalize_key(&title)) {
            dedup_out += 1;
            continue;
        }
        let description = art
            .description
            .as_deref()
            .map(normalize_text)
            .filter(|d| !d.is_empty());
        kept.push(Headline {
            title,
            source_id: art.source,
            published_at: art.published_at.unwrap_or_default(),
            description,
        });
        if kept.len() >= page_size {
            break;
        }
    }

    (kept, dedup_out)
}

/// Fetches recent headlines and never hands the caller an empty batch.
pub struct HeadlineSource {
    provider: Arc<dyn NewsProvider>,
    fallback: Vec<Headline>,
    timeout: Duration,
}

impl HeadlineSource {
    /// `fallback` must be non-empty; `AppConfig::validate` enforces it for
    /// configured sources, and a single generic entry is used otherwise.
    pub fn new(provider: Arc<dyn NewsProvider>, fallback: Vec<Headline>, timeout: Duration) -> Self {
        let fallback = if fallback.is_empty() {
            vec![Headline::fallback("A brand new day has started", None)]
        } else {
            fallback
        };
        Self {
            provider,
            fallback,
            timeout,
        }
    }

    pub fn fallback(&self) -> &[Headline] {
        &self.fallback
    }

    /// Most-relevant-first headlines for `today`, or the fallback list if the
    /// provider fails or yields nothing usable.
    pub async fn fetch(&self, req: &HeadlineRequest, today: NaiveDate) -> Vec<Headline> {
        ensure_metrics_described();

        let page_size = req.page_size.max(1);
        let query = NewsQuery {
            query: req.query.clone(),
            sources: req.sources.clone(),
            language: req.language.clone(),
            from: today
                .checked_sub_days(Days::new(u64::from(req.lookback_days)))
                .unwrap_or(today),
            to: today,
            sort_by: req.sort_by.clone(),
            page_size,
        };

        let t0 = std::time::Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.provider.search(&query)).await {
            Ok(r) => r,
            Err(_) => Err(ProviderError::Timeout),
        };
        histogram!("news_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match result {
            Ok(raw) => {
                counter!("news_articles_total").increment(raw.len() as u64);
                let (kept, dedup) = normalize_and_dedup(raw, page_size as usize);
                counter!("news_dedup_total").increment(dedup as u64);
                if kept.is_empty() {
                    tracing::warn!(
                        target: "ingest",
                        provider = self.provider.name(),
                        "no usable headlines, using fallback"
                    );
                    return self.use_fallback();
                }
                tracing::info!(
                    target: "ingest",
                    provider = self.provider.name(),
                    kept = kept.len(),
                    dedup = dedup,
                    "headlines fetched"
                );
                kept
            }
            Err(e) => {
                tracing::warn!(
                    target: "ingest",
                    error = %e,
                    provider = self.provider.name(),
                    "news provider failed, using fallback"
                );
                self.use_fallback()
            }
        }
    }

    fn use_fallback(&self) -> Vec<Headline> {
        counter!("news_fallback_total").increment(1);
        self.fallback.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn art(title: &str) -> RawArticle {
        RawArticle {
            title: Some(title.to_string()),
            description: None,
            source: "the-verge".into(),
            published_at: None,
        }
    }

    #[test]
    fn normalize_text_decodes_and_collapses() {
        let out = normalize_text("  <b>Hello,&nbsp;&nbsp; world</b>  &ldquo;ok&rdquo; ");
        assert_eq!(out, r#"Hello, world "ok""#);
    }

    #[test]
    fn dedup_by_normalized_title_keeps_first() {
        let raw = vec![
            art("Stocks rally"),
            art("  stocks   RALLY "),
            art("New phone launched"),
        ];
        let (kept, dedup) = normalize_and_dedup(raw, 10);
        assert_eq!(dedup, 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].title, "Stocks rally");
        assert_eq!(kept[1].title, "New phone launched");
    }

    #[test]
    fn removed_and_empty_titles_are_dropped_and_page_size_caps() {
        let raw = vec![art("[Removed]"), art("   "), art("a"), art("b"), art("c")];
        let (kept, _) = normalize_and_dedup(raw, 2);
        let titles: Vec<_> = kept.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
    }
}
