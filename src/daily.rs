//! # Daily generation state machine
//! Produces exactly one stored compliment per calendar date.
//!
//! Per date: `Pending -> InProgress -> Ready | FailedFallback`. The transition
//! into `InProgress` happens under a per-date async lock, so concurrent
//! triggers for one date never run the pipeline twice: the later trigger waits
//! for the lock, finds `Ready`, and returns the stored row. Different dates use
//! different locks and run independently, but the final duplicate check and
//! the insert share one machine-wide commit lock, so two dates can never both
//! commit the same text. `FailedFallback` (storage failure) is retried by the
//! next trigger.

use chrono::{NaiveDate, Utc};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::dedup::DuplicateGuard;
use crate::error::{DailyError, FailureKind, StoreError};
use crate::generate::{Candidate, CandidateGenerator};
use crate::ingest::types::{Headline, HeadlineRequest};
use crate::ingest::HeadlineSource;
use crate::select::Selector;
use crate::store::{Datastore, StoredCompliment};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("compliment_runs_total", "Daily trigger outcomes.");
        describe_counter!(
            "compliment_fallback_total",
            "Days filled with the fallback text, by reason."
        );
        describe_counter!(
            "compliment_storage_failures_total",
            "Daily runs that ended in FailedFallback."
        );
        describe_histogram!(
            "compliment_generation_ms",
            "Wall time of a full pipeline run in milliseconds."
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Ready,
    FailedFallback,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::FailedFallback)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub date: NaiveDate,
    pub status: JobStatus,
    /// Pipeline runs started for this date (0 if the row was already stored).
    pub attempts: u32,
}

/// How the returned compliment came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Produced by this trigger from a fresh candidate.
    Generated,
    /// Produced by this trigger with the fallback text.
    Fallback,
    /// Already stored (earlier trigger, other process, or before a restart).
    Existing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyOutcome {
    pub compliment: StoredCompliment,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySettings {
    pub candidate_count: usize,
    pub max_regenerations: u32,
    pub history_window_days: u32,
    pub fallback_text: String,
}

impl Default for DailySettings {
    fn default() -> Self {
        Self {
            candidate_count: 3,
            max_regenerations: 2,
            history_window_days: 30,
            fallback_text: "You are doing great today, and that is the best news of all.".to_string(),
        }
    }
}

/// Status record plus the lock that serializes runs for one date.
struct DateSlot {
    run_lock: tokio::sync::Mutex<()>,
    job: Mutex<GenerationJob>,
}

impl DateSlot {
    fn new(date: NaiveDate) -> Self {
        Self {
            run_lock: tokio::sync::Mutex::new(()),
            job: Mutex::new(GenerationJob {
                date,
                status: JobStatus::Pending,
                attempts: 0,
            }),
        }
    }

    fn snapshot(&self) -> GenerationJob {
        self.job.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn update<F: FnOnce(&mut GenerationJob)>(&self, f: F) {
        let mut job = self.job.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut job);
    }
}

pub struct DailyGenerationStateMachine {
    headlines: HeadlineSource,
    request: HeadlineRequest,
    generator: CandidateGenerator,
    selector: Selector,
    guard: DuplicateGuard,
    store: Arc<dyn Datastore>,
    settings: DailySettings,
    slots: Mutex<HashMap<NaiveDate, Arc<DateSlot>>>,
    commit_lock: tokio::sync::Mutex<()>,
}

impl DailyGenerationStateMachine {
    pub fn new(
        headlines: HeadlineSource,
        request: HeadlineRequest,
        generator: CandidateGenerator,
        selector: Selector,
        store: Arc<dyn Datastore>,
        settings: DailySettings,
    ) -> Self {
        let guard = DuplicateGuard::new(settings.max_regenerations, settings.fallback_text.clone());
        Self {
            headlines,
            request,
            generator,
            selector,
            guard,
            store,
            settings,
            slots: Mutex::new(HashMap::new()),
            commit_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn Datastore> {
        &self.store
    }

    pub fn fallback_text(&self) -> &str {
        &self.settings.fallback_text
    }

    /// Current job record for `date`, if any trigger has touched it.
    pub fn job(&self, date: NaiveDate) -> Option<GenerationJob> {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.get(&date).map(|s| s.snapshot())
    }

    fn slot(&self, date: NaiveDate) -> Arc<DateSlot> {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots
            .entry(date)
            .or_insert_with(|| Arc::new(DateSlot::new(date)))
            .clone()
    }

    /// Drops settled job records further than the history window from `around`.
    /// Slots still held by a trigger are kept.
    fn prune_slots(&self, around: NaiveDate) {
        let keep_days = i64::from(self.settings.history_window_days);
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.retain(|date, slot| {
            (*date - around).num_days().abs() <= keep_days
                || Arc::strong_count(slot) > 1
                || !slot.snapshot().status.is_terminal()
        });
    }

    /// Trigger generation for `date`. Idempotent: once a row exists it is
    /// returned without touching any provider.
    pub async fn run(&self, date: NaiveDate) -> Result<DailyOutcome, DailyError> {
        let result = self.run_slot(date).await;
        self.prune_slots(date);
        result
    }

    async fn run_slot(&self, date: NaiveDate) -> Result<DailyOutcome, DailyError> {
        ensure_metrics_described();
        let slot = self.slot(date);
        let _running = slot.run_lock.lock().await;

        if slot.snapshot().status == JobStatus::Ready {
            if let Some(existing) = self.read_existing(date).await? {
                counter!("compliment_runs_total", "outcome" => "existing").increment(1);
                return Ok(existing);
            }
            // Row vanished from the store; treat the date as fresh.
            slot.update(|j| j.status = JobStatus::Pending);
        }

        // A failed date is retryable: it re-enters through Pending.
        if slot.snapshot().status == JobStatus::FailedFallback {
            slot.update(|j| j.status = JobStatus::Pending);
        }

        // A row written before this process started (or by another process).
        if let Some(existing) = self.read_existing(date).await? {
            slot.update(|j| j.status = JobStatus::Ready);
            counter!("compliment_runs_total", "outcome" => "existing").increment(1);
            return Ok(existing);
        }

        // Pending | FailedFallback -> InProgress
        slot.update(|j| {
            j.status = JobStatus::InProgress;
            j.attempts += 1;
        });
        tracing::info!(target: "daily", %date, attempt = slot.snapshot().attempts, "generation started");

        let t0 = std::time::Instant::now();
        let result = self.run_pipeline(date).await;
        histogram!("compliment_generation_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match result {
            Ok(outcome) => {
                slot.update(|j| j.status = JobStatus::Ready);
                let label = match outcome.origin {
                    Origin::Generated => "generated",
                    Origin::Fallback => "fallback",
                    Origin::Existing => "existing",
                };
                counter!("compliment_runs_total", "outcome" => label).increment(1);
                tracing::info!(
                    target: "daily",
                    %date,
                    origin = label,
                    text_id = %text_id(&outcome.compliment.text),
                    "compliment ready"
                );
                Ok(outcome)
            }
            Err(e) => {
                slot.update(|j| j.status = JobStatus::FailedFallback);
                counter!("compliment_runs_total", "outcome" => "failed").increment(1);
                counter!("compliment_storage_failures_total").increment(1);
                tracing::error!(
                    target: "daily",
                    %date,
                    reason = FailureKind::StorageFailure.as_str(),
                    error = %e,
                    "generation failed, date left retryable"
                );
                Err(e)
            }
        }
    }

    async fn read_existing(&self, date: NaiveDate) -> Result<Option<DailyOutcome>, DailyError> {
        let row = self
            .store
            .get_by_date(date)
            .await
            .map_err(|source| DailyError::Storage { date, source })?;
        Ok(row.map(|compliment| DailyOutcome {
            compliment,
            origin: Origin::Existing,
        }))
    }

    async fn run_pipeline(&self, date: NaiveDate) -> Result<DailyOutcome, DailyError> {
        let storage = |source: StoreError| DailyError::Storage { date, source };

        let headlines = self.headlines.fetch(&self.request, date).await;
        let history = self
            .store
            .recent_texts(date, self.settings.history_window_days)
            .await
            .map_err(storage)?;

        let count = self.settings.candidate_count.max(1);
        let mut pool = Vec::with_capacity(count);
        for i in 0..count {
            let headline = pick_headline(&headlines, i, self.headlines.fallback());
            pool.push(self.generator.generate(headline, i as u32).await);
        }

        let top = pick_headline(&headlines, 0, self.headlines.fallback()).clone();
        let selected = self
            .selector
            .select(pool, &history)
            .unwrap_or_else(|| Candidate::exhausted(top.clone(), 0));

        // Other dates may have committed since `history` was read. The fresh
        // read, the guard and the insert run under the commit lock.
        let _commit = self.commit_lock.lock().await;
        let history = self
            .store
            .recent_texts(date, self.settings.history_window_days)
            .await
            .map_err(storage)?;

        // Regenerations cycle through the batch, continuing after the pool.
        let batch: &[Headline] = &headlines;
        let fallback = self.headlines.fallback();
        let generator = &self.generator;
        let mut next_index = count as u32;
        let resolved = self
            .guard
            .check_and_resolve(selected, &history, move || {
                let idx = next_index;
                next_index += 1;
                generator.generate(pick_headline(batch, idx as usize, fallback), idx)
            })
            .await;

        let origin = if resolved.is_fallback() {
            Origin::Fallback
        } else {
            Origin::Generated
        };
        let row = StoredCompliment {
            date,
            text: resolved.text,
            headline_title: resolved.headline.title,
            created_at: Utc::now(),
        };

        match self.store.insert(row.clone()).await {
            Ok(()) => Ok(DailyOutcome {
                compliment: row,
                origin,
            }),
            // Another process stored this date first; its row wins.
            Err(StoreError::DuplicateKey(_)) => {
                tracing::info!(target: "daily", %date, "date already stored elsewhere, reusing row");
                match self.store.get_by_date(date).await.map_err(storage)? {
                    Some(compliment) => Ok(DailyOutcome {
                        compliment,
                        origin: Origin::Existing,
                    }),
                    None => Err(storage(StoreError::Io(format!(
                        "insert for {date} reported duplicate but no row is readable"
                    )))),
                }
            }
            Err(e) => Err(storage(e)),
        }
    }
}

/// Headline `i` of the batch, wrapping around; the fallback list covers an empty batch.
fn pick_headline<'a>(batch: &'a [Headline], i: usize, fallback: &'a [Headline]) -> &'a Headline {
    let src = if batch.is_empty() { fallback } else { batch };
    &src[i % src.len()]
}

/// Short stable id for log lines; compliment text is not logged raw.
pub fn text_id(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_headline_wraps_around_batch() {
        let batch = vec![Headline::fallback("a", None), Headline::fallback("b", None)];
        let fb = vec![Headline::fallback("fb", None)];
        assert_eq!(pick_headline(&batch, 0, &fb).title, "a");
        assert_eq!(pick_headline(&batch, 3, &fb).title, "b");
        assert_eq!(pick_headline(&[], 5, &fb).title, "fb");
    }

    #[test]
    fn text_id_is_short_and_stable() {
        let a = text_id("You are great");
        assert_eq!(a.len(), 12);
        assert_eq!(a, text_id("You are great"));
        assert_ne!(a, text_id("You are grand"));
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Ready.is_terminal());
        assert!(JobStatus::FailedFallback.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
    }
}
