// src/scheduler.rs
//! Daily triggers: generation at `generate_at` (UTC), delivery `deliver_offset`
//! later. Both loops feed the same state machine, so a late or doubled trigger
//! only ever reads the stored row.

use chrono::{DateTime, Days, NaiveTime, TimeDelta, Utc};
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::daily::DailyGenerationStateMachine;
use crate::notify::Delivery;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleCfg {
    pub generate_at: NaiveTime,
    pub deliver_offset: Duration,
    pub first_run_delay: Duration,
}

impl ScheduleCfg {
    /// Delivery time of day; `None` when the offset would cross midnight and
    /// deliver the previous date's compliment on the next date.
    pub fn deliver_at(&self) -> Option<NaiveTime> {
        let offset = TimeDelta::from_std(self.deliver_offset).ok()?;
        match self.generate_at.overflowing_add_signed(offset) {
            (t, 0) => Some(t),
            _ => None,
        }
    }
}

/// Next instant strictly after `now` whose UTC time-of-day is `at`.
pub fn next_fire(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        now.date_naive()
            .checked_add_days(Days::new(1))
            .unwrap_or(now.date_naive())
            .and_time(at)
            .and_utc()
    }
}

fn until(target: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

async fn generate_tick(machine: &DailyGenerationStateMachine) {
    let date = Utc::now().date_naive();
    counter!("scheduler_ticks_total", "task" => "generate").increment(1);
    gauge!("scheduler_last_generate_ts").set(Utc::now().timestamp() as f64);
    match machine.run(date).await {
        Ok(outcome) => {
            tracing::info!(target: "scheduler", %date, origin = ?outcome.origin, "generate trigger done")
        }
        Err(e) => tracing::warn!(target: "scheduler", %date, error = %e, "generate trigger failed"),
    }
}

/// Runs once after `first_run_delay` (catch-up after a restart), then daily
/// at `generate_at`.
pub fn spawn_generate_task(cfg: ScheduleCfg, machine: Arc<DailyGenerationStateMachine>) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(cfg.first_run_delay).await;
        generate_tick(&machine).await;
        loop {
            let now = Utc::now();
            let next = next_fire(now, cfg.generate_at);
            tracing::debug!(target: "scheduler", next = %next, "next generate trigger");
            tokio::time::sleep(until(next, now)).await;
            generate_tick(&machine).await;
        }
    })
}

pub fn spawn_deliver_task(cfg: ScheduleCfg, delivery: Arc<Delivery>) -> JoinHandle<()> {
    // checked when the config is loaded
    let at = cfg.deliver_at().unwrap_or(cfg.generate_at);
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = next_fire(now, at);
            tracing::debug!(target: "scheduler", next = %next, "next deliver trigger");
            tokio::time::sleep(until(next, now)).await;

            counter!("scheduler_ticks_total", "task" => "deliver").increment(1);
            let report = delivery.deliver(Utc::now().date_naive()).await;
            tracing::info!(
                target: "scheduler",
                date = %report.date,
                sent = report.sent,
                failed = report.failed,
                "deliver trigger done"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn fires_later_today_when_time_not_reached() {
        let next = next_fire(at("2025-03-01T05:00:00Z"), hm(6, 0));
        assert_eq!(next, at("2025-03-01T06:00:00Z"));
    }

    #[test]
    fn rolls_to_tomorrow_when_time_passed_or_equal() {
        assert_eq!(
            next_fire(at("2025-03-01T06:00:00Z"), hm(6, 0)),
            at("2025-03-02T06:00:00Z")
        );
        assert_eq!(
            next_fire(at("2025-12-31T23:30:00Z"), hm(6, 0)),
            at("2026-01-01T06:00:00Z")
        );
    }

    #[test]
    fn deliver_time_stays_on_the_generation_date() {
        let mut cfg = ScheduleCfg {
            generate_at: hm(23, 30),
            deliver_offset: Duration::from_secs(29 * 60),
            first_run_delay: Duration::ZERO,
        };
        assert_eq!(cfg.deliver_at(), Some(hm(23, 59)));

        cfg.deliver_offset = Duration::from_secs(60 * 60);
        assert_eq!(cfg.deliver_at(), None);

        cfg.deliver_offset = Duration::from_secs(30 * 60);
        assert_eq!(cfg.deliver_at(), None);
    }
}
