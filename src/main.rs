//! Daily compliment service: binary entrypoint.
//! Loads config, wires the generation pipeline and the daily triggers, and
//! serves the HTTP API on the Shuttle runtime.

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use daily_compliment::{
    api::{self, AppState},
    build_delivery, build_machine, config,
    metrics::Metrics,
    open_store, scheduler,
};

/// `RUST_LOG` filter (default `info`); `LOG_FORMAT=json` switches to JSON lines.
/// The runtime may already have installed a subscriber, in which case ours is skipped.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = config::load_default().context("loading configuration")?;
    let schedule = cfg.schedule.cfg()?;

    let store = open_store(&cfg)?;
    let machine = build_machine(&cfg, store);
    let delivery = Arc::new(build_delivery(&cfg, machine.clone()));

    scheduler::spawn_generate_task(schedule, machine.clone());
    scheduler::spawn_deliver_task(schedule, delivery);
    tracing::info!(
        target: "scheduler",
        generate_at = %schedule.generate_at,
        deliver_at = ?schedule.deliver_at(),
        "daily triggers scheduled"
    );

    let metrics = Metrics::init(&cfg.pipeline.settings())?;
    let router = api::router(AppState::new(machine)).merge(metrics.router());

    Ok(router.into())
}
