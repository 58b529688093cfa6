use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use shuttle_axum::axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::daily::{DailyGenerationStateMachine, DailyOutcome, GenerationJob};
use crate::store::StoredCompliment;

#[derive(Clone)]
pub struct AppState {
    pub machine: Arc<DailyGenerationStateMachine>,
}

impl AppState {
    pub fn new(machine: Arc<DailyGenerationStateMachine>) -> Self {
        Self { machine }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/compliment/today", get(compliment_today))
        .route("/compliment/{date}", get(compliment_by_date))
        .route("/jobs/{date}", get(job_status))
        .route("/generate", post(generate_today))
        .route("/generate/{date}", post(generate_for_date))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

fn error(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: msg.into() })).into_response()
}

fn parse_date(raw: &str) -> Result<NaiveDate, Response> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| error(StatusCode::BAD_REQUEST, format!("invalid date '{raw}', expected YYYY-MM-DD")))
}

async fn read(state: &AppState, date: NaiveDate) -> Response {
    match state.machine.store().get_by_date(date).await {
        Ok(Some(row)) => Json::<StoredCompliment>(row).into_response(),
        Ok(None) => error(StatusCode::NOT_FOUND, format!("no compliment stored for {date}")),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn compliment_today(State(state): State<AppState>) -> Response {
    read(&state, Utc::now().date_naive()).await
}

async fn compliment_by_date(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    match parse_date(&raw) {
        Ok(date) => read(&state, date).await,
        Err(resp) => resp,
    }
}

async fn job_status(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let date = match parse_date(&raw) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    match state.machine.job(date) {
        Some(job) => Json::<GenerationJob>(job).into_response(),
        None => error(StatusCode::NOT_FOUND, format!("no job recorded for {date}")),
    }
}

async fn trigger(state: &AppState, date: NaiveDate) -> Response {
    match state.machine.run(date).await {
        Ok(outcome) => Json::<DailyOutcome>(outcome).into_response(),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn generate_today(State(state): State<AppState>) -> Response {
    trigger(&state, Utc::now().date_naive()).await
}

async fn generate_for_date(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    match parse_date(&raw) {
        Ok(date) => trigger(&state, date).await,
        Err(resp) => resp,
    }
}
