// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /compliment/{date}   (404 before, 200 after generation, 400 on bad date)
// - POST /generate/{date}    (idempotent)
// - GET /jobs/{date}

mod common;

use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use common::*;
use daily_compliment::api::{self, AppState};

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router() -> (Router, Harness) {
    let h = Harness::new(StaticNews::new(&["Stocks rally"]), ScriptedText::new());
    let router = api::router(AppState::new(h.build()));
    (router, h)
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

fn json(bytes: &[u8]) -> Json {
    serde_json::from_slice(bytes).expect("json body")
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _) = test_router();
    let (status, body) = send(&app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap().trim(), "OK");
}

#[tokio::test]
async fn compliment_is_404_until_generated() {
    let (app, h) = test_router();

    let (status, body) = send(&app, "GET", "/compliment/2025-03-01").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json(&body).get("error").is_some());

    let (status, body) = send(&app, "POST", "/generate/2025-03-01").await;
    assert_eq!(status, StatusCode::OK);
    let generated = json(&body);
    assert_eq!(generated["origin"], "generated");
    let text = generated["compliment"]["text"].as_str().expect("text").to_string();
    assert!(!text.is_empty());

    let (status, body) = send(&app, "GET", "/compliment/2025-03-01").await;
    assert_eq!(status, StatusCode::OK);
    let read = json(&body);
    assert_eq!(read["text"], text.as_str());
    assert_eq!(read["date"], "2025-03-01");

    // second trigger: same row, no new provider calls
    let calls = h.text.calls();
    let (status, body) = send(&app, "POST", "/generate/2025-03-01").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["origin"], "existing");
    assert_eq!(h.text.calls(), calls);
}

#[tokio::test]
async fn job_status_reflects_the_state_machine() {
    let (app, _) = test_router();

    let (status, _) = send(&app, "GET", "/jobs/2025-03-02").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app, "POST", "/generate/2025-03-02").await;
    let (status, body) = send(&app, "GET", "/jobs/2025-03-02").await;
    assert_eq!(status, StatusCode::OK);
    let job = json(&body);
    assert_eq!(job["status"], "ready");
    assert_eq!(job["attempts"], 1);
}

#[tokio::test]
async fn malformed_date_is_rejected() {
    let (app, _) = test_router();
    for uri in ["/compliment/03-01-2025", "/jobs/yesterday", "/generate/2025-13-40"] {
        let method = if uri.starts_with("/generate") { "POST" } else { "GET" };
        let (status, _) = send(&app, method, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn today_routes_use_the_current_date() {
    let (app, _) = test_router();
    let (status, body) = send(&app, "POST", "/generate").await;
    assert_eq!(status, StatusCode::OK);
    let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();
    assert_eq!(json(&body)["compliment"]["date"], today.as_str());

    let (status, _) = send(&app, "GET", "/compliment/today").await;
    assert_eq!(status, StatusCode::OK);
}
