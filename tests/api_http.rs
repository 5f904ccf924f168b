// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use it_newsfeed::api::{self, AppState};
use it_newsfeed::{NewsStorage, RelevanceEngine, RelevanceHandle};

const BODY_LIMIT: usize = 1024 * 1024;
const SHIPPED_TOML: &str = include_str!("../config/relevance.toml");

fn test_state() -> AppState {
    let engine = RelevanceEngine::from_toml_str(SHIPPED_TOML).expect("shipped config");
    AppState::new(RelevanceHandle::new(engine), Arc::new(NewsStorage::in_memory()))
}

fn sample_news() -> Json {
    json!([
        {
            "id": "1",
            "title": "Apple rolls out urgent security patch",
            "body": "Fixes flaws actively exploited in the wild.",
            "source": "Source B",
            "published_at": "2025-06-15T16:10:00Z"
        },
        {
            "id": "2",
            "title": "Zero-day exploit in Microsoft Edge",
            "body": "New vulnerability affects latest version.",
            "source": "Source A",
            "published_at": "2025-06-15T16:00:00Z"
        }
    ])
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Json) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app
        .clone()
        .oneshot(req.body(body).expect("build request"))
        .await
        .expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Json::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, v)
}

#[tokio::test]
async fn health_returns_ok() {
    let app = api::router(test_state());
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Json::String("OK".into()));
}

#[tokio::test]
async fn ingest_accepts_relevant_items() {
    let app = api::router(test_state());
    let (status, v) = send(&app, "POST", "/ingest", Some(sample_news())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["accepted"], 2);
    assert_eq!(v["stored"], 2);
    assert_eq!(v["total"], 2);
}

#[tokio::test]
async fn ingest_empty_list_is_400() {
    let state = test_state();
    let store = state.store.clone();
    let app = api::router(state);
    let (status, v) = send(&app, "POST", "/ingest", Some(json!([]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "No items provided.");
    assert!(store.is_empty());
}

#[tokio::test]
async fn ingest_missing_required_field_is_422() {
    let app = api::router(test_state());
    let invalid = json!([{ "id": "3", "title": "Invalid News", "published_at": "2025-06-15T16:20:00Z" }]);
    let (status, _) = send(&app, "POST", "/ingest", Some(invalid)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn ingest_blank_title_is_422_and_nothing_stored() {
    let state = test_state();
    let store = state.store.clone();
    let app = api::router(state);
    let mut items = sample_news();
    items[1]["title"] = json!("   ");
    let (status, v) = send(&app, "POST", "/ingest", Some(items)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(v["error"].as_str().unwrap_or_default().contains("title"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn duplicate_ingestion_keeps_one_copy() {
    let app = api::router(test_state());
    send(&app, "POST", "/ingest", Some(sample_news())).await;
    let (_, second) = send(&app, "POST", "/ingest", Some(sample_news())).await;
    assert_eq!(second["accepted"], 2);
    assert_eq!(second["stored"], 0);

    let (status, data) = send(&app, "GET", "/retrieve", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn retrieve_ranks_by_relevance_and_hides_score() {
    let app = api::router(test_state());
    send(&app, "POST", "/ingest", Some(sample_news())).await;

    let (status, data) = send(&app, "GET", "/retrieve", None).await;
    assert_eq!(status, StatusCode::OK);
    let arr = data.as_array().expect("array");
    // "2" scores zero-day 5 + exploit 3; "1" scores patch 2 + exploit 3
    assert_eq!(arr[0]["id"], "2");
    assert_eq!(arr[1]["id"], "1");
    assert!(arr[0].get("relevance_score").is_none());
}

#[tokio::test]
async fn retrieve_filters_by_source() {
    let app = api::router(test_state());
    send(&app, "POST", "/ingest", Some(sample_news())).await;
    let (_, data) = send(&app, "GET", "/retrieve?source=source%20b", None).await;
    let arr = data.as_array().expect("array");
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["id"], "1");
}

#[tokio::test]
async fn threshold_override_applies_to_ingest() {
    let app = api::router(test_state());
    let (_, v) = send(&app, "POST", "/ingest?threshold=6", Some(sample_news())).await;
    assert_eq!(v["accepted"], 1);
    assert_eq!(v["total"], 2);
}

#[tokio::test]
async fn reset_clears_storage() {
    let app = api::router(test_state());
    send(&app, "POST", "/ingest", Some(sample_news())).await;
    let (status, v) = send(&app, "POST", "/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "cleared");
    let (_, data) = send(&app, "GET", "/retrieve", None).await;
    assert_eq!(data.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn debug_score_explains_matches() {
    let app = api::router(test_state());
    let item = json!({
        "id": "x",
        "title": "Ransomware gang claims breach",
        "source": "arstechnica",
        "published_at": "2025-06-15T16:00:00Z"
    });
    let (status, v) = send(&app, "POST", "/debug/score", Some(item)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["base"], 9.0);
    assert_eq!(v["relevant"], true);
    let kws: Vec<&str> = v["matched_keywords"]
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|k| k.as_str())
        .collect();
    assert_eq!(kws, vec!["breach", "ransomware"]);
}

#[tokio::test]
async fn reload_swaps_config_and_rejects_bad_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relevance.toml");
    std::fs::write(&path, "threshold = 100.0").unwrap();

    let app = api::router(test_state().with_config_path(&path));
    let (status, v) = send(&app, "POST", "/admin/reload-config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["threshold"], 100.0);

    // new config has no keywords and a huge threshold: nothing is accepted
    let (_, v) = send(&app, "POST", "/ingest", Some(sample_news())).await;
    assert_eq!(v["accepted"], 0);

    std::fs::write(&path, "[[pattern_bonuses]]\npattern = '('\nbonus = 1").unwrap();
    let (status, v) = send(&app, "POST", "/admin/reload-config", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(v["error"].as_str().unwrap_or_default().contains("reload failed"));
}

#[tokio::test]
async fn since_minutes_window() {
    let app = api::router(test_state());
    let now = chrono::Utc::now();
    let items = json!([
        {
            "id": "fresh",
            "title": "Ransomware outbreak",
            "source": "mock",
            "published_at": (now - chrono::Duration::minutes(5)).to_rfc3339()
        },
        {
            "id": "stale",
            "title": "Ransomware retrospective",
            "source": "mock",
            "published_at": (now - chrono::Duration::hours(5)).to_rfc3339()
        }
    ]);
    send(&app, "POST", "/ingest", Some(items)).await;

    let (_, data) = send(&app, "GET", "/retrieve?since_minutes=60", None).await;
    let arr = data.as_array().expect("array");
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["id"], "fresh");

    let (_, data) = send(&app, "GET", "/retrieve?source=MOCK&since_minutes=60", None).await;
    assert_eq!(data.as_array().map(Vec::len), Some(1));
    let (_, data) = send(&app, "GET", "/retrieve?source=other&since_minutes=60", None).await;
    assert_eq!(data.as_array().map(Vec::len), Some(0));

    let (status, data) = send(&app, "GET", "/retrieve?since_minutes=9223372036854775807", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data.as_array().map(Vec::len), Some(2));
}
