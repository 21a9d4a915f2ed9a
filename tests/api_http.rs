// tests/api_http.rs
//
// HTTP-level tests for the archive reader Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use headline_sentinel::api::{create_router, AppState};
use headline_sentinel::archive::{ArchiveEntry, JsonArchive};

const BODY_LIMIT: usize = 1024 * 1024;

fn entry(headline: &str) -> ArchiveEntry {
    ArchiveEntry {
        headline: headline.to_string(),
        timestamp: "12 Feb 10:05 AM".to_string(),
        date: "2026-02-12".to_string(),
        source: "nuvama".to_string(),
        entity: String::new(),
    }
}

fn router_over(dir: &std::path::Path) -> Router {
    create_router(AppState::new(JsonArchive::in_dir(dir)))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, bytes.to_vec())
}

#[tokio::test]
async fn health_returns_ok() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = get(router_over(dir.path()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn headlines_are_newest_first_and_limited() {
    let dir = tempfile::tempdir().unwrap();
    let archive = JsonArchive::in_dir(dir.path());
    archive.append(entry("first")).unwrap();
    archive.append(entry("second")).unwrap();
    archive.append(entry("third")).unwrap();

    let (status, body) = get(router_over(dir.path()), "/api/headlines").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    let items = v.as_array().expect("bare array");
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["headline"], "third");
    assert_eq!(items[2]["headline"], "first");
    assert_eq!(items[0]["date"], "2026-02-12");

    let (_, body) = get(router_over(dir.path()), "/api/headlines?limit=2").await;
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn missing_archive_is_an_empty_list() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = get(router_over(dir.path()), "/api/headlines").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"[]");
}
