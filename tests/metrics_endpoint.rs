// tests/metrics_endpoint.rs
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use headline_sentinel::metrics::{Metrics, ALERTS_TOTAL, DROPPED_TOTAL};

#[tokio::test]
async fn metrics_endpoint_exposes_sentinel_series() {
    let m = Metrics::init().expect("recorder installs once per test binary");

    metrics::counter!(ALERTS_TOTAL).increment(2);
    metrics::counter!(DROPPED_TOTAL, "reason" => "seen").increment(1);

    let resp = m
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("sentinel_alerts_total 2"), "{text}");
    assert!(text.contains(r#"sentinel_dropped_total{reason="seen"} 1"#), "{text}");
}
