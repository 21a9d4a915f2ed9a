//! Read-only HTTP surface over the headline archive.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::archive::{ArchiveEntry, JsonArchive, ARCHIVE_MAX};

pub const DEFAULT_LIMIT: usize = ARCHIVE_MAX;

#[derive(Clone)]
pub struct AppState {
    archive: Arc<JsonArchive>,
}

impl AppState {
    pub fn new(archive: JsonArchive) -> Self {
        Self {
            archive: Arc::new(archive),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/headlines", get(headlines))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct HeadlinesQuery {
    #[serde(default)]
    limit: Option<usize>,
}

// limit=0 or a missing limit falls back to the default; anything above the
// archive cap is clamped to it.
fn effective_limit(requested: Option<usize>) -> usize {
    match requested {
        Some(0) | None => DEFAULT_LIMIT,
        Some(n) => n.min(ARCHIVE_MAX),
    }
}

async fn headlines(
    State(state): State<AppState>,
    Query(q): Query<HeadlinesQuery>,
) -> Json<Vec<ArchiveEntry>> {
    let limit = effective_limit(q.limit);
    let archive = state.archive.clone();
    // File IO stays off the async workers.
    let headlines = tokio::task::spawn_blocking(move || archive.recent(limit))
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(target: "api", error = %e, "archive read task failed");
            Vec::new()
        });
    Json(headlines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(effective_limit(None), DEFAULT_LIMIT);
        assert_eq!(effective_limit(Some(0)), DEFAULT_LIMIT);
        assert_eq!(effective_limit(Some(3)), 3);
        assert_eq!(effective_limit(Some(10_000)), ARCHIVE_MAX);
    }
}
