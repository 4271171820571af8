//! HTTP API handlers.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::{DEFAULT_DEPTH, MAX_SNAPSHOT_LIMIT};
use crate::orderbook::store::{BookSummary, SharedBook};

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Book being mirrored.
    pub book: SharedBook,
    /// Prometheus recorder handle, when one is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Process start time.
    pub started_at: OffsetDateTime,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("book", &self.book)
            .field("metrics", &self.metrics.is_some())
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl AppState {
    /// Create new app state.
    pub fn new(book: SharedBook) -> Self {
        Self {
            book,
            metrics: None,
            started_at: OffsetDateTime::now_utc(),
        }
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Ready means the book currently mirrors the exchange.
    pub fn is_ready(&self) -> bool {
        self.book.is_synchronized()
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether the book is synchronized.
    pub ready: bool,
    pub symbol: String,
    pub last_update_id: u64,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// "synchronized" or "resyncing".
    pub status: &'static str,
    /// Seconds since start.
    pub uptime_s: i64,
    /// Book summary.
    #[serde(flatten)]
    pub book: BookSummary,
}

/// Query parameters for `/api/v1/book`.
#[derive(Debug, Deserialize)]
pub struct BookQuery {
    /// Levels per side, default 10.
    pub depth: Option<usize>,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if synchronized, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let summary = state.book.summary();

    let response = ReadyResponse {
        ready: summary.synchronized,
        symbol: summary.symbol,
        last_update_id: summary.last_update_id,
    };

    if response.ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Book handler - top levels of both sides.
pub async fn book(State(state): State<AppState>, Query(query): Query<BookQuery>) -> impl IntoResponse {
    let depth = query.depth.unwrap_or(DEFAULT_DEPTH).min(MAX_SNAPSHOT_LIMIT);
    Json(state.book.view(depth))
}

/// Status handler - sync state and top of book.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let book = state.book.summary();
    let status = if book.synchronized {
        "synchronized"
    } else {
        "resyncing"
    };

    Json(StatusResponse {
        status,
        uptime_s: (OffsetDateTime::now_utc() - state.started_at).whole_seconds(),
        book,
    })
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "metrics recorder not installed".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_follows_book_sync_state() {
        let state = AppState::new(SharedBook::new("ETHUSDT"));
        assert!(!state.is_ready());

        state.book.set_synchronized(true);
        assert!(state.is_ready());
    }

    #[test]
    fn status_response_flattens_book_summary() {
        let summary = SharedBook::new("ETHUSDT").summary();
        let json = serde_json::to_value(StatusResponse {
            status: "resyncing",
            uptime_s: 3,
            book: summary,
        })
        .unwrap();

        assert_eq!(json["symbol"], "ETHUSDT");
        assert_eq!(json["synchronized"], false);
        assert_eq!(json["bid_levels"], 0);
        assert!(json["best_bid"].is_null());
    }
}
