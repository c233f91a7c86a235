// HTTP handlers: version, live/recent/history/export queries, benchmark control, settings.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::AppState;
use crate::error::MonitorError;
use crate::export::export_range;
use crate::models::{BenchmarkTrigger, SampleKind, now_ms};
use crate::scheduler::MonitorSettings;

/// Package version (from Cargo.toml).
const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Package name (from Cargo.toml).
const NAME: &str = env!("CARGO_PKG_NAME");

const DEFAULT_RECENT_LIMIT: usize = 100;
const DEFAULT_HISTORY_SPAN_MS: u64 = 60 * 60 * 1000;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn parse_kind(raw: &str) -> Result<SampleKind, Response> {
    raw.parse::<SampleKind>()
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e))
}

#[derive(Debug, Deserialize)]
pub(super) struct LiveParams {
    window_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RecentParams {
    limit: Option<usize>,
}

/// `[from, to)` in epoch ms. Missing `to` means now; missing `from` means one hour before `to`.
#[derive(Debug, Deserialize)]
pub(super) struct RangeParams {
    from: Option<u64>,
    to: Option<u64>,
}

impl RangeParams {
    fn resolve(&self) -> Result<(u64, u64), Response> {
        let to = self.to.unwrap_or_else(|| now_ms() + 1);
        let from = self
            .from
            .unwrap_or_else(|| to.saturating_sub(DEFAULT_HISTORY_SPAN_MS));
        if from > to {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                format!("from ({}) must not be after to ({})", from, to),
            ));
        }
        Ok((from, to))
    }
}

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/interfaces: active interfaces with addresses, the primary, and the last tick's totals.
pub(super) async fn interfaces_handler(State(state): State<AppState>) -> impl IntoResponse {
    let overview = state.overview.borrow().clone();
    Json(overview)
}

/// GET /api/live/{kind}: in-memory window, oldest first. Defaults to the configured window.
pub(super) async fn live_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<LiveParams>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(r) => return r,
    };
    let store = state.publisher.store();
    let window_secs = params.window_secs.unwrap_or_else(|| store.window_secs());
    Json(store.query(kind, window_secs)).into_response()
}

/// GET /api/recent/{kind}: last `limit` in-memory samples, oldest first.
pub(super) async fn recent_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<RecentParams>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(r) => return r,
    };
    let limit = params.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    Json(state.publisher.store().recent(kind, limit)).into_response()
}

/// GET /api/history/{kind}: durable range query.
pub(super) async fn history_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<RangeParams>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(r) => return r,
    };
    let (from, to) = match params.resolve() {
        Ok(r) => r,
        Err(r) => return r,
    };
    match state.publisher.store().history(kind, from, to).await {
        Ok(samples) => Json(samples).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, operation = "history", "history query failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "history query failed")
        }
    }
}

/// GET /api/export/{kind}: flat records for an external CSV/JSON writer.
pub(super) async fn export_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<RangeParams>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(r) => return r,
    };
    let (from, to) = match params.resolve() {
        Ok(r) => r,
        Err(r) => return r,
    };
    match export_range(state.publisher.store(), kind, from, to).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, operation = "export", "export query failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "export query failed")
        }
    }
}

/// GET /api/benchmark: current state and the last terminal result.
pub(super) async fn benchmark_status_handler(State(state): State<AppState>) -> Response {
    let Some(benchmark) = state.benchmark else {
        return error_response(StatusCode::NOT_FOUND, "benchmark disabled");
    };
    Json(serde_json::json!({
        "state": benchmark.state(),
        "lastResult": benchmark.last_result(),
    }))
    .into_response()
}

/// POST /api/benchmark: 202 when started, 409 while one is in flight.
pub(super) async fn benchmark_start_handler(State(state): State<AppState>) -> Response {
    let Some(benchmark) = state.benchmark else {
        return error_response(StatusCode::NOT_FOUND, "benchmark disabled");
    };
    match benchmark.start(BenchmarkTrigger::OnDemand) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "state": benchmark.state() })),
        )
            .into_response(),
        Err(e @ MonitorError::AlreadyRunning) => error_response(StatusCode::CONFLICT, e.to_string()),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// GET /api/settings
pub(super) async fn settings_handler(State(state): State<AppState>) -> impl IntoResponse {
    let settings = *state.settings.borrow();
    Json(settings)
}

/// PUT /api/settings: applied by the scheduler before its next tick.
pub(super) async fn update_settings_handler(
    State(state): State<AppState>,
    Json(settings): Json<MonitorSettings>,
) -> Response {
    if let Err(e) = settings.validate() {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }
    state.settings.send_replace(settings);
    Json(settings).into_response()
}
