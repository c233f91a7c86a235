// HTTP + WebSocket presentation adapter over the series store, benchmark and settings.

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, put},
};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

use crate::benchmark::BenchmarkCoordinator;
use crate::models::NetworkOverview;
use crate::publisher::Publisher;
use crate::scheduler::MonitorSettings;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) publisher: Arc<Publisher>,
    pub(crate) benchmark: Option<Arc<BenchmarkCoordinator>>,
    pub(crate) settings: Arc<watch::Sender<MonitorSettings>>,
    pub(crate) ws_connections: Arc<AtomicUsize>,
    pub(crate) overview: watch::Receiver<NetworkOverview>,
}

pub fn app(
    publisher: Arc<Publisher>,
    benchmark: Option<Arc<BenchmarkCoordinator>>,
    settings: Arc<watch::Sender<MonitorSettings>>,
    ws_connections: Arc<AtomicUsize>,
    overview: watch::Receiver<NetworkOverview>,
) -> Router {
    let state = AppState {
        publisher,
        benchmark,
        settings,
        ws_connections,
        overview,
    };
    Router::new()
        .route("/", get(|| async { "NetScope: sampling network and host metrics" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/interfaces", get(http::interfaces_handler)) // GET /api/interfaces
        .route("/api/live/{kind}", get(http::live_handler)) // GET /api/live/{kind}?window_secs=
        .route("/api/recent/{kind}", get(http::recent_handler)) // GET /api/recent/{kind}?limit=
        .route("/api/history/{kind}", get(http::history_handler)) // GET /api/history/{kind}?from=&to=
        .route("/api/export/{kind}", get(http::export_handler)) // GET /api/export/{kind}?from=&to=
        .route(
            "/api/benchmark",
            get(http::benchmark_status_handler).post(http::benchmark_start_handler),
        ) // GET, POST /api/benchmark
        .route(
            "/api/settings",
            put(http::update_settings_handler).get(http::settings_handler),
        ) // GET, PUT /api/settings
        .route("/ws/updates", get(ws::ws_updates)) // WS /ws/updates
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
