use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header::CONTENT_TYPE, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use vitals_common::{
    ApiResponse, PerformanceReport, ReportSummary, WindowData, DEFAULT_QUERY_LIMIT,
    MAX_QUERY_LIMIT, PERFORMANCE_PATH, STORE_CAPACITY,
};

pub mod aggregate;
pub mod config;
pub mod error;
pub mod store;

use aggregate::aggregate;
use config::{CORS_MAX_AGE, MAX_REPORT_BYTES};
use error::ApiError;
use store::{MemoryStore, SampleStore};

/// Top-level fields a report must carry to be accepted.
pub const REQUIRED_FIELDS: [&str; 3] = ["url", "metrics", "timestamp"];

/// Abstraction over current time for testability.
pub trait Clock: Send + Sync {
    fn unix_now_millis(&self) -> u64;
}

/// Production clock backed by `SystemTime`.
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SampleStore>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(store: Arc<dyn SampleStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Fresh in-memory store holding at most `capacity` reports.
    pub fn in_memory(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self::new(Arc::new(MemoryStore::new(capacity)), clock)
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
    /// Maximum number of reports retained in memory.
    pub capacity: usize,
}

impl ServerConfig {
    pub fn new(address: SocketAddr) -> Self {
        Self { address, capacity: STORE_CAPACITY }
    }
}

/// Vitals telemetry server
pub struct Server {
    config: ServerConfig,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Get the server's configured address
    pub fn address(&self) -> SocketAddr {
        self.config.address
    }

    /// Create the application router with the given state
    pub fn create_router(state: AppState) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE])
            .max_age(CORS_MAX_AGE);

        Router::new()
            .route(PERFORMANCE_PATH, get(handle_query).post(handle_ingest))
            .route("/health", get(|| async { "ok" }))
            .layer(DefaultBodyLimit::max(MAX_REPORT_BYTES))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Run until Ctrl+C or SIGTERM, signalling `ready_tx` with the bound address once
    /// accepting connections
    pub async fn run(
        self,
        ready_tx: tokio::sync::oneshot::Sender<SocketAddr>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.serve(ready_tx, shutdown_signal()).await
    }

    /// Run until `shutdown` resolves. The store lives exactly as long as this call.
    pub async fn serve<F>(
        self,
        ready_tx: tokio::sync::oneshot::Sender<SocketAddr>,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let state = AppState::in_memory(self.config.capacity, Arc::new(SystemClock));
        let app = Self::create_router(state);
        let listener = tokio::net::TcpListener::bind(self.config.address).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, capacity = self.config.capacity, "vitals server listening");
        ready_tx.send(local_addr).ok();
        axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
        info!("vitals server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Parse an ingest body, replacing whatever `timestamp` the client sent with `now_ms`.
///
/// Unparseable JSON is an ingest failure; parseable JSON that is not a report
/// (missing required fields, wrong field types) is an invalid report.
pub fn parse_report(body: &[u8], now_ms: u64) -> Result<PerformanceReport, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(ApiError::ingest)?;
    let Value::Object(mut fields) = value else {
        return Err(ApiError::invalid("report body is not a JSON object"));
    };

    let missing = REQUIRED_FIELDS
        .iter()
        .find(|f| fields.get(**f).map_or(true, Value::is_null));
    if let Some(missing) = missing {
        return Err(ApiError::invalid(format!("missing field `{missing}`")));
    }

    fields.insert("timestamp".to_string(), Value::from(now_ms));
    serde_json::from_value(Value::Object(fields)).map_err(|e| ApiError::invalid(e.to_string()))
}

/// Handler for POST /api/performance: validates the report, stamps server time, stores it.
pub async fn handle_ingest(State(state): State<AppState>, body: Bytes) -> Response {
    let report = match parse_report(&body, state.clock.unix_now_millis()) {
        Ok(report) => report,
        Err(e) => return e.into_response(),
    };

    debug!(url = %report.url, timestamp = report.timestamp, "ingesting performance report");
    if let Err(e) = state.store.append(report) {
        return ApiError::ingest(e).into_response();
    }

    (StatusCode::OK, Json(ApiResponse::ack())).into_response()
}

/// Query string accepted by GET /api/performance.
///
/// Both fields stay raw strings so that junk values fall back to defaults instead of
/// failing extraction.
#[derive(Debug, Clone, Default)]
pub struct WindowParams {
    pub limit: Option<String>,
    pub url: Option<String>,
}

impl WindowParams {
    /// Build from decoded query pairs. A repeated key keeps its first value; unknown
    /// keys are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "limit" => &mut params.limit,
                "url" => &mut params.url,
                _ => continue,
            };
            if slot.is_some() {
                warn!(key = %key, ignored = %value, "repeated query parameter, keeping first");
                continue;
            }
            *slot = Some(value);
        }
        params
    }

    /// Requested limit capped at `MAX_QUERY_LIMIT`; missing, zero or unparseable values
    /// fall back to `DEFAULT_QUERY_LIMIT`.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .map_or(DEFAULT_QUERY_LIMIT, |n| n.min(MAX_QUERY_LIMIT))
    }

    pub fn url_filter(&self) -> Option<&str> {
        self.url.as_deref().filter(|s| !s.is_empty())
    }
}

/// Select the window described by `params` and summarise it.
pub fn query_window(
    store: &dyn SampleStore,
    params: &WindowParams,
) -> Result<WindowData, ApiError> {
    let window = store
        .window(params.effective_limit(), params.url_filter())
        .map_err(ApiError::query)?;

    Ok(WindowData {
        aggregated: aggregate(&window.reports),
        reports: window.reports.iter().map(ReportSummary::from).collect(),
        total: window.total,
    })
}

/// Handler for GET /api/performance: returns the recent window and its summary.
pub async fn handle_query(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let params = WindowParams::from_pairs(pairs);
    match query_window(state.store.as_ref(), &params) {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))).into_response(),
        Err(e) => e.into_response(),
    }
}
