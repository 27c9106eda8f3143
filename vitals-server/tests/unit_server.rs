use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use vitals_common::{PerformanceReport, PERFORMANCE_PATH};
use vitals_server::config::MAX_REPORT_BYTES;
use vitals_server::store::{MemoryStore, SampleStore, StoreError};
use vitals_server::{
    handle_ingest, handle_query, parse_report, AppState, Clock, Server, ServerConfig, WindowParams,
};

// --- Test helpers ---

const NOW: u64 = 1_700_000_000_000;

struct MockClock(AtomicU64);

impl MockClock {
    fn new(now: u64) -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(now)))
    }

    fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::Relaxed);
    }
}

impl Clock for MockClock {
    fn unix_now_millis(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Store whose lock is permanently unusable.
struct BrokenStore;

impl SampleStore for BrokenStore {
    fn append(&self, _report: PerformanceReport) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }

    fn all(&self) -> Result<Vec<PerformanceReport>, StoreError> {
        Err(StoreError::Poisoned)
    }
}

fn empty_state() -> (AppState, Arc<MockClock>) {
    let clock = MockClock::new(NOW);
    (AppState::in_memory(1_000, clock.clone() as Arc<dyn Clock>), clock)
}

fn broken_state() -> AppState {
    AppState::new(Arc::new(BrokenStore), MockClock::new(NOW) as Arc<dyn Clock>)
}

fn report_json(url: &str, score: f64) -> Value {
    json!({
        "url": url,
        "timestamp": 42,
        "userAgent": "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
        "metrics": { "lcp": 1800.0, "fid": 8.0, "cls": 0.02, "fcp": 700.0, "ttfb": 120.0, "customMetrics": {} },
        "score": { "score": score, "grade": "A", "details": {} },
        "connectionType": "4g"
    })
}

/// Consume a response body as JSON.
async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn ingest(state: &AppState, body: &Value) -> Response {
    handle_ingest(State(state.clone()), Bytes::from(body.to_string())).await
}

async fn query(state: &AppState, limit: Option<&str>, url: Option<&str>) -> Value {
    let mut pairs = Vec::new();
    if let Some(limit) = limit {
        pairs.push(("limit".to_string(), limit.to_string()));
    }
    if let Some(url) = url {
        pairs.push(("url".to_string(), url.to_string()));
    }
    let response = handle_query(State(state.clone()), Query(pairs)).await;
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await
}

// --- Server struct ---

#[test]
fn test_server_config_defaults_capacity() {
    let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap());
    assert_eq!(config.address.to_string(), "0.0.0.0:9000");
    assert_eq!(config.capacity, 1_000);
}

#[test]
fn test_server_creation_with_config() {
    let config = ServerConfig { address: "127.0.0.1:9000".parse().unwrap(), capacity: 10 };
    let server = Server::new(config);
    assert_eq!(server.address().to_string(), "127.0.0.1:9000");
}

// --- Report parsing ---

#[test]
fn test_parse_report_overwrites_client_timestamp() {
    let body = report_json("/", 90.0).to_string();
    let report = parse_report(body.as_bytes(), NOW).unwrap();
    assert_eq!(report.timestamp, NOW);
}

#[test]
fn test_parse_report_accepts_non_numeric_client_timestamp() {
    let mut body = report_json("/", 90.0);
    body["timestamp"] = json!("2024-01-01T00:00:00Z");
    let report = parse_report(body.to_string().as_bytes(), NOW).unwrap();
    assert_eq!(report.timestamp, NOW);
}

#[test]
fn test_parse_report_requires_each_field() {
    for field in ["url", "metrics", "timestamp"] {
        let mut body = report_json("/", 90.0);
        body.as_object_mut().unwrap().remove(field);
        let err = parse_report(body.to_string().as_bytes(), NOW).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST, "missing {field} must be rejected");
    }
}

#[test]
fn test_parse_report_null_counts_as_missing() {
    let mut body = report_json("/", 90.0);
    body["metrics"] = Value::Null;
    let err = parse_report(body.to_string().as_bytes(), NOW).unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn test_parse_report_passes_through_negative_metrics() {
    let mut body = report_json("/", 90.0);
    body["metrics"]["lcp"] = json!(-5.0);
    let report = parse_report(body.to_string().as_bytes(), NOW).unwrap();
    assert_eq!(report.metrics.lcp, -5.0);
}

#[test]
fn test_parse_report_rejects_non_object_body() {
    let err = parse_report(b"[1, 2, 3]", NOW).unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn test_parse_report_malformed_json_is_internal_error() {
    let err = parse_report(b"{\"url\": ", NOW).unwrap_err();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.to_string(), "Failed to process report");
}

/// Optional fields may be absent or `null`; neither rejects the report.
#[test]
fn test_parse_report_accepts_absent_or_null_optional_fields() {
    for field in ["userAgent", "score", "connectionType"] {
        let mut absent = report_json("/", 90.0);
        absent.as_object_mut().unwrap().remove(field);
        assert!(parse_report(absent.to_string().as_bytes(), NOW).is_ok(), "absent {field}");

        let mut null = report_json("/", 90.0);
        null[field] = Value::Null;
        assert!(parse_report(null.to_string().as_bytes(), NOW).is_ok(), "null {field}");
    }
}

#[test]
fn test_parse_report_null_optional_fields_read_as_defaults() {
    let mut body = report_json("/", 90.0);
    body["userAgent"] = Value::Null;
    body["score"] = Value::Null;
    body["connectionType"] = Value::Null;

    let report = parse_report(body.to_string().as_bytes(), NOW).unwrap();
    assert_eq!(report.user_agent, "");
    assert_eq!(report.score.score, 0.0);
    assert_eq!(report.connection_type, "");
}

/// Browsers serialise NaN and Infinity metric values as `null`.
#[test]
fn test_parse_report_null_or_absent_metric_reads_as_zero() {
    let mut null = report_json("/", 90.0);
    null["metrics"]["fid"] = Value::Null;
    let report = parse_report(null.to_string().as_bytes(), NOW).unwrap();
    assert_eq!(report.metrics.fid, 0.0);
    assert_eq!(report.metrics.lcp, 1800.0);

    let mut absent = report_json("/", 90.0);
    absent["metrics"].as_object_mut().unwrap().remove("fid");
    let report = parse_report(absent.to_string().as_bytes(), NOW).unwrap();
    assert_eq!(report.metrics.fid, 0.0);
}

#[test]
fn test_parse_report_null_inside_score_and_custom_metrics() {
    let mut body = report_json("/", 90.0);
    body["score"] = json!({ "score": null, "grade": null, "details": null });
    body["metrics"]["customMetrics"] = json!({ "heroImage": null, "menuPaint": 320.0 });

    let report = parse_report(body.to_string().as_bytes(), NOW).unwrap();
    assert_eq!(report.score.score, 0.0);
    assert_eq!(report.score.grade, "");
    assert!(report.score.details.is_empty());
    assert_eq!(report.metrics.custom_metrics.len(), 1);
    assert_eq!(report.metrics.custom_metrics.get("menuPaint"), Some(&320.0));
}

// --- Query params ---

#[test]
fn test_effective_limit() {
    let limit = |raw: Option<&str>| WindowParams { limit: raw.map(str::to_string), url: None }.effective_limit();
    assert_eq!(limit(None), 50);
    assert_eq!(limit(Some("10")), 10);
    assert_eq!(limit(Some("100")), 100);
    assert_eq!(limit(Some("5000")), 100);
    assert_eq!(limit(Some("0")), 50);
    assert_eq!(limit(Some("-3")), 50);
    assert_eq!(limit(Some("ten")), 50);
}

#[test]
fn test_empty_url_param_means_no_filter() {
    let params = WindowParams { limit: None, url: Some(String::new()) };
    assert_eq!(params.url_filter(), None);
}

#[test]
fn test_window_params_from_pairs() {
    let params = WindowParams::from_pairs(vec![
        ("limit".to_string(), "7".to_string()),
        ("url".to_string(), "menu".to_string()),
        ("sort".to_string(), "asc".to_string()),
    ]);
    assert_eq!(params.limit.as_deref(), Some("7"));
    assert_eq!(params.url_filter(), Some("menu"));
}

#[test]
fn test_window_params_repeated_key_keeps_first_value() {
    let params = WindowParams::from_pairs(vec![
        ("url".to_string(), "menu".to_string()),
        ("url".to_string(), "x".to_string()),
        ("limit".to_string(), "3".to_string()),
        ("limit".to_string(), "90".to_string()),
    ]);
    assert_eq!(params.url_filter(), Some("menu"));
    assert_eq!(params.effective_limit(), 3);
}

// --- POST ---

#[tokio::test]
async fn test_handle_ingest_acknowledges_and_stores() {
    let (state, _) = empty_state();
    let response = ingest(&state, &report_json("https://example.com/menu", 92.0)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await, json!({ "success": true }));

    let stored = state.store.all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].url, "https://example.com/menu");
    assert_eq!(stored[0].timestamp, NOW, "timestamp must be server capture time");
}

#[tokio::test]
async fn test_handle_ingest_missing_metrics_returns_400() {
    let (state, _) = empty_state();
    let mut body = report_json("/", 90.0);
    body.as_object_mut().unwrap().remove("metrics");

    let response = ingest(&state, &body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response_json(response).await,
        json!({ "success": false, "error": "Invalid report format" })
    );
    assert!(state.store.all().unwrap().is_empty());
}

#[tokio::test]
async fn test_handle_ingest_malformed_json_returns_500() {
    let (state, _) = empty_state();
    let response = handle_ingest(State(state), Bytes::from_static(b"not json")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response_json(response).await,
        json!({ "success": false, "error": "Failed to process report" })
    );
}

#[tokio::test]
async fn test_handle_ingest_ignores_unknown_fields() {
    let (state, _) = empty_state();
    let mut body = report_json("/", 90.0);
    body["sessionId"] = json!("abc-123");
    let response = ingest(&state, &body).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_handle_ingest_null_connection_type_counts_as_unknown() {
    let (state, _) = empty_state();
    let mut body = report_json("/menu", 90.0);
    body["connectionType"] = Value::Null;

    let response = ingest(&state, &body).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.store.all().unwrap()[0].connection_type, "");

    let body = query(&state, None, None).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["aggregated"]["connectionTypes"], json!({ "unknown": 1 }));
}

#[tokio::test]
async fn test_handle_ingest_accepts_null_user_agent_score_and_metric() {
    let (state, _) = empty_state();
    let mut body = report_json("/menu", 90.0);
    body["userAgent"] = Value::Null;
    body["score"] = Value::Null;
    body["metrics"]["fid"] = Value::Null;

    let response = ingest(&state, &body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = query(&state, None, None).await;
    let aggregated = &body["data"]["aggregated"];
    assert_eq!(aggregated["deviceTypes"]["desktop"], 1);
    assert_eq!(aggregated["gradeDistribution"]["F"], 1);
    assert_eq!(aggregated["metrics"]["fid"]["max"], 0.0);
}

#[tokio::test]
async fn test_handle_ingest_store_failure_returns_500() {
    let response = ingest(&broken_state(), &report_json("/", 90.0)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response_json(response).await["error"], "Failed to process report");
}

/// Resubmitting the same report adds a second sample.
#[tokio::test]
async fn test_handle_ingest_duplicates_are_separate_samples() {
    let (state, _) = empty_state();
    let body = report_json("/", 90.0);
    ingest(&state, &body).await;
    ingest(&state, &body).await;
    assert_eq!(state.store.all().unwrap().len(), 2);
}

// --- GET ---

#[tokio::test]
async fn test_handle_query_empty_store_returns_null_aggregate() {
    let (state, _) = empty_state();
    let body = query(&state, None, None).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["reports"], json!([]));
    assert!(body["data"]["aggregated"].is_null());
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn test_handle_query_strips_user_agent() {
    let (state, _) = empty_state();
    ingest(&state, &report_json("/", 90.0)).await;

    let body = query(&state, None, None).await;
    let entry = body["data"]["reports"][0].as_object().unwrap().clone();
    assert!(!entry.contains_key("userAgent"));
    assert_eq!(entry["connectionType"], "4g");
    assert_eq!(entry["metrics"]["lcp"], 1800.0);
}

#[tokio::test]
async fn test_handle_query_default_limit_is_fifty() {
    let (state, clock) = empty_state();
    for _ in 0..70 {
        ingest(&state, &report_json("/", 90.0)).await;
        clock.advance(1);
    }

    let body = query(&state, None, None).await;
    assert_eq!(body["data"]["reports"].as_array().unwrap().len(), 50);
    assert_eq!(body["data"]["total"], 70);
    assert_eq!(body["data"]["aggregated"]["period"]["count"], 50);
}

#[tokio::test]
async fn test_handle_query_limit_is_capped() {
    let (state, clock) = empty_state();
    for _ in 0..150 {
        ingest(&state, &report_json("/", 90.0)).await;
        clock.advance(1);
    }

    let body = query(&state, Some("1000"), None).await;
    assert_eq!(body["data"]["reports"].as_array().unwrap().len(), 100);
    assert_eq!(body["data"]["total"], 150);
}

/// 120 stored, 30 matching: `?url=/menu&limit=10` yields 10 newest matches with total 30.
#[tokio::test]
async fn test_handle_query_filter_and_limit() {
    let (state, clock) = empty_state();
    for i in 0..120 {
        let url = if i % 4 == 0 { "https://example.com/menu" } else { "https://example.com/events" };
        ingest(&state, &report_json(url, 90.0)).await;
        clock.advance(10);
    }

    let body = query(&state, Some("10"), Some("/menu")).await;
    let reports = body["data"]["reports"].as_array().unwrap();
    assert_eq!(reports.len(), 10);
    assert_eq!(body["data"]["total"], 30);
    assert!(reports.iter().all(|r| r["url"] == "https://example.com/menu"));

    let stamps: Vec<u64> = reports.iter().map(|r| r["timestamp"].as_u64().unwrap()).collect();
    assert!(stamps.windows(2).all(|w| w[0] > w[1]), "reports must be most recent first");
    assert_eq!(stamps[0], NOW + 116 * 10);
}

#[tokio::test]
async fn test_handle_query_aggregates_returned_window() {
    let (state, clock) = empty_state();
    for score in [95.0, 85.0, 75.0, 65.0, 10.0] {
        ingest(&state, &report_json("/", score)).await;
        clock.advance(1);
    }

    let aggregated = query(&state, None, None).await["data"]["aggregated"].clone();
    assert_eq!(aggregated["gradeDistribution"], json!({ "A": 1, "B": 1, "C": 1, "D": 1, "F": 1 }));
    assert_eq!(aggregated["deviceTypes"], json!({ "mobile": 0, "tablet": 0, "desktop": 5 }));
    assert_eq!(aggregated["period"], json!({ "from": NOW, "to": NOW + 4, "count": 5 }));
}

#[tokio::test]
async fn test_handle_query_store_failure_returns_500() {
    let response = handle_query(State(broken_state()), Query(Vec::new())).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response_json(response).await,
        json!({ "success": false, "error": "Failed to fetch reports" })
    );
}

/// POST without metrics → 400; valid POST → ack; GET shows it first and counts it.
#[tokio::test]
async fn test_ingest_then_query_scenario() {
    let (state, clock) = empty_state();
    ingest(&state, &report_json("/older", 80.0)).await;
    clock.advance(5);

    let mut invalid = report_json("/bad", 90.0);
    invalid.as_object_mut().unwrap().remove("metrics");
    assert_eq!(ingest(&state, &invalid).await.status(), StatusCode::BAD_REQUEST);

    assert_eq!(ingest(&state, &report_json("/latest", 99.0)).await.status(), StatusCode::OK);

    let body = query(&state, None, None).await;
    assert_eq!(body["data"]["reports"][0]["url"], "/latest");
    assert_eq!(body["data"]["aggregated"]["period"]["count"], 2);
}

// --- Router ---

fn router() -> axum::Router {
    Server::create_router(AppState::new(Arc::new(MemoryStore::new(1_000)), MockClock::new(NOW) as Arc<dyn Clock>))
}

#[tokio::test]
async fn test_router_post_then_get() {
    let app = router();

    let post = Request::builder()
        .method("POST")
        .uri(PERFORMANCE_PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(report_json("/menu", 91.0).to_string()))
        .unwrap();
    let response = app.clone().oneshot(post).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let get = Request::builder().uri(format!("{PERFORMANCE_PATH}?limit=5&url=menu")).body(Body::empty()).unwrap();
    let response = app.oneshot(get).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["reports"][0]["timestamp"], NOW);
}

#[tokio::test]
async fn test_router_junk_query_falls_back_to_defaults() {
    let get = Request::builder().uri(format!("{PERFORMANCE_PATH}?limit=abc")).body(Body::empty()).unwrap();
    let response = router().oneshot(get).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_router_repeated_url_param_filters_by_first_value() {
    let app = router();
    for url in ["/menu", "/checkout"] {
        let post = Request::builder()
            .method("POST")
            .uri(PERFORMANCE_PATH)
            .body(Body::from(report_json(url, 90.0).to_string()))
            .unwrap();
        assert_eq!(app.clone().oneshot(post).await.unwrap().status(), StatusCode::OK);
    }

    let get = Request::builder()
        .uri(format!("{PERFORMANCE_PATH}?url=menu&url=x"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(get).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["reports"][0]["url"], "/menu");
}

#[tokio::test]
async fn test_router_rejects_oversized_report() {
    let post = Request::builder()
        .method("POST")
        .uri(PERFORMANCE_PATH)
        .body(Body::from(vec![b' '; MAX_REPORT_BYTES + 1]))
        .unwrap();
    let response = router().oneshot(post).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_router_health() {
    let get = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = router().oneshot(get).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_router_unknown_method_is_405() {
    let delete = Request::builder().method("DELETE").uri(PERFORMANCE_PATH).body(Body::empty()).unwrap();
    let response = router().oneshot(delete).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
