use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod report;
pub mod stats;
pub mod summary;

pub use report::{PerformanceReport, ReportScore, ReportSummary, WebVitals};
pub use summary::{
    DeviceBreakdown, GradeDistribution, MetricStats, MetricsSummary, Period, WindowData,
    WindowSummary,
};

/// Number of reports the sample store retains unless configured otherwise.
pub const STORE_CAPACITY: usize = 1_000;

/// Window size used when a query does not ask for one.
pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// Upper bound on the window size a single query may request.
pub const MAX_QUERY_LIMIT: usize = 100;

/// Path both endpoints are mounted on.
pub const PERFORMANCE_PATH: &str = "/api/performance";

/// Message returned with 400 when a report lacks required fields.
pub const INVALID_REPORT_MESSAGE: &str = "Invalid report format";

/// Message returned with 500 when ingesting a report fails unexpectedly.
pub const INGEST_FAILED_MESSAGE: &str = "Failed to process report";

/// Message returned with 500 when reading the window fails unexpectedly.
pub const QUERY_FAILED_MESSAGE: &str = "Failed to fetch reports";

/// Error types for Vitals client operations
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VitalsError {
    #[error("Invalid report format")]
    InvalidReport,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP {0}: {1}")]
    HttpError(u16, String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// JSON envelope wrapping every response the server sends.
///
/// Success responses carry `data` (when the endpoint has a payload); failures carry
/// `error` and never `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(message.into()) }
    }
}

impl ApiResponse<()> {
    /// Bare `{ "success": true }` acknowledgement.
    pub fn ack() -> Self {
        Self { success: true, data: None, error: None }
    }
}

/// Result type for Vitals client operations
pub type Result<T> = std::result::Result<T, VitalsError>;
