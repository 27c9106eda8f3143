use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};
use vitals_common::{
    ApiResponse, INGEST_FAILED_MESSAGE, INVALID_REPORT_MESSAGE, QUERY_FAILED_MESSAGE,
};

/// Failures surfaced by the telemetry handlers.
///
/// The `Display` text is what the client sees; `detail` is only logged.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid report format")]
    InvalidReport { detail: String },

    #[error("Failed to process report")]
    IngestFailed { detail: String },

    #[error("Failed to fetch reports")]
    QueryFailed { detail: String },
}

impl ApiError {
    pub fn invalid(detail: impl Into<String>) -> Self {
        ApiError::InvalidReport { detail: detail.into() }
    }

    pub fn ingest(detail: impl ToString) -> Self {
        ApiError::IngestFailed { detail: detail.to_string() }
    }

    pub fn query(detail: impl ToString) -> Self {
        ApiError::QueryFailed { detail: detail.to_string() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidReport { .. } => StatusCode::BAD_REQUEST,
            ApiError::IngestFailed { .. } | ApiError::QueryFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            ApiError::InvalidReport { .. } => INVALID_REPORT_MESSAGE,
            ApiError::IngestFailed { .. } => INGEST_FAILED_MESSAGE,
            ApiError::QueryFailed { .. } => QUERY_FAILED_MESSAGE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::InvalidReport { detail } => warn!(%detail, "rejected performance report"),
            ApiError::IngestFailed { detail } => {
                error!(%detail, "failed to ingest performance report")
            }
            ApiError::QueryFailed { detail } => {
                error!(%detail, "failed to query performance reports")
            }
        }
        (self.status(), Json(ApiResponse::<()>::failure(self.public_message()))).into_response()
    }
}
