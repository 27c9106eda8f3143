use std::time::Duration;

/// Largest request body accepted on ingest; larger bodies are rejected with 413.
pub const MAX_REPORT_BYTES: usize = 64 * 1024;

/// How long browsers may cache the CORS preflight response.
pub const CORS_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Address the binary binds to when none is given.
pub const DEFAULT_ADDRESS: &str = "0.0.0.0:3000";
