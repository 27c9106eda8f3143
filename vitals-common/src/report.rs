use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One page-load sample as captured by the browser and stamped by the server.
///
/// Every field other than `url`, `timestamp` and `metrics` is optional, and an explicit
/// `null` reads the same as an absent field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub url: String,
    /// Milliseconds since the Unix epoch, assigned by the server at ingestion.
    pub timestamp: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_agent: String,
    pub metrics: WebVitals,
    #[serde(default, deserialize_with = "null_as_default")]
    pub score: ReportScore,
    #[serde(default, deserialize_with = "null_as_default")]
    pub connection_type: String,
}

/// Core Web Vitals plus any custom timings the page recorded.
///
/// Browsers serialise NaN and Infinity as `null`; those read as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebVitals {
    #[serde(deserialize_with = "null_as_default")]
    pub lcp: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub fid: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub cls: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub fcp: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub ttfb: f64,
    #[serde(deserialize_with = "without_null_entries")]
    pub custom_metrics: BTreeMap<String, f64>,
}

/// Quality score computed client-side before the report is sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportScore {
    #[serde(deserialize_with = "null_as_default")]
    pub score: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub grade: String,
    #[serde(deserialize_with = "null_as_default")]
    pub details: BTreeMap<String, Value>,
}

/// A report as listed in query responses: everything except the raw user agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub url: String,
    pub timestamp: u64,
    pub score: ReportScore,
    pub metrics: WebVitals,
    pub connection_type: String,
}

impl From<&PerformanceReport> for ReportSummary {
    fn from(report: &PerformanceReport) -> Self {
        Self {
            url: report.url.clone(),
            timestamp: report.timestamp,
            score: report.score.clone(),
            metrics: report.metrics.clone(),
            connection_type: report.connection_type.clone(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn without_null_entries<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Option<BTreeMap<String, Option<f64>>> = Option::deserialize(deserializer)?;
    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect())
}
