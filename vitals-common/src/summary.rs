use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::report::ReportSummary;

/// Payload of a successful window query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowData {
    /// Most recent first.
    pub reports: Vec<ReportSummary>,
    /// `None` (serialized as `null`) when the window is empty.
    pub aggregated: Option<WindowSummary>,
    /// Number of stored reports matching the filter, before the limit is applied.
    pub total: usize,
}

/// Statistics over one window of reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSummary {
    pub period: Period,
    pub metrics: MetricsSummary,
    pub score: MetricStats,
    pub grade_distribution: GradeDistribution,
    pub device_types: DeviceBreakdown,
    pub connection_types: BTreeMap<String, u64>,
}

/// Time span covered by a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub from: u64,
    pub to: u64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub avg: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub lcp: MetricStats,
    pub fid: MetricStats,
    pub cls: MetricStats,
    pub fcp: MetricStats,
    pub ttfb: MetricStats,
}

/// Count of reports per letter grade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeDistribution {
    #[serde(rename = "A")]
    pub a: u64,
    #[serde(rename = "B")]
    pub b: u64,
    #[serde(rename = "C")]
    pub c: u64,
    #[serde(rename = "D")]
    pub d: u64,
    #[serde(rename = "F")]
    pub f: u64,
}

/// Count of reports per coarse device class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBreakdown {
    pub mobile: u64,
    pub tablet: u64,
    pub desktop: u64,
}
