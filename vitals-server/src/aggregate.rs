//! Statistics over a window of performance reports.
//!
//! Everything here is a pure function of its input: no clock, no store access.

use std::collections::BTreeMap;
use vitals_common::stats::{nearest_rank, sort_f64};
use vitals_common::{
    DeviceBreakdown, GradeDistribution, MetricStats, MetricsSummary, PerformanceReport, Period,
    WebVitals, WindowSummary,
};

/// Letter grade bucket for an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// A ≥ 90, B ≥ 80, C ≥ 70, D ≥ 60, F otherwise (including NaN).
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::A
        } else if score >= 80.0 {
            Grade::B
        } else if score >= 70.0 {
            Grade::C
        } else if score >= 60.0 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

/// Coarse device class derived from a user-agent string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

const MOBILE_PATTERNS: [&str; 3] = ["mobile", "android", "iphone"];
const TABLET_PATTERNS: [&str; 2] = ["tablet", "ipad"];

impl DeviceClass {
    /// Case-insensitive substring match; mobile patterns are checked before tablet ones.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_lowercase();
        if MOBILE_PATTERNS.iter().any(|p| ua.contains(p)) {
            DeviceClass::Mobile
        } else if TABLET_PATTERNS.iter().any(|p| ua.contains(p)) {
            DeviceClass::Tablet
        } else {
            DeviceClass::Desktop
        }
    }
}

/// Summarise `reports`. Returns `None` when there is nothing to summarise.
pub fn aggregate(reports: &[PerformanceReport]) -> Option<WindowSummary> {
    if reports.is_empty() {
        return None;
    }

    let mut grades = GradeDistribution::default();
    let mut devices = DeviceBreakdown::default();
    let mut connections: BTreeMap<String, u64> = BTreeMap::new();

    for report in reports {
        match Grade::from_score(report.score.score) {
            Grade::A => grades.a += 1,
            Grade::B => grades.b += 1,
            Grade::C => grades.c += 1,
            Grade::D => grades.d += 1,
            Grade::F => grades.f += 1,
        }

        match DeviceClass::from_user_agent(&report.user_agent) {
            DeviceClass::Mobile => devices.mobile += 1,
            DeviceClass::Tablet => devices.tablet += 1,
            DeviceClass::Desktop => devices.desktop += 1,
        }

        let connection = match report.connection_type.as_str() {
            "" => "unknown",
            other => other,
        };
        *connections.entry(connection.to_string()).or_insert(0) += 1;
    }

    // Non-empty, so both folds see at least one timestamp.
    let from = reports.iter().map(|r| r.timestamp).min().unwrap_or_default();
    let to = reports.iter().map(|r| r.timestamp).max().unwrap_or_default();

    Some(WindowSummary {
        period: Period { from, to, count: reports.len() },
        metrics: MetricsSummary {
            lcp: metric_stats(reports, |m| m.lcp),
            fid: metric_stats(reports, |m| m.fid),
            cls: metric_stats(reports, |m| m.cls),
            fcp: metric_stats(reports, |m| m.fcp),
            ttfb: metric_stats(reports, |m| m.ttfb),
        },
        score: stats(reports.iter().map(|r| r.score.score).collect()),
        grade_distribution: grades,
        device_types: devices,
        connection_types: connections,
    })
}

fn metric_stats(reports: &[PerformanceReport], pick: impl Fn(&WebVitals) -> f64) -> MetricStats {
    stats(reports.iter().map(|r| pick(&r.metrics)).collect())
}

/// Mean, nearest-rank percentiles and extremes. An empty input yields all zeros.
pub fn stats(mut values: Vec<f64>) -> MetricStats {
    if values.is_empty() {
        return MetricStats::default();
    }
    sort_f64(&mut values);

    let sum: f64 = values.iter().sum();
    let pct = |p| nearest_rank(values.as_slice(), p).unwrap_or_default();
    MetricStats {
        avg: sum / values.len() as f64,
        p50: pct(50),
        p75: pct(75),
        p95: pct(95),
        min: values[0],
        max: values[values.len() - 1],
    }
}
