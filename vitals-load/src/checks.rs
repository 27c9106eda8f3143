use vitals_common::{WindowData, DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT};

/// A way a query response can contradict the window contract.
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    /// More reports than the effective limit allows.
    LimitExceeded { limit: usize, returned: usize },
    /// `total` smaller than the number of reports returned.
    TotalBelowReturned { total: usize, returned: usize },
    /// `total` larger than the store could ever hold.
    TotalAboveCapacity { total: usize, capacity: usize },
    /// Report at `index` is newer than its predecessor.
    NotNewestFirst { index: usize },
    /// Returned report does not contain the filter substring.
    FilterMismatch { url: String },
    /// Summary presence or `period.count` disagrees with the report list.
    AggregateMismatch { returned: usize, counted: Option<usize> },
}

/// The limit the server is expected to apply for a requested value.
pub fn effective_limit(requested: Option<usize>) -> usize {
    requested
        .filter(|&n| n > 0)
        .map_or(DEFAULT_QUERY_LIMIT, |n| n.min(MAX_QUERY_LIMIT))
}

/// Check one query response. `capacity` is only known when the harness runs the server itself.
pub fn check_window(
    data: &WindowData,
    requested_limit: Option<usize>,
    filter: Option<&str>,
    capacity: Option<usize>,
) -> Vec<ViolationKind> {
    let mut violations = Vec::new();
    let returned = data.reports.len();

    let limit = effective_limit(requested_limit);
    if returned > limit {
        violations.push(ViolationKind::LimitExceeded { limit, returned });
    }
    if data.total < returned {
        violations.push(ViolationKind::TotalBelowReturned { total: data.total, returned });
    }
    if let Some(capacity) = capacity {
        if data.total > capacity {
            violations.push(ViolationKind::TotalAboveCapacity { total: data.total, capacity });
        }
    }

    for (index, pair) in data.reports.windows(2).enumerate() {
        if pair[1].timestamp > pair[0].timestamp {
            violations.push(ViolationKind::NotNewestFirst { index: index + 1 });
        }
    }

    if let Some(needle) = filter.filter(|f| !f.is_empty()) {
        for report in data.reports.iter().filter(|r| !r.url.contains(needle)) {
            violations.push(ViolationKind::FilterMismatch { url: report.url.clone() });
        }
    }

    let counted = data.aggregated.as_ref().map(|a| a.period.count);
    let consistent = match counted {
        None => returned == 0,
        Some(count) => count == returned && returned > 0,
    };
    if !consistent {
        violations.push(ViolationKind::AggregateMismatch { returned, counted });
    }

    violations
}
