use std::collections::VecDeque;
use std::sync::RwLock;
use thiserror::Error;
use vitals_common::PerformanceReport;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("sample store lock poisoned")]
    Poisoned,
}

/// Reports selected by a query, most recent first.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub reports: Vec<PerformanceReport>,
    /// Matches before the limit was applied.
    pub total: usize,
}

/// Storage backend for telemetry samples.
pub trait SampleStore: Send + Sync {
    /// Append a report, evicting the oldest entries if the store is over capacity.
    fn append(&self, report: PerformanceReport) -> Result<(), StoreError>;

    /// Snapshot of every retained report in insertion order.
    fn all(&self) -> Result<Vec<PerformanceReport>, StoreError>;

    /// Up to `limit` most recent reports whose URL contains `url_filter`.
    fn window(&self, limit: usize, url_filter: Option<&str>) -> Result<Window, StoreError> {
        Ok(select_window(self.all()?, limit, url_filter))
    }
}

/// Sort newest first, filter by URL substring, count, then truncate to `limit`.
///
/// Reports sharing a timestamp keep reverse insertion order, so the latest append wins ties.
pub fn select_window(
    reports: Vec<PerformanceReport>,
    limit: usize,
    url_filter: Option<&str>,
) -> Window {
    let mut matching: Vec<PerformanceReport> = reports
        .into_iter()
        .rev()
        .filter(|r| url_filter.map_or(true, |needle| r.url.contains(needle)))
        .collect();
    // Stable sort keeps the reversed insertion order among equal timestamps.
    matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let total = matching.len();
    matching.truncate(limit);
    Window { reports: matching, total }
}

/// Process-local FIFO buffer holding at most `capacity` reports.
pub struct MemoryStore {
    capacity: usize,
    reports: RwLock<VecDeque<PerformanceReport>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            reports: RwLock::new(VecDeque::with_capacity(
                capacity.min(vitals_common::STORE_CAPACITY),
            )),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.reports.read().map_err(|_| StoreError::Poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(vitals_common::STORE_CAPACITY)
    }
}

impl SampleStore for MemoryStore {
    fn append(&self, report: PerformanceReport) -> Result<(), StoreError> {
        let mut reports = self.reports.write().map_err(|_| StoreError::Poisoned)?;
        reports.push_back(report);
        while reports.len() > self.capacity {
            reports.pop_front();
        }
        Ok(())
    }

    fn all(&self) -> Result<Vec<PerformanceReport>, StoreError> {
        let reports = self.reports.read().map_err(|_| StoreError::Poisoned)?;
        Ok(reports.iter().cloned().collect())
    }
}
