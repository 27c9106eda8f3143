use vitals_common::stats::nearest_rank;

pub struct Metrics {
    pub requests_total: u64,
    pub errors: u64,
    /// One entry per completed operation, in completion order (unsorted).
    pub latency_ns: Vec<u64>,
    pub elapsed_secs: f64,
}

impl Metrics {
    pub fn p50_ns(&self) -> u64 {
        percentile(&self.latency_ns, 50)
    }

    pub fn p99_ns(&self) -> u64 {
        percentile(&self.latency_ns, 99)
    }

    pub fn error_rate(&self) -> f64 {
        self.errors as f64 / self.requests_total as f64
    }

    pub fn throughput_rps(&self) -> f64 {
        self.requests_total as f64 / self.elapsed_secs
    }

    /// Fold another worker's counters into this one.
    pub fn merge(&mut self, other: Metrics) {
        self.requests_total += other.requests_total;
        self.errors += other.errors;
        self.latency_ns.extend(other.latency_ns);
        self.elapsed_secs = self.elapsed_secs.max(other.elapsed_secs);
    }
}

/// Nearest-rank percentile of `data`; 0 for an empty slice.
fn percentile(data: &[u64], percent: u32) -> u64 {
    let mut sorted = data.to_vec();
    sorted.sort_unstable();
    nearest_rank(&sorted, percent).unwrap_or(0)
}
