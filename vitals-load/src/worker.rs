use rand::Rng;
use std::time::{Duration, Instant};
use vitals_client::{Client, ClientConfig};
use vitals_common::{PerformanceReport, ReportScore, WebVitals};

use crate::checks::{check_window, ViolationKind};
use crate::metrics::Metrics;
use crate::workload::{Op, WorkloadProfile};

const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)",
    "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) Mobile",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
];

const CONNECTIONS: [&str; 4] = ["4g", "3g", "wifi", ""];

/// Parameters shared by every worker in a run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub base_addr: String,
    pub profile: WorkloadProfile,
    /// Number of distinct page URLs reports are spread over.
    pub url_space: usize,
    pub concurrency: usize,
    pub duration: Duration,
    /// Store capacity, when known, for window checks.
    pub capacity: Option<usize>,
}

/// Outcome of one run across all workers.
pub struct RunResult {
    pub metrics: Metrics,
    pub violations: Vec<ViolationKind>,
}

/// Drive the server with `plan.concurrency` workers for `plan.duration`.
pub async fn run(plan: RunPlan) -> RunResult {
    let mut handles = Vec::with_capacity(plan.concurrency);
    for _ in 0..plan.concurrency.max(1) {
        let plan = plan.clone();
        handles.push(tokio::spawn(async move { run_worker(&plan).await }));
    }

    let mut metrics = Metrics {
        requests_total: 0,
        errors: 0,
        latency_ns: Vec::new(),
        elapsed_secs: 0.0,
    };
    let mut violations = Vec::new();
    for handle in handles {
        if let Ok(result) = handle.await {
            metrics.merge(result.metrics);
            violations.extend(result.violations);
        }
    }
    RunResult { metrics, violations }
}

async fn run_worker(plan: &RunPlan) -> RunResult {
    let client = Client::new(ClientConfig { base_addr: plan.base_addr.clone() });
    let mut requests_total: u64 = 0;
    let mut errors: u64 = 0;
    let mut latency_ns: Vec<u64> = Vec::new();
    let mut violations = Vec::new();

    let run_start = Instant::now();

    while run_start.elapsed() < plan.duration {
        // ThreadRng is !Send, so draw everything before the await.
        let (op, report, limit, filter) = {
            let mut rng = rand::thread_rng();
            let op = plan.profile.sample(&mut rng);
            let report = generate_report(&mut rng, plan.url_space);
            let limit = generate_limit(&mut rng);
            (op, report, limit, generate_filter(&mut rng, plan.url_space))
        };

        let op_start = Instant::now();
        let ok = match op {
            Op::Ingest => client.submit(&report).await.is_ok(),
            Op::Query => match client.fetch(limit, filter.as_deref()).await {
                Ok(data) => {
                    violations.extend(check_window(&data, limit, filter.as_deref(), plan.capacity));
                    true
                }
                Err(_) => false,
            },
        };
        let op_end = Instant::now();

        if !ok {
            errors += 1;
        }
        requests_total += 1;
        latency_ns.push((op_end - op_start).as_nanos() as u64);
    }

    let elapsed_secs = run_start.elapsed().as_secs_f64();
    RunResult { metrics: Metrics { requests_total, errors, latency_ns, elapsed_secs }, violations }
}

/// Build a plausible page-load report for one of `url_space` pages.
pub fn generate_report(rng: &mut impl Rng, url_space: usize) -> PerformanceReport {
    let page = rng.gen_range(0..url_space.max(1));
    let lcp = rng.gen_range(400.0..6_000.0);
    PerformanceReport {
        url: format!("https://load.test/page-{page}"),
        timestamp: 0,
        user_agent: USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())].to_string(),
        metrics: WebVitals {
            lcp,
            fid: rng.gen_range(0.0..300.0),
            cls: rng.gen_range(0.0..0.5),
            fcp: lcp * rng.gen_range(0.3..0.9),
            ttfb: rng.gen_range(20.0..1_200.0),
            ..Default::default()
        },
        score: ReportScore {
            score: rng.gen_range(0.0..=100.0),
            grade: String::new(),
            details: Default::default(),
        },
        connection_type: CONNECTIONS[rng.gen_range(0..CONNECTIONS.len())].to_string(),
    }
}

/// A query limit; sometimes absent and sometimes above the server cap.
pub fn generate_limit(rng: &mut impl Rng) -> Option<usize> {
    if rng.gen_bool(0.25) {
        None
    } else {
        Some(rng.gen_range(1..=150))
    }
}

/// A URL filter matching one page prefix, or none.
pub fn generate_filter(rng: &mut impl Rng, url_space: usize) -> Option<String> {
    if rng.gen_bool(0.5) {
        None
    } else {
        Some(format!("page-{}", rng.gen_range(0..url_space.max(1))))
    }
}
