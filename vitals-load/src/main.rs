use clap::Parser;
use std::io::Write;
use std::process;
use std::time::Duration;
use vitals_common::STORE_CAPACITY;
use vitals_load::checks::ViolationKind;
use vitals_load::metrics::Metrics;
use vitals_load::server::LocalServer;
use vitals_load::worker::{self, RunPlan};
use vitals_load::workload::WorkloadProfile;

#[derive(Parser)]
#[command(name = "vitals-load", about = "Vitals telemetry load harness")]
struct Args {
    /// `host:port` of a running server; when omitted an in-process server is started
    #[arg(long)]
    target: Option<String>,

    /// How long to run (seconds)
    #[arg(long, default_value_t = 5)]
    duration: u64,

    /// Workload profile: ingest-heavy | balanced | query-heavy | ingest-only
    #[arg(long, default_value = "balanced")]
    workload: String,

    /// Number of distinct page URLs
    #[arg(long, default_value_t = 20)]
    url_space: usize,

    /// Concurrent workers
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Capacity of the in-process server
    #[arg(long, default_value_t = STORE_CAPACITY)]
    capacity: usize,

    /// Fail if the error rate exceeds this fraction
    #[arg(long, default_value_t = 0.01)]
    max_error_rate: f64,

    /// Fail if window violations exceed this count
    #[arg(long, default_value_t = 0)]
    max_violations: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let profile = WorkloadProfile::from_name(&args.workload).unwrap_or_else(|| {
        eprintln!(
            "Unknown workload {:?}. Valid values: ingest-heavy, balanced, query-heavy, ingest-only",
            args.workload
        );
        process::exit(3);
    });

    let (local, base_addr, capacity) = match &args.target {
        Some(target) => (None, target.clone(), None),
        None => {
            let server = LocalServer::spawn(args.capacity).await.unwrap_or_else(|e| {
                eprintln!("Failed to start server: {e}");
                process::exit(3);
            });
            let addr = server.addr.to_string();
            let capacity = Some(server.capacity);
            (Some(server), addr, capacity)
        }
    };

    println!("Target ready:  {base_addr}");
    print!("Running {}s {} workload ", args.duration, profile.as_name());
    std::io::stdout().flush().ok();

    let dot_handle = tokio::spawn(async {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.tick().await; // consume the immediate first tick
        loop {
            interval.tick().await;
            print!(".");
            std::io::stdout().flush().ok();
        }
    });

    let result = worker::run(RunPlan {
        base_addr,
        profile,
        url_space: args.url_space,
        concurrency: args.concurrency,
        duration: Duration::from_secs(args.duration),
        capacity,
    })
    .await;

    dot_handle.abort();
    println!();

    if let Some(server) = local {
        server.stop().await;
    }

    let violation_count = result.violations.len() as u64;
    print_report(&args, &result.metrics, violation_count, profile);

    for v in &result.violations {
        eprintln!("VIOLATION {}", describe(v));
    }

    let error_rate_exceeded = result.metrics.requests_total > 0
        && result.metrics.error_rate() > args.max_error_rate;
    let violations_exceeded = violation_count > args.max_violations;

    let exit_code = if error_rate_exceeded {
        1
    } else if violations_exceeded {
        2
    } else {
        0
    };

    process::exit(exit_code);
}

fn describe(kind: &ViolationKind) -> String {
    match kind {
        ViolationKind::LimitExceeded { limit, returned } => {
            format!("LimitExceeded: {returned} reports for limit {limit}")
        }
        ViolationKind::TotalBelowReturned { total, returned } => {
            format!("TotalBelowReturned: total {total} < {returned} returned")
        }
        ViolationKind::TotalAboveCapacity { total, capacity } => {
            format!("TotalAboveCapacity: total {total} > capacity {capacity}")
        }
        ViolationKind::NotNewestFirst { index } => format!("NotNewestFirst: at index {index}"),
        ViolationKind::FilterMismatch { url } => format!("FilterMismatch: {url}"),
        ViolationKind::AggregateMismatch { returned, counted } => {
            format!("AggregateMismatch: {returned} returned, summary counted {counted:?}")
        }
    }
}

fn print_report(args: &Args, metrics: &Metrics, violation_count: u64, profile: WorkloadProfile) {
    let pass_fail = |exceeded: bool| if exceeded { "✗" } else { "✓" };

    let error_rate_exceeded = metrics.requests_total > 0
        && metrics.error_rate() > args.max_error_rate;
    let violations_exceeded = violation_count > args.max_violations;
    let overall_pass = !error_rate_exceeded && !violations_exceeded;

    println!("Vitals Load Test Results");
    println!("========================");
    println!("Duration:              {:.1} s", args.duration as f64);
    println!("Workload:              {}", profile.as_name());
    println!("URL space:             {}", args.url_space);
    println!("Workers:               {}", args.concurrency);
    println!();
    println!("Requests:              {}", format_thousands(metrics.requests_total));
    println!("Throughput:            {:.1} rps", metrics.throughput_rps());
    println!("P50 latency:           {:.1} ms", ns_to_ms(metrics.p50_ns()));
    println!("P99 latency:           {:.1} ms", ns_to_ms(metrics.p99_ns()));
    println!();
    println!("Errors:                {}", format_thousands(metrics.errors));
    println!(
        "Error rate:            {:.3}%    [threshold: {:.3}%]  {}",
        metrics.error_rate() * 100.0,
        args.max_error_rate * 100.0,
        pass_fail(error_rate_exceeded),
    );
    println!();
    println!(
        "Window violations:     {}        [threshold: {}]        {}",
        violation_count,
        args.max_violations,
        pass_fail(violations_exceeded),
    );
    println!();
    println!("Result: {}", if overall_pass { "PASS" } else { "FAIL" });
}

fn format_thousands(n: u64) -> String {
    if n >= 1_000_000 {
        format!("~{}M", n / 1_000_000)
    } else if n >= 1_000 {
        format!("~{}K", n / 1_000)
    } else {
        n.to_string()
    }
}

fn ns_to_ms(ns: u64) -> f64 {
    ns as f64 / 1_000_000.0
}
