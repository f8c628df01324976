//! Human-readable output: banner, progress line, final report.

use hdrhistogram::Histogram;

use crate::config::{PoolSizing, RunBound, RunConfig, VERSION};
use crate::stats::histogram::{percentiles, truncated_mean};
use crate::utils::format_duration;

pub fn print_banner(config: &RunConfig) {
    let mode = if config.cluster { "cluster" } else { "standalone" };
    let tls = if config.tls { ", tls" } else { "" };
    println!("valkey-bench {VERSION}");
    println!("target: {} ({mode}{tls})", config.address());
    let pool = match config.pool {
        PoolSizing::Fixed(n) => format!("{n} clients"),
        PoolSizing::Ramp { start, end, .. } => format!("{start}..{end} clients (ramp)"),
    };
    println!(
        "workload: {} group(s) x {} worker(s), {pool} per group",
        config.groups, config.worker_count
    );
    match config.bound {
        RunBound::Requests(n) => println!("bound: {n} requests"),
        RunBound::Duration(d) => println!("bound: {} seconds", d.as_secs()),
    }
    println!();
}

/// One line per second while the run is active.
pub fn progress_line(
    elapsed_s: f64,
    current_rps: u64,
    overall_rps: f64,
    errors: u64,
    p50: u64,
    p99: u64,
) -> String {
    format!(
        "{elapsed_s:7.1}s  rps: {current_rps} (overall {overall_rps:.0})  errors: {errors}  p50/p99 (us): {p50}/{p99}"
    )
}

/// Everything the final human report needs, merged from worker finals.
pub struct RunReport {
    pub duration_s: f64,
    pub requests: u64,
    pub errors: u64,
    pub histogram: Histogram<u64>,
    pub decode_failures: u64,
}

pub fn print_final(report: &RunReport) {
    let h = &report.histogram;
    let rps = if report.duration_s > 0.0 {
        report.requests as f64 / report.duration_s
    } else {
        0.0
    };
    let wall = chrono::Duration::milliseconds((report.duration_s * 1000.0) as i64);
    println!();
    println!("====== results ======");
    println!("duration: {} ({:.2} s)", format_duration(&wall), report.duration_s);
    println!("requests: {} ({rps:.2} req/s)", report.requests);
    println!("errors: {}", report.errors);
    if report.decode_failures > 0 {
        println!("histogram decode failures: {}", report.decode_failures);
    }
    if h.is_empty() {
        return;
    }
    let ladder = percentiles(h);
    println!(
        "latency (us): min {}  avg {}  max {}",
        h.min(),
        truncated_mean(h),
        h.max()
    );
    println!("p50 {}  p95 {}  p99 {}", ladder[0], ladder[2], ladder[3]);
    println!();
    println!("latency distribution:");
    let mut cumulative = 0u64;
    for step in h.iter_quantiles(1) {
        if step.count_since_last_iteration() == 0 {
            continue;
        }
        cumulative += step.count_since_last_iteration();
        println!(
            "{:9.5}% <= {} us  ({cumulative})",
            step.quantile_iterated_to() * 100.0,
            step.value_iterated_to(),
        );
    }
}
