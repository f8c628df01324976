//! Run lifecycle.
//!
//! The orchestrator spawns one OS thread per worker group (each with its
//! own cooperative executor), consumes the single message channel, merges
//! histograms, and is the only writer to stdout. Group failures map to
//! exit codes: configuration/connect problems exit 1, a crashed group
//! exits 2.

pub mod csv;
pub mod reporter;

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::RunConfig;
use crate::errors::{exit, Error};
use crate::stats::histogram::{merge_into, percentiles};
use crate::stats::{new_histogram, IntervalCounters, OverallCounters, WorkerMessage};
use crate::worker;

use csv::{CsvRow, CsvWriter};
use reporter::RunReport;

pub fn run(config: RunConfig) -> i32 {
    let config = Arc::new(config);
    if !config.csv_mode() {
        reporter::print_banner(&config);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .thread_name("orchestrator-valkey-bench")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to build runtime: {e}");
            eprintln!("failed to build runtime: {e}");
            return exit::CONFIG_OR_CONNECT;
        }
    };

    let (tx, rx) = mpsc::channel::<WorkerMessage>(4096);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let overall = Arc::new(OverallCounters::default());

    let mut groups = Vec::new();
    let mut spawn_failed = false;
    for plan in config.group_plans() {
        let config = Arc::clone(&config);
        let tx = tx.clone();
        let shutdown = shutdown_rx.clone();
        let overall = Arc::clone(&overall);
        let spawned = std::thread::Builder::new()
            .name(format!("group-{}", plan.group_id))
            .spawn(move || -> Result<(), Error> {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(worker::run_group(config, plan, tx, shutdown, overall))
            });
        match spawned {
            Ok(handle) => groups.push(handle),
            Err(e) => {
                error!("failed to spawn worker group: {e}");
                spawn_failed = true;
                let _ = shutdown_tx.send(true);
            }
        }
    }
    drop(tx);

    let mut code = runtime.block_on(aggregate(
        Arc::clone(&config),
        rx,
        Arc::clone(&shutdown_tx),
        overall,
    ));

    for (group_id, group) in groups.into_iter().enumerate() {
        match group.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("worker group {group_id} failed: {e}");
                code = code.max(exit::CONFIG_OR_CONNECT);
            }
            Err(_) => {
                let crash = Error::ChildCrashed(group_id);
                error!("{crash}");
                eprintln!("{crash}");
                code = code.max(exit::CHILD_CRASHED);
            }
        }
    }
    if spawn_failed {
        code = code.max(exit::CONFIG_OR_CONNECT);
    }
    code
}

/// Merged per-interval state on the orchestrator side.
struct IntervalMerge {
    histogram: hdrhistogram::Histogram<u64>,
    counters: IntervalCounters,
    reports: usize,
    opened: Instant,
}

impl IntervalMerge {
    fn new(now: Instant) -> IntervalMerge {
        IntervalMerge {
            histogram: new_histogram(),
            counters: IntervalCounters::default(),
            reports: 0,
            opened: now,
        }
    }

    fn has_data(&self) -> bool {
        !self.histogram.is_empty() || self.counters != IntervalCounters::default()
    }
}

async fn aggregate(
    config: Arc<RunConfig>,
    mut rx: mpsc::Receiver<WorkerMessage>,
    shutdown: Arc<watch::Sender<bool>>,
    overall: Arc<OverallCounters>,
) -> i32 {
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("shutdown signal received, draining workers");
            let _ = shutdown.send(true);
        });
    }

    let csv_mode = config.csv_mode();
    let expected_workers = config.total_workers();
    let mut writer = CsvWriter::new();
    if csv_mode {
        writer.write_header();
    }

    let started = Instant::now();
    let mut progress = tokio::time::interval(Duration::from_secs(1));
    progress.set_missed_tick_behavior(MissedTickBehavior::Delay);
    progress.tick().await;
    let mut csv_ticker =
        tokio::time::interval(config.csv_interval.unwrap_or(Duration::from_secs(3600)));
    csv_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    csv_ticker.tick().await;

    let mut window = new_histogram();
    let mut interval = IntervalMerge::new(started);
    let mut finals_histogram = new_histogram();
    let mut finals_requests = 0u64;
    let mut finals_errors = 0u64;
    let mut last_progress_total = 0u64;
    let mut decode_failures = 0u64;
    let mut code = exit::OK;

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else { break };
                match message {
                    WorkerMessage::Progress { window_histogram, .. } => {
                        if let Err(e) = merge_into(&mut window, &window_histogram) {
                            decode_failures += 1;
                            warn!("progress histogram dropped: {e}");
                        }
                    }
                    WorkerMessage::CsvInterval {
                        interval_histogram,
                        requests,
                        errors,
                        moved,
                        clusterdown,
                        disconnects,
                        ..
                    } => {
                        if let Err(e) = merge_into(&mut interval.histogram, &interval_histogram) {
                            decode_failures += 1;
                            warn!("interval histogram dropped: {e}");
                        }
                        interval.counters.requests += requests;
                        interval.counters.errors += errors;
                        interval.counters.moved += moved;
                        interval.counters.clusterdown += clusterdown;
                        interval.counters.disconnects += disconnects;
                        interval.reports += 1;
                        if interval.reports >= expected_workers {
                            emit_interval(&mut writer, &mut interval);
                            // The quorum emit replaces this interval's
                            // scheduled row; realign the ticker.
                            csv_ticker.reset();
                        }
                    }
                    WorkerMessage::Final {
                        requests_completed,
                        errors,
                        overall_histogram,
                        ..
                    } => {
                        finals_requests += requests_completed;
                        finals_errors += errors;
                        if let Err(e) = merge_into(&mut finals_histogram, &overall_histogram) {
                            decode_failures += 1;
                            warn!("final histogram dropped: {e}");
                        }
                    }
                    WorkerMessage::Fatal { group_id, error } => {
                        error!("worker group {group_id} aborted: {error}");
                        eprintln!("worker group {group_id} aborted: {error}");
                        code = code.max(exit::CONFIG_OR_CONNECT);
                        let _ = shutdown.send(true);
                    }
                }
            }
            _ = progress.tick(), if !csv_mode => {
                let (total, errors) = overall.totals();
                let elapsed = started.elapsed().as_secs_f64();
                let ladder = percentiles(&window);
                let line = reporter::progress_line(
                    elapsed,
                    total - last_progress_total,
                    if elapsed > 0.0 { total as f64 / elapsed } else { 0.0 },
                    errors,
                    ladder[0],
                    ladder[3],
                );
                println!("{line}");
                last_progress_total = total;
                window.reset();
            }
            _ = csv_ticker.tick(), if csv_mode => {
                emit_interval(&mut writer, &mut interval);
            }
        }
    }

    // All workers are gone; flush the last interval only if it carries
    // any data.
    if csv_mode {
        if interval.has_data() {
            emit_interval(&mut writer, &mut interval);
        }
    } else {
        reporter::print_final(&RunReport {
            duration_s: started.elapsed().as_secs_f64(),
            requests: finals_requests,
            errors: finals_errors,
            histogram: finals_histogram,
            decode_failures,
        });
    }
    code
}

/// Emit the merged interval as one CSV row and open the next window.
/// An interval without samples still produces a row with zeroed latency
/// fields, keeping the emission cadence fixed.
fn emit_interval(writer: &mut CsvWriter, interval: &mut IntervalMerge) {
    let now = Instant::now();
    let row = CsvRow::build(
        chrono::Utc::now().timestamp(),
        now.duration_since(interval.opened).as_secs_f64(),
        &interval.histogram,
        interval.counters,
    );
    writer.write_row(&row);
    *interval = IntervalMerge::new(now);
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!("failed to install SIGTERM handler: {e}");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
