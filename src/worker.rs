//! The hot loop and the per-group runtime.
//!
//! A worker group is the unit of workload partitioning: it owns a client
//! pool, a rate controller and `worker_count` cooperative workers, and
//! shares nothing with other groups except the message channel to the
//! orchestrator and the run-wide progress atomics.

use std::sync::Arc;
use std::time::Duration;

use log::{error, warn};
use once_cell::sync::Lazy;
use quanta::Clock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::client::KvClient;
use crate::commands::{self, CustomCommand};
use crate::config::{GroupPlan, Operation, PoolSizing, RunBound, RunConfig};
use crate::errors::{Error, RequestErrorKind};
use crate::generator::{value_buffer, KeyGenerator};
use crate::pool::{self, ClientPool};
use crate::rate::RateController;
use crate::stats::{histogram, OverallCounters, WorkerMessage, WorkerStats};
use crate::utils::partition;

const WINDOW: Duration = Duration::from_secs(1);

/// TSC-backed clock for request timing; read twice per call in the hot
/// loop.
static REQUEST_CLOCK: Lazy<Clock> = Lazy::new(Clock::new);

/// Run one worker group to completion. Called inside the group's own
/// executor; returns after every worker has flushed its final metrics.
pub async fn run_group(
    config: Arc<RunConfig>,
    plan: GroupPlan,
    tx: mpsc::Sender<WorkerMessage>,
    shutdown: watch::Receiver<bool>,
    overall: Arc<OverallCounters>,
) -> Result<(), Error> {
    let pool = match ClientPool::connect(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("group {} could not connect: {e}", plan.group_id);
            let _ = tx
                .send(WorkerMessage::Fatal {
                    group_id: plan.group_id,
                    error: e.to_string(),
                })
                .await;
            return Err(e);
        }
    };
    if matches!(config.pool, PoolSizing::Ramp { .. }) {
        tokio::spawn(pool::run_ramp(Arc::clone(&pool), shutdown.clone()));
    }

    let rate = Arc::new(RateController::new(plan.rate.clone()));
    let budgets = plan.budget.map(|b| partition(b, plan.worker_count));
    let deadline = match config.bound {
        RunBound::Duration(d) => Some(Instant::now() + d),
        RunBound::Requests(_) => None,
    };

    let mut workers = JoinSet::new();
    for local in 0..plan.worker_count {
        workers.spawn(run_worker(WorkerContext {
            worker_id: plan.first_worker_id + local,
            config: Arc::clone(&config),
            pool: Arc::clone(&pool),
            rate: Arc::clone(&rate),
            budget: budgets.as_ref().map(|b| b[local]),
            deadline,
            // One worker per group folds pool-level disconnects into its
            // interval counters so the totals survive aggregation.
            drains_pool_counters: local == 0,
            tx: tx.clone(),
            shutdown: shutdown.clone(),
            overall: Arc::clone(&overall),
        }));
    }
    while workers.join_next().await.is_some() {}
    Ok(())
}

struct WorkerContext {
    worker_id: usize,
    config: Arc<RunConfig>,
    pool: Arc<ClientPool>,
    rate: Arc<RateController>,
    budget: Option<u64>,
    deadline: Option<Instant>,
    drains_pool_counters: bool,
    tx: mpsc::Sender<WorkerMessage>,
    shutdown: watch::Receiver<bool>,
    overall: Arc<OverallCounters>,
}

async fn run_worker(mut ctx: WorkerContext) {
    let mut stats = WorkerStats::new(ctx.worker_id, Arc::clone(&ctx.overall));
    let mut keys = KeyGenerator::new(ctx.config.key_mode, ctx.worker_id);
    let value = value_buffer(
        ctx.config.value_size,
        rand::random::<u64>() ^ ctx.worker_id as u64,
    );
    let mut custom: Option<Box<dyn CustomCommand>> = match &ctx.config.operation {
        Operation::Custom { name, args } => match commands::load(name, args.as_deref()) {
            Ok(command) => Some(command),
            Err(e) => {
                error!("worker {}: {e}", ctx.worker_id);
                return;
            }
        },
        _ => None,
    };

    let started = Instant::now();
    let mut window_start = started;
    let mut interval_start = started;
    let mut remaining = ctx.budget;

    loop {
        if *ctx.shutdown.borrow() {
            break;
        }
        if remaining == Some(0) {
            break;
        }
        if let Some(deadline) = ctx.deadline {
            if Instant::now() >= deadline {
                break;
            }
        }

        let mut lease = tokio::select! {
            biased;
            _ = ctx.shutdown.changed() => break,
            lease = ctx.pool.acquire() => lease,
        };
        tokio::select! {
            biased;
            _ = ctx.shutdown.changed() => break,
            _ = ctx.rate.await_slot() => {}
        }

        let t0 = REQUEST_CLOCK.now();
        let result = run_dispatch(
            &ctx.config.operation,
            &mut lease,
            &mut keys,
            &value,
            &mut custom,
        )
        .await;
        let latency_us = latency_us(REQUEST_CLOCK.now().duration_since(t0));
        match result {
            Ok(()) => stats.record_ok(latency_us),
            Err(e) => {
                let kind = RequestErrorKind::classify(&e.to_string());
                warn!("request failed: {e}");
                stats.record_err(kind, Some(latency_us));
            }
        }
        drop(lease);

        if let Some(left) = remaining.as_mut() {
            *left -= 1;
        }

        let now = Instant::now();
        if now.duration_since(window_start) >= WINDOW {
            send_progress(&mut ctx, &mut stats).await;
            window_start = now;
        }
        if let Some(interval) = ctx.config.csv_interval {
            if now.duration_since(interval_start) >= interval {
                send_interval(&mut ctx, &mut stats, now - interval_start).await;
                interval_start = now;
            }
        }
    }

    // Flush partial interval data before the final message.
    if ctx.config.csv_interval.is_some() {
        send_interval(&mut ctx, &mut stats, Instant::now() - interval_start).await;
    }
    send_final(&ctx, &stats, started.elapsed()).await;
}

async fn run_dispatch(
    operation: &Operation,
    client: &mut KvClient,
    keys: &mut KeyGenerator,
    value: &[u8],
    custom: &mut Option<Box<dyn CustomCommand>>,
) -> Result<(), Error> {
    match operation {
        Operation::Set => client.set(&keys.next_key(), value).await,
        Operation::Get => client.get(&keys.next_key()).await.map(|_| ()),
        Operation::Custom { .. } => match custom {
            Some(command) => command.execute(client).await,
            None => Ok(()),
        },
    }
}

/// Request latency in whole microseconds, rounded, with the histogram's
/// lower bound as floor.
fn latency_us(elapsed: Duration) -> u64 {
    let us = (elapsed.as_nanos() + 500) / 1000;
    (us as u64).max(10)
}

async fn send_progress(ctx: &mut WorkerContext, stats: &mut WorkerStats) {
    let window = stats.rotate_window();
    let window_count = window.len();
    let payload = match histogram::encode(&window) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("skipping progress snapshot: {e}");
            return;
        }
    };
    let _ = ctx
        .tx
        .send(WorkerMessage::Progress {
            worker_id: stats.worker_id,
            requests_completed: stats.requests_completed,
            errors: stats.total_errors,
            window_histogram: payload,
            window_count,
            ts: chrono::Utc::now().timestamp(),
        })
        .await;
}

async fn send_interval(ctx: &mut WorkerContext, stats: &mut WorkerStats, elapsed: Duration) {
    if ctx.drains_pool_counters {
        stats.add_disconnects(ctx.pool.take_disconnects());
    }
    let snapshot = stats.rotate_interval();
    if snapshot.is_empty() {
        return;
    }
    let payload = match histogram::encode(&snapshot.histogram) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("skipping interval snapshot: {e}");
            return;
        }
    };
    let counters = snapshot.counters;
    let _ = ctx
        .tx
        .send(WorkerMessage::CsvInterval {
            worker_id: stats.worker_id,
            window_ts: chrono::Utc::now().timestamp(),
            duration_s: elapsed.as_secs_f64(),
            interval_histogram: payload,
            requests: counters.requests,
            errors: counters.errors,
            moved: counters.moved,
            clusterdown: counters.clusterdown,
            disconnects: counters.disconnects,
        })
        .await;
}

async fn send_final(ctx: &WorkerContext, stats: &WorkerStats, elapsed: Duration) {
    let payload = match histogram::encode(stats.overall()) {
        Ok(payload) => payload,
        Err(e) => {
            error!("final histogram lost: {e}");
            Vec::new()
        }
    };
    let _ = ctx
        .tx
        .send(WorkerMessage::Final {
            worker_id: stats.worker_id,
            requests_completed: stats.requests_completed,
            errors: stats.total_errors,
            overall_histogram: payload,
            total_time_s: elapsed.as_secs_f64(),
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_is_rounded_with_floor() {
        assert_eq!(latency_us(Duration::from_nanos(0)), 10);
        assert_eq!(latency_us(Duration::from_nanos(4_400)), 10);
        assert_eq!(latency_us(Duration::from_nanos(10_499)), 10);
        assert_eq!(latency_us(Duration::from_nanos(10_500)), 11);
        assert_eq!(latency_us(Duration::from_micros(250)), 250);
        assert_eq!(latency_us(Duration::from_millis(3)), 3_000);
    }
}
