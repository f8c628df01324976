//! Immutable run configuration.
//!
//! The CLI surface is parsed by `app::args`; this module turns the raw
//! arguments into a validated [`RunConfig`] and rejects every forbidden
//! combination before any worker starts.

use std::path::Path;
use std::time::Duration;

use log::warn;

use crate::app::args::{Args, OperationKind, RampMode};
use crate::commands;
use crate::errors::ConfigError;
use crate::utils::{partition, partition_qps};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Target rate evolution for one worker group.
#[derive(Debug, Clone, PartialEq)]
pub enum RatePolicy {
    /// No gating at all.
    None,
    /// Constant target, never changes.
    Fixed(u64),
    /// Every `interval`, `current_qps += step`, clamped so it never
    /// crosses `end`.
    Linear {
        start: u64,
        end: u64,
        step: i64,
        interval: Duration,
    },
    /// Every `interval`, `current_qps = round(current_qps * factor)`,
    /// clamped at `end`.
    Exponential {
        start: u64,
        end: u64,
        factor: f64,
        interval: Duration,
    },
}

impl RatePolicy {
    /// Derive the per-group policy by dividing every QPS endpoint (and the
    /// linear step) across `parts` groups, with a floor of one so small
    /// targets still make progress in every group.
    pub fn divide(&self, parts: usize) -> RatePolicy {
        if parts <= 1 {
            return self.clone();
        }
        match *self {
            RatePolicy::None => RatePolicy::None,
            RatePolicy::Fixed(q) => RatePolicy::Fixed(partition_qps(q, parts)),
            RatePolicy::Linear {
                start,
                end,
                step,
                interval,
            } => {
                let divided = step / parts as i64;
                let step = if divided == 0 { step.signum() } else { divided };
                RatePolicy::Linear {
                    start: partition_qps(start, parts),
                    end: partition_qps(end, parts),
                    step,
                    interval,
                }
            }
            RatePolicy::Exponential {
                start,
                end,
                factor,
                interval,
            } => RatePolicy::Exponential {
                start: partition_qps(start, parts),
                end: partition_qps(end, parts),
                factor,
                interval,
            },
        }
    }
}

/// Key-selection policy from the workload options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    /// `key:<worker_id>:<local_counter>`
    FixedPerWorker,
    /// Uniform integer in `[offset, offset + keyspace)`.
    Random { keyspace: u64, offset: u64 },
    /// `key:<(counter mod keyspace) + offset>`, optionally starting the
    /// counter at a random point per worker.
    Sequential {
        keyspace: u64,
        offset: u64,
        random_start: bool,
    },
}

/// Which operation each worker issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Set,
    Get,
    /// A registered custom command; `args` is passed through opaque.
    Custom { name: String, args: Option<String> },
}

/// Pool sizing discipline: build everything up front, or grow in steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolSizing {
    Fixed(usize),
    Ramp {
        start: usize,
        end: usize,
        per_ramp: usize,
        interval: Duration,
    },
}

impl PoolSizing {
    pub fn max_size(&self) -> usize {
        match *self {
            PoolSizing::Fixed(n) => n,
            PoolSizing::Ramp { end, .. } => end,
        }
    }

    pub fn initial_size(&self) -> usize {
        match *self {
            PoolSizing::Fixed(n) => n,
            PoolSizing::Ramp { start, .. } => start,
        }
    }
}

/// Run termination: a request budget or a wall-clock deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunBound {
    Requests(u64),
    Duration(Duration),
}

/// Everything a run needs, built once at process start.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub cluster: bool,
    pub read_from_replica: bool,
    pub request_timeout: Option<Duration>,
    pub connection_timeout: Option<Duration>,

    pub operation: Operation,
    pub value_size: usize,
    pub key_mode: KeyMode,
    pub pool: PoolSizing,
    pub worker_count: usize,
    pub bound: RunBound,
    pub rate: RatePolicy,

    pub csv_interval: Option<Duration>,
    pub groups: usize,
}

/// Workload share handed to one worker group.
#[derive(Debug, Clone)]
pub struct GroupPlan {
    pub group_id: usize,
    pub first_worker_id: usize,
    pub worker_count: usize,
    pub budget: Option<u64>,
    pub rate: RatePolicy,
}

impl RunConfig {
    pub fn from_args(args: &Args) -> Result<RunConfig, ConfigError> {
        let rate = validate_rate(args)?;
        let key_mode = validate_keys(args)?;
        let pool = validate_pool(args)?;
        let bound = validate_bound(args)?;
        let operation = validate_operation(args)?;
        let groups = validate_groups(args)?;

        if args.threads == 0 {
            return Err(ConfigError::NoWorkers);
        }

        let request_timeout = args
            .request_timeout
            .filter(|ms| *ms > 0)
            .map(|ms| Duration::from_millis(ms as u64));
        let connection_timeout = args
            .connection_timeout
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        let csv_interval = (args.interval_metrics_interval_duration_sec > 0)
            .then(|| Duration::from_secs(args.interval_metrics_interval_duration_sec));

        Ok(RunConfig {
            host: args.host.clone(),
            port: args.port,
            tls: args.tls,
            cluster: args.cluster,
            read_from_replica: args.read_from_replica,
            request_timeout,
            connection_timeout,
            operation,
            value_size: args.datasize,
            key_mode,
            pool,
            worker_count: args.threads,
            bound,
            rate,
            csv_interval,
            groups,
        })
    }

    pub fn csv_mode(&self) -> bool {
        self.csv_interval.is_some()
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn total_workers(&self) -> usize {
        self.groups * self.worker_count
    }

    /// Partition the workload across worker groups: the request budget is
    /// split with remainder-first distribution, QPS targets are divided.
    pub fn group_plans(&self) -> Vec<GroupPlan> {
        let budgets: Option<Vec<u64>> = match self.bound {
            RunBound::Requests(total) => Some(partition(total, self.groups)),
            RunBound::Duration(_) => None,
        };
        let rate = self.rate.divide(self.groups);

        (0..self.groups)
            .map(|group_id| GroupPlan {
                group_id,
                first_worker_id: group_id * self.worker_count,
                worker_count: self.worker_count,
                budget: budgets.as_ref().map(|b| b[group_id]),
                rate: rate.clone(),
            })
            .collect()
    }
}

fn validate_rate(args: &Args) -> Result<RatePolicy, ConfigError> {
    let dynamic_given = args.start_qps.is_some()
        || args.end_qps.is_some()
        || args.qps_change_interval.is_some()
        || args.qps_change.is_some()
        || args.qps_ramp_mode.is_some()
        || args.qps_ramp_factor.is_some();

    if let Some(q) = args.qps {
        if dynamic_given {
            return Err(ConfigError::FixedAndDynamicRate);
        }
        if q == 0 {
            return Err(ConfigError::NonPositiveQps);
        }
        return Ok(RatePolicy::Fixed(q));
    }

    if !dynamic_given {
        return Ok(RatePolicy::None);
    }

    let end = args.end_qps.ok_or(ConfigError::IncompleteDynamicRate)?;
    let interval_secs = args
        .qps_change_interval
        .filter(|s| *s > 0)
        .ok_or(ConfigError::IncompleteDynamicRate)?;
    let interval = Duration::from_secs(interval_secs);
    if end == 0 {
        return Err(ConfigError::NonPositiveQps);
    }

    let start = match args.start_qps {
        Some(s) => s,
        None => {
            warn!("--start-qps not given, starting the ramp at --end-qps ({end})");
            end
        }
    };

    if start == end {
        return Ok(RatePolicy::Fixed(start));
    }

    match args.qps_ramp_mode.unwrap_or(RampMode::Linear) {
        RampMode::Linear => {
            let step = args.qps_change.ok_or(ConfigError::BadLinearStep)?;
            let direction = end as i64 - start as i64;
            if step == 0 || step.signum() != direction.signum() {
                return Err(ConfigError::BadLinearStep);
            }
            Ok(RatePolicy::Linear {
                start,
                end,
                step,
                interval,
            })
        }
        RampMode::Exponential => {
            let factor = args
                .qps_ramp_factor
                .ok_or(ConfigError::MissingRampFactor)?;
            if factor <= 0.0 {
                return Err(ConfigError::NonPositiveRampFactor);
            }
            if factor < 1.0 {
                warn!("--qps-ramp-factor {factor} < 1 produces a ramp-down");
            }
            Ok(RatePolicy::Exponential {
                start,
                end,
                factor,
                interval,
            })
        }
    }
}

fn validate_keys(args: &Args) -> Result<KeyMode, ConfigError> {
    if args.random.is_some() && args.sequential.is_some() {
        return Err(ConfigError::RandomAndSequential);
    }
    if args.sequential_random_start && args.sequential.is_none() {
        return Err(ConfigError::RandomStartWithoutSequential);
    }
    let offset = args.keyspace_offset.unwrap_or(0);

    if let Some(keyspace) = args.random {
        if keyspace == 0 {
            return Err(ConfigError::EmptyKeyspace);
        }
        return Ok(KeyMode::Random { keyspace, offset });
    }
    if let Some(keyspace) = args.sequential {
        if keyspace == 0 {
            return Err(ConfigError::EmptyKeyspace);
        }
        return Ok(KeyMode::Sequential {
            keyspace,
            offset,
            random_start: args.sequential_random_start,
        });
    }
    if args.keyspace_offset.is_some() {
        return Err(ConfigError::OffsetWithoutKeyspace);
    }
    Ok(KeyMode::FixedPerWorker)
}

fn validate_pool(args: &Args) -> Result<PoolSizing, ConfigError> {
    let ramp_given = [
        args.clients_ramp_start.is_some(),
        args.clients_ramp_end.is_some(),
        args.clients_per_ramp.is_some(),
        args.client_ramp_interval.is_some(),
    ];
    let ramp_count = ramp_given.iter().filter(|g| **g).count();

    if ramp_count == 0 {
        let clients = args.clients.unwrap_or(50);
        if clients == 0 {
            return Err(ConfigError::NoClients);
        }
        return Ok(PoolSizing::Fixed(clients));
    }
    if args.clients.is_some() {
        return Err(ConfigError::ClientsAndRamp);
    }
    if ramp_count != 4 {
        return Err(ConfigError::IncompleteClientRamp);
    }

    let start = args.clients_ramp_start.unwrap();
    let end = args.clients_ramp_end.unwrap();
    let per_ramp = args.clients_per_ramp.unwrap();
    let interval = args.client_ramp_interval.unwrap();
    if start == 0 || end < start || per_ramp == 0 || interval == 0 {
        return Err(ConfigError::BadClientRamp);
    }
    Ok(PoolSizing::Ramp {
        start,
        end,
        per_ramp,
        interval: Duration::from_secs(interval),
    })
}

fn validate_bound(args: &Args) -> Result<RunBound, ConfigError> {
    match (args.requests, args.test_duration) {
        (Some(_), Some(_)) => Err(ConfigError::RequestsAndDuration),
        (Some(n), None) => Ok(RunBound::Requests(n)),
        (None, Some(secs)) => Ok(RunBound::Duration(Duration::from_secs(secs))),
        (None, None) => Ok(RunBound::Requests(100_000)),
    }
}

fn validate_operation(args: &Args) -> Result<Operation, ConfigError> {
    match args.operation {
        OperationKind::Set => {
            if args.datasize == 0 {
                return Err(ConfigError::EmptyValue);
            }
            Ok(Operation::Set)
        }
        OperationKind::Get => Ok(Operation::Get),
        OperationKind::Custom => {
            let file = args
                .custom_command_file
                .as_deref()
                .ok_or(ConfigError::MissingCustomCommand)?;
            let name = Path::new(file)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(file)
                .to_string();
            if !commands::is_registered(&name) {
                return Err(ConfigError::UnknownCustomCommand(name));
            }
            Ok(Operation::Custom {
                name,
                args: args.custom_command_args.clone(),
            })
        }
    }
}

fn validate_groups(args: &Args) -> Result<usize, ConfigError> {
    if args.single_process {
        return Ok(1);
    }
    if args.processes == "auto" {
        return Ok(num_cpus::get().max(1));
    }
    match args.processes.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::BadProcesses(args.processes.clone())),
    }
}

#[cfg(test)]
mod tests;
