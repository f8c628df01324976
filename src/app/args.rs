use clap::{Parser, ValueEnum};

/// valkey-bench: load generator and latency measurement harness for
/// Valkey/Redis-compatible servers.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Server hostname or address.
    #[arg(long, default_value_t = String::from("127.0.0.1"), env = "VALKEY_BENCH_HOST")]
    pub host: String,

    /// Server port.
    #[arg(long, default_value_t = 6379, env = "VALKEY_BENCH_PORT")]
    pub port: u16,

    /// Connect over TLS.
    #[arg(long, default_value_t = false)]
    pub tls: bool,

    /// Target is a sharded cluster.
    #[arg(long, default_value_t = false)]
    pub cluster: bool,

    /// Allow reads from replicas (cluster mode).
    #[arg(long, default_value_t = false)]
    pub read_from_replica: bool,

    /// Per-request timeout in milliseconds; zero or negative means unset.
    #[arg(long, allow_negative_numbers = true)]
    pub request_timeout: Option<i64>,

    /// Connection establishment timeout in milliseconds.
    #[arg(long)]
    pub connection_timeout: Option<u64>,

    /// Connection pool size per worker group.
    /// Mutually exclusive with the client ramp options.
    #[arg(short = 'c', long)]
    pub clients: Option<usize>,

    /// Initial pool size when ramping client connections.
    #[arg(long)]
    pub clients_ramp_start: Option<usize>,

    /// Final pool size when ramping client connections.
    #[arg(long)]
    pub clients_ramp_end: Option<usize>,

    /// Connections added per ramp step.
    #[arg(long)]
    pub clients_per_ramp: Option<usize>,

    /// Seconds between client ramp steps.
    #[arg(long)]
    pub client_ramp_interval: Option<u64>,

    /// Concurrent workers per group.
    #[arg(short = 't', long, default_value_t = 1)]
    pub threads: usize,

    /// Total number of requests to issue (default 100000).
    /// Mutually exclusive with --test-duration.
    #[arg(short = 'n', long)]
    pub requests: Option<u64>,

    /// Run for a fixed number of seconds instead of a request budget.
    #[arg(long)]
    pub test_duration: Option<u64>,

    /// Value size in bytes for write operations.
    #[arg(short = 'd', long, default_value_t = 3)]
    pub datasize: usize,

    /// Operation to benchmark.
    #[arg(long = "type", value_enum, default_value_t = OperationKind::Set)]
    pub operation: OperationKind,

    /// Pick keys uniformly at random from a keyspace of this size.
    #[arg(long)]
    pub random: Option<u64>,

    /// Walk keys sequentially modulo a keyspace of this size.
    #[arg(long)]
    pub sequential: Option<u64>,

    /// Shift the keyspace by this offset.
    #[arg(long)]
    pub keyspace_offset: Option<u64>,

    /// Randomize each worker's sequential starting point
    /// to spread load across shards.
    #[arg(long, default_value_t = false)]
    pub sequential_random_start: bool,

    /// Fixed target rate in queries per second.
    /// Mutually exclusive with the dynamic rate options.
    #[arg(long)]
    pub qps: Option<u64>,

    /// Initial target rate of a dynamic ramp.
    #[arg(long)]
    pub start_qps: Option<u64>,

    /// Final target rate of a dynamic ramp.
    #[arg(long)]
    pub end_qps: Option<u64>,

    /// Seconds between ramp steps.
    #[arg(long)]
    pub qps_change_interval: Option<u64>,

    /// QPS added per linear ramp step (may be negative for a ramp-down).
    #[arg(long)]
    pub qps_change: Option<i64>,

    /// Ramp shape between --start-qps and --end-qps.
    #[arg(long, value_enum)]
    pub qps_ramp_mode: Option<RampMode>,

    /// Multiplier applied per step in exponential ramp mode.
    #[arg(long)]
    pub qps_ramp_factor: Option<f64>,

    /// Emit machine-readable CSV metrics every this many seconds.
    /// Non-zero enables CSV mode: stdout carries only the header and rows.
    #[arg(long, default_value_t = 0)]
    pub interval_metrics_interval_duration_sec: u64,

    /// Log verbosity; OFF installs no log sink at all.
    #[arg(long, value_enum, default_value_t = LogLevel::Off, env = "VALKEY_BENCH_LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Worker group count: a positive integer or "auto" (CPU count).
    #[arg(long, default_value_t = String::from("auto"))]
    pub processes: String,

    /// Force a single worker group, overriding --processes.
    #[arg(long, default_value_t = false)]
    pub single_process: bool,

    /// Path identifying a custom command plug-in; the file stem selects a
    /// registered implementation.
    #[arg(long)]
    pub custom_command_file: Option<String>,

    /// Opaque init string handed to the custom command unchanged.
    #[arg(long)]
    pub custom_command_args: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Set,
    Get,
    Custom,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RampMode {
    Linear,
    Exponential,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    Off,
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    /// The tracing directive for this level; `None` means no sink is
    /// installed at all.
    pub fn directive(&self) -> Option<&'static str> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some("error"),
            LogLevel::Warning => Some("warn"),
            LogLevel::Info => Some("info"),
            LogLevel::Debug => Some("debug"),
        }
    }
}
