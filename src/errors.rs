//! Errors.

use std::io;

/// Process exit codes.
///
/// `0` also covers a clean interrupt; `2` is reserved for a worker group
/// that died underneath the orchestrator.
pub mod exit {
    pub const OK: i32 = 0;
    pub const CONFIG_OR_CONNECT: i32 = 1;
    pub const CHILD_CRASHED: i32 = 2;
}

/// Various errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: redis::RedisError,
    },
    #[error("connection to {0} timed out")]
    ConnectTimeout(String),
    #[error(transparent)]
    Request(#[from] redis::RedisError),
    #[error("request timed out")]
    RequestTimeout,
    #[error("failed to encode histogram: {0}")]
    HistogramEncode(String),
    #[error("failed to decode histogram: {0}")]
    HistogramDecode(String),
    #[error("worker group {0} crashed")]
    ChildCrashed(usize),
    #[error("shutting down")]
    ShuttingDown,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Argument combinations rejected before any worker starts (exit code 1).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--qps is mutually exclusive with --start-qps/--end-qps/--qps-change-interval/--qps-change")]
    FixedAndDynamicRate,
    #[error("--qps must be positive")]
    NonPositiveQps,
    #[error("dynamic rate requires --end-qps and --qps-change-interval")]
    IncompleteDynamicRate,
    #[error("--qps-change is required for a linear ramp and must share sign with (end - start)")]
    BadLinearStep,
    #[error("--qps-ramp-factor is required for an exponential ramp")]
    MissingRampFactor,
    #[error("--qps-ramp-factor must be greater than zero")]
    NonPositiveRampFactor,
    #[error("--requests and --test-duration are mutually exclusive")]
    RequestsAndDuration,
    #[error("--random and --sequential are mutually exclusive")]
    RandomAndSequential,
    #[error("--keyspace-offset requires --random or --sequential")]
    OffsetWithoutKeyspace,
    #[error("--sequential-random-start requires --sequential")]
    RandomStartWithoutSequential,
    #[error("keyspace size must be positive")]
    EmptyKeyspace,
    #[error("--clients is mutually exclusive with the client ramp options")]
    ClientsAndRamp,
    #[error("--clients-ramp-start, --clients-ramp-end, --clients-per-ramp and --client-ramp-interval must be given together")]
    IncompleteClientRamp,
    #[error("client ramp must grow: ramp start must be positive and not exceed ramp end")]
    BadClientRamp,
    #[error("--clients must be positive")]
    NoClients,
    #[error("--threads must be positive")]
    NoWorkers,
    #[error("--datasize must be positive for write operations")]
    EmptyValue,
    #[error("--type custom requires --custom-command-file")]
    MissingCustomCommand,
    #[error("unknown custom command {0:?}")]
    UnknownCustomCommand(String),
    #[error("--processes expects a positive integer or \"auto\", got {0:?}")]
    BadProcesses(String),
}

/// Per-call classification drawn from the server's error vocabulary.
///
/// Matching is a case-insensitive substring check so it works across
/// client library versions that prefix or wrap the server message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestErrorKind {
    Generic,
    Moved,
    ClusterDown,
}

impl RequestErrorKind {
    pub fn classify(message: &str) -> RequestErrorKind {
        let upper = message.to_uppercase();
        if upper.contains("MOVED") {
            RequestErrorKind::Moved
        } else if upper.contains("CLUSTERDOWN") {
            RequestErrorKind::ClusterDown
        } else {
            RequestErrorKind::Generic
        }
    }
}
