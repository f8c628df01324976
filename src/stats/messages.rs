//! Typed messages from workers to the orchestrator.
//!
//! Histograms travel as compressed payloads (see [`super::histogram`]),
//! so the channel contract is identical whether workers live in the same
//! process or not. The orchestrator is the only consumer.

/// One message on the worker -> orchestrator channel.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Roughly once per second: cumulative totals plus the rotated
    /// 1-second window histogram for the progress line.
    Progress {
        worker_id: usize,
        requests_completed: u64,
        errors: u64,
        window_histogram: Vec<u8>,
        window_count: u64,
        ts: i64,
    },
    /// Once per CSV interval: the rotated interval histogram and the
    /// per-interval counter deltas.
    CsvInterval {
        worker_id: usize,
        window_ts: i64,
        duration_s: f64,
        interval_histogram: Vec<u8>,
        requests: u64,
        errors: u64,
        moved: u64,
        clusterdown: u64,
        disconnects: u64,
    },
    /// At worker exit: lifetime totals and the overall histogram.
    Final {
        worker_id: usize,
        requests_completed: u64,
        errors: u64,
        overall_histogram: Vec<u8>,
        total_time_s: f64,
    },
    /// A worker group could not start (e.g. no connection could be
    /// established); the run must abort.
    Fatal { group_id: usize, error: String },
}
