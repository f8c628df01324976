//! Latency histograms, per-worker recorders and the messages that carry
//! them to the orchestrator.

pub mod histogram;
pub mod messages;
pub mod recorder;

pub use messages::WorkerMessage;
pub use recorder::{IntervalCounters, IntervalSnapshot, OverallCounters, WorkerStats};

use hdrhistogram::Histogram;

/// Lowest discernible latency in microseconds.
pub const HISTOGRAM_MIN_US: u64 = 10;

/// Maximum trackable latency in microseconds (60 seconds).
pub const HISTOGRAM_MAX_US: u64 = 60 * 1_000_000;

/// Number of significant digits for HDR histogram precision.
pub const HISTOGRAM_SIGFIG: u8 = 3;

/// Creates a new HDR histogram for latency tracking.
pub fn new_histogram() -> Histogram<u64> {
    Histogram::<u64>::new_with_bounds(HISTOGRAM_MIN_US, HISTOGRAM_MAX_US, HISTOGRAM_SIGFIG)
        .expect("histogram bounds are static")
}
