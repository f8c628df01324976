//! Per-worker metrics recording.
//!
//! Each worker owns one [`WorkerStats`]; nothing here is shared across
//! workers except the run-wide atomic counters feeding the progress line.
//! Snapshots leave the worker only through rotations, as owned values.

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hdrhistogram::Histogram;

use super::new_histogram;
use crate::errors::RequestErrorKind;

/// Counters reset at each CSV emission boundary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IntervalCounters {
    /// Successfully finished requests.
    pub requests: u64,
    /// All failed requests, whatever the classification.
    pub errors: u64,
    pub moved: u64,
    pub clusterdown: u64,
    pub disconnects: u64,
}

/// An interval histogram plus its counter deltas, produced by
/// [`WorkerStats::rotate_interval`].
#[derive(Debug)]
pub struct IntervalSnapshot {
    pub histogram: Histogram<u64>,
    pub counters: IntervalCounters,
}

impl IntervalSnapshot {
    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty() && self.counters == IntervalCounters::default()
    }
}

/// Monotonic run-wide counters, shared with the progress reporter.
/// Authoritative totals travel in worker messages; these exist so the
/// reporter can print without waiting on the channel.
#[derive(Debug, Default)]
pub struct OverallCounters {
    pub total_requests: AtomicU64,
    pub total_errors: AtomicU64,
}

impl OverallCounters {
    pub fn totals(&self) -> (u64, u64) {
        (
            self.total_requests.load(Ordering::Relaxed),
            self.total_errors.load(Ordering::Relaxed),
        )
    }
}

/// Written only by the owning worker. Every sample lands in all three
/// histograms at once: `overall` lives for the run, `window` backs the
/// 1-second progress line, `interval` backs the CSV row.
pub struct WorkerStats {
    pub worker_id: usize,
    overall: Histogram<u64>,
    window: Histogram<u64>,
    interval: Histogram<u64>,
    counters: IntervalCounters,
    /// Completed calls, successful or not.
    pub requests_completed: u64,
    pub total_errors: u64,
    shared: Arc<OverallCounters>,
}

impl WorkerStats {
    pub fn new(worker_id: usize, shared: Arc<OverallCounters>) -> WorkerStats {
        WorkerStats {
            worker_id,
            overall: new_histogram(),
            window: new_histogram(),
            interval: new_histogram(),
            counters: IntervalCounters::default(),
            requests_completed: 0,
            total_errors: 0,
            shared,
        }
    }

    pub fn record_ok(&mut self, latency_us: u64) {
        self.record_latency(latency_us);
        self.counters.requests += 1;
        self.requests_completed += 1;
        self.shared.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed call. The latency is inserted only when the caller
    /// has one; classification always bumps `errors` plus its own counter.
    pub fn record_err(&mut self, kind: RequestErrorKind, latency_us: Option<u64>) {
        if let Some(latency_us) = latency_us {
            self.record_latency(latency_us);
        }
        self.counters.errors += 1;
        match kind {
            RequestErrorKind::Moved => self.counters.moved += 1,
            RequestErrorKind::ClusterDown => self.counters.clusterdown += 1,
            RequestErrorKind::Generic => {}
        }
        self.requests_completed += 1;
        self.total_errors += 1;
        self.shared.total_requests.fetch_add(1, Ordering::Relaxed);
        self.shared.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold pool-level connection failures into the current interval.
    pub fn add_disconnects(&mut self, n: u64) {
        self.counters.disconnects += n;
    }

    /// Reset the window histogram, returning the previous one.
    pub fn rotate_window(&mut self) -> Histogram<u64> {
        mem::replace(&mut self.window, new_histogram())
    }

    /// Reset the interval histogram and counters, returning both.
    pub fn rotate_interval(&mut self) -> IntervalSnapshot {
        IntervalSnapshot {
            histogram: mem::replace(&mut self.interval, new_histogram()),
            counters: mem::take(&mut self.counters),
        }
    }

    pub fn overall(&self) -> &Histogram<u64> {
        &self.overall
    }

    fn record_latency(&mut self, latency_us: u64) {
        self.overall.saturating_record(latency_us);
        self.window.saturating_record(latency_us);
        self.interval.saturating_record(latency_us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> WorkerStats {
        WorkerStats::new(0, Arc::new(OverallCounters::default()))
    }

    #[test]
    fn every_sample_lands_in_all_three_histograms() {
        let mut s = stats();
        s.record_ok(100);
        s.record_ok(200);
        s.record_err(RequestErrorKind::Generic, Some(300));
        assert_eq!(s.overall().len(), 3);
        assert_eq!(s.rotate_window().len(), 3);
        let snapshot = s.rotate_interval();
        assert_eq!(snapshot.histogram.len(), 3);
        assert_eq!(snapshot.counters.requests, 2);
        assert_eq!(snapshot.counters.errors, 1);
        // The overall histogram survives both rotations.
        assert_eq!(s.overall().len(), 3);
        assert_eq!(s.requests_completed, 3);
    }

    #[test]
    fn rotation_resets_the_live_side() {
        let mut s = stats();
        s.record_ok(50);
        assert_eq!(s.rotate_window().len(), 1);
        assert_eq!(s.rotate_window().len(), 0);

        s.record_ok(50);
        assert!(!s.rotate_interval().is_empty());
        assert!(s.rotate_interval().is_empty());
    }

    #[test]
    fn error_classification_feeds_counters() {
        let mut s = stats();
        s.record_err(RequestErrorKind::Moved, Some(10));
        s.record_err(RequestErrorKind::ClusterDown, None);
        s.record_err(RequestErrorKind::Generic, None);
        let snapshot = s.rotate_interval();
        assert_eq!(snapshot.counters.errors, 3);
        assert_eq!(snapshot.counters.moved, 1);
        assert_eq!(snapshot.counters.clusterdown, 1);
        // Only the MOVED error carried a latency sample.
        assert_eq!(snapshot.histogram.len(), 1);
        assert_eq!(s.total_errors, 3);
    }

    #[test]
    fn shared_counters_track_all_workers() {
        let shared = Arc::new(OverallCounters::default());
        let mut a = WorkerStats::new(0, Arc::clone(&shared));
        let mut b = WorkerStats::new(1, Arc::clone(&shared));
        a.record_ok(10);
        b.record_ok(10);
        b.record_err(RequestErrorKind::Generic, Some(10));
        assert_eq!(shared.totals(), (3, 1));
    }
}
