//! CSV emission.
//!
//! Stdout in CSV mode carries exactly one header line and then rows of 16
//! comma-separated fields, nothing else. Formatting never produces
//! scientific notation or padding whitespace, so the output stays
//! compatible with the existing parser.

use hdrhistogram::Histogram;

use crate::stats::histogram::{percentiles, truncated_mean};
use crate::stats::IntervalCounters;

pub const CSV_HEADER: &str = "timestamp,request_sec,p50_usec,p90_usec,p95_usec,p99_usec,\
p99_9_usec,p99_99_usec,p99_999_usec,p100_usec,avg_usec,request_finished,\
requests_total_failed,requests_moved,requests_clusterdown,client_disconnects";

/// One fully computed CSV row.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    pub timestamp: i64,
    pub request_sec: f64,
    pub percentiles: [u64; 8],
    pub avg: u64,
    pub counters: IntervalCounters,
}

impl CsvRow {
    /// Build a row from a merged interval histogram and its counters.
    /// `request_sec` counts successful requests only.
    pub fn build(
        timestamp: i64,
        duration_s: f64,
        histogram: &Histogram<u64>,
        counters: IntervalCounters,
    ) -> CsvRow {
        let request_sec = if duration_s > 0.0 {
            counters.requests as f64 / duration_s
        } else {
            0.0
        };
        CsvRow {
            timestamp,
            request_sec,
            percentiles: percentiles(histogram),
            avg: truncated_mean(histogram),
            counters,
        }
    }

    pub fn to_line(&self) -> String {
        let p = &self.percentiles;
        let c = &self.counters;
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.timestamp,
            format_rate(self.request_sec),
            p[0],
            p[1],
            p[2],
            p[3],
            p[4],
            p[5],
            p[6],
            p[7],
            self.avg,
            c.requests,
            c.errors,
            c.moved,
            c.clusterdown,
            c.disconnects,
        )
    }
}

/// Up to six decimals, trailing zeros trimmed, never scientific notation.
pub fn format_rate(value: f64) -> String {
    let formatted = format!("{value:.6}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Serializes rows to stdout; the header goes out exactly once.
#[derive(Debug, Default)]
pub struct CsvWriter {
    header_written: bool,
}

impl CsvWriter {
    pub fn new() -> CsvWriter {
        CsvWriter::default()
    }

    pub fn write_header(&mut self) {
        if !self.header_written {
            println!("{CSV_HEADER}");
            self.header_written = true;
        }
    }

    pub fn write_row(&mut self, row: &CsvRow) {
        self.write_header();
        println!("{}", row.to_line());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::new_histogram;

    #[test]
    fn header_has_sixteen_fields() {
        assert_eq!(CSV_HEADER.split(',').count(), 16);
        assert!(!CSV_HEADER.contains(' '));
    }

    #[test]
    fn row_has_sixteen_fields_without_whitespace() {
        let mut histogram = new_histogram();
        for i in 1..=1000u64 {
            histogram.saturating_record(i * 10);
        }
        let counters = IntervalCounters {
            requests: 990,
            errors: 10,
            moved: 3,
            clusterdown: 1,
            disconnects: 2,
        };
        let row = CsvRow::build(1_700_000_000, 2.0, &histogram, counters);
        let line = row.to_line();
        assert_eq!(line.split(',').count(), 16);
        assert!(!line.contains(' '));
        assert!(!line.contains('e') && !line.contains('E'));

        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields[0], "1700000000");
        assert_eq!(fields[1], "495");
        assert_eq!(fields[11], "990");
        assert_eq!(fields[12], "10");
        assert_eq!(fields[13], "3");
        assert_eq!(fields[14], "1");
        assert_eq!(fields[15], "2");
    }

    #[test]
    fn empty_interval_zeroes_latency_fields() {
        let histogram = new_histogram();
        let row = CsvRow::build(0, 1.0, &histogram, IntervalCounters::default());
        let fields: Vec<String> = row.to_line().split(',').map(str::to_string).collect();
        for field in &fields[2..11] {
            assert_eq!(field, "0");
        }
    }

    #[test]
    fn percentile_columns_are_monotonic() {
        let mut histogram = new_histogram();
        for i in 1..=10_000u64 {
            histogram.saturating_record(10 + (i * i) % 50_000);
        }
        let row = CsvRow::build(0, 1.0, &histogram, IntervalCounters::default());
        for pair in row.percentiles.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert!(row.avg <= row.percentiles[7]);
    }

    #[test]
    fn rate_formatting() {
        assert_eq!(format_rate(500.0), "500");
        assert_eq!(format_rate(499.5), "499.5");
        assert_eq!(format_rate(0.0), "0");
        assert_eq!(format_rate(1234.567891), "1234.567891");
        assert_eq!(format_rate(0.0000004), "0");
        assert_eq!(format_rate(2_000_000_000.0), "2000000000");
    }
}
