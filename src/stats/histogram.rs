//! Histogram transport and percentile extraction.
//!
//! Workers hand rotation snapshots to the orchestrator as compressed
//! HDR payloads (V2 + deflate); the orchestrator decodes and merges them.
//! Percentiles are extracted by rank over recorded buckets, without
//! interpolation, so emitted values are always real bucket boundaries.

use std::io::Cursor;

use hdrhistogram::serialization::{Deserializer, Serializer, V2DeflateSerializer};
use hdrhistogram::Histogram;

use crate::errors::Error;

/// The ladder emitted in every CSV row, in order.
pub const PERCENTILE_LADDER: [f64; 8] = [50.0, 90.0, 95.0, 99.0, 99.9, 99.99, 99.999, 100.0];

pub fn encode(histogram: &Histogram<u64>) -> Result<Vec<u8>, Error> {
    let mut payload = Vec::new();
    V2DeflateSerializer::new()
        .serialize(histogram, &mut payload)
        .map_err(|e| Error::HistogramEncode(e.to_string()))?;
    Ok(payload)
}

pub fn decode(payload: &[u8]) -> Result<Histogram<u64>, Error> {
    Deserializer::new()
        .deserialize(&mut Cursor::new(payload))
        .map_err(|e| Error::HistogramDecode(e.to_string()))
}

/// Decode a compressed payload and add it into `target`.
pub fn merge_into(target: &mut Histogram<u64>, payload: &[u8]) -> Result<(), Error> {
    let decoded = decode(payload)?;
    target
        .add(&decoded)
        .map_err(|e| Error::HistogramDecode(e.to_string()))
}

/// Values for [`PERCENTILE_LADDER`], in microseconds.
///
/// The rank of percentile `p` is `floor(p/100 * count)` clamped to
/// `count - 1`; the emitted value is the recorded bucket covering that
/// rank. An empty histogram yields all zeros.
pub fn percentiles(histogram: &Histogram<u64>) -> [u64; 8] {
    let count = histogram.len();
    let mut out = [0u64; 8];
    if count == 0 {
        return out;
    }
    let ranks: Vec<u64> = PERCENTILE_LADDER
        .iter()
        .map(|p| (((p / 100.0) * count as f64).floor() as u64).min(count - 1))
        .collect();

    let mut cumulative = 0u64;
    let mut next = 0usize;
    for value in histogram.iter_recorded() {
        cumulative += value.count_since_last_iteration();
        while next < out.len() && ranks[next] < cumulative {
            out[next] = value.value_iterated_to();
            next += 1;
        }
        if next == out.len() {
            break;
        }
    }
    while next < out.len() {
        out[next] = histogram.max();
        next += 1;
    }
    out
}

/// Mean latency truncated to integer microseconds; zero when empty.
pub fn truncated_mean(histogram: &Histogram<u64>) -> u64 {
    if histogram.is_empty() {
        0
    } else {
        histogram.mean() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::new_histogram;

    #[test]
    fn round_trip_preserves_every_bucket() {
        let mut histogram = new_histogram();
        for i in 1..=10_000u64 {
            histogram.saturating_record(i * 7 % 500_000 + 10);
        }
        let decoded = decode(&encode(&histogram).unwrap()).unwrap();
        assert_eq!(decoded, histogram);
        assert_eq!(decoded.len(), histogram.len());
    }

    #[test]
    fn decode_garbage_fails() {
        assert!(decode(b"not a histogram").is_err());
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn merged_percentiles_match_combined_recording() {
        let mut left = new_histogram();
        let mut right = new_histogram();
        let mut combined = new_histogram();
        for i in 0..50_000u64 {
            let v = 10 + (i * i) % 1_000_000;
            if i % 2 == 0 {
                left.saturating_record(v);
            } else {
                right.saturating_record(v);
            }
            combined.saturating_record(v);
        }
        let mut merged = new_histogram();
        merge_into(&mut merged, &encode(&left).unwrap()).unwrap();
        merge_into(&mut merged, &encode(&right).unwrap()).unwrap();
        assert_eq!(merged.len(), combined.len());
        assert_eq!(percentiles(&merged), percentiles(&combined));
    }

    #[test]
    fn percentile_ladder_is_monotonic() {
        let mut histogram = new_histogram();
        for i in 1..=100_000u64 {
            histogram.saturating_record(10 + i % 60_000);
        }
        let ladder = percentiles(&histogram);
        for pair in ladder.windows(2) {
            assert!(pair[0] <= pair[1], "ladder not monotonic: {ladder:?}");
        }
        assert!(truncated_mean(&histogram) <= ladder[7]);
    }

    #[test]
    fn percentiles_by_rank() {
        let mut histogram = new_histogram();
        for i in 1..=100u64 {
            histogram.saturating_record(i * 100);
        }
        let ladder = percentiles(&histogram);
        // Rank of p50 over 100 samples is 50, i.e. the 51st value; values
        // are bucket-equivalent within the 3-significant-digit precision.
        assert!(
            (ladder[0] as i64 - 5100).unsigned_abs() <= 8,
            "p50 was {}",
            ladder[0]
        );
        assert!((ladder[7] as i64 - 10_000).unsigned_abs() <= 8, "p100 was {}", ladder[7]);
    }

    #[test]
    fn empty_histogram_yields_zeros() {
        let histogram = new_histogram();
        assert_eq!(percentiles(&histogram), [0; 8]);
        assert_eq!(truncated_mean(&histogram), 0);
    }

    #[test]
    fn single_sample_fills_the_ladder() {
        let mut histogram = new_histogram();
        histogram.saturating_record(250);
        let ladder = percentiles(&histogram);
        for value in ladder {
            assert_eq!(value, histogram.max());
        }
    }
}
