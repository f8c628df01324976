use criterion::{black_box, criterion_group, criterion_main, Criterion};

use valkey_bench::stats::histogram::{encode, merge_into, percentiles};
use valkey_bench::stats::new_histogram;

fn bench_record(c: &mut Criterion) {
    c.bench_function("histogram_record", |b| {
        let mut histogram = new_histogram();
        let mut i = 0u64;
        b.iter(|| {
            i = i.wrapping_add(7919);
            histogram.saturating_record(black_box(10 + i % 1_000_000));
        });
    });
}

fn bench_encode_merge(c: &mut Criterion) {
    let mut histogram = new_histogram();
    for i in 0..1_000_000u64 {
        histogram.saturating_record(10 + (i * i) % 10_000_000);
    }
    let payload = encode(&histogram).unwrap();

    c.bench_function("histogram_encode", |b| {
        b.iter(|| encode(black_box(&histogram)).unwrap())
    });
    c.bench_function("histogram_decode_merge", |b| {
        b.iter(|| {
            let mut target = new_histogram();
            merge_into(&mut target, black_box(&payload)).unwrap();
            target.len()
        })
    });
    c.bench_function("histogram_percentiles", |b| {
        b.iter(|| percentiles(black_box(&histogram)))
    });
}

criterion_group!(benches, bench_record, bench_encode_merge);
criterion_main!(benches);
