//! Benchmarks for the pure engine paths and the file-store append path.
//!
//! Run with: `cargo bench --package candlesync-bench`

use candlesync_bench::{bench_key, contiguous, holey, scrambled};
use candlesync_engine::{SyncConfig, merge_series, normalize, persist, validate};
use candlesync_store::CsvStore;
use candlesync_types::Interval;
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::time::Duration;
use tempfile::TempDir;

const SIZES: [usize; 3] = [1_000, 10_000, 100_000];

fn normalize_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    for len in SIZES {
        group.throughput(Throughput::Elements(len as u64));
        let input = scrambled(Interval::Minute1, len, 10);
        group.bench_with_input(BenchmarkId::from_parameter(len), &input, |b, input| {
            b.iter_batched(|| input.clone(), normalize, BatchSize::LargeInput);
        });
    }

    group.finish();
}

fn merge_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_series");

    for len in SIZES {
        group.throughput(Throughput::Elements(len as u64));
        let existing = contiguous(Interval::Minute1, len);
        // The incoming batch overlaps the last tenth of the stored series.
        let incoming: Vec<_> = existing[len - len / 10..].to_vec();
        group.bench_with_input(
            BenchmarkId::from_parameter(len),
            &(existing, incoming),
            |b, (existing, incoming)| {
                b.iter_batched(
                    || (existing.clone(), incoming.clone()),
                    |(e, i)| merge_series(e, i),
                    BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

fn validate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    for len in SIZES {
        group.throughput(Throughput::Elements(len as u64));
        let clean = contiguous(Interval::Minute1, len);
        let gappy = holey(Interval::Minute1, len, 97);

        group.bench_with_input(BenchmarkId::new("clean", len), &clean, |b, series| {
            b.iter(|| validate(series, Interval::Minute1));
        });
        group.bench_with_input(BenchmarkId::new("gaps", len), &gappy, |b, series| {
            b.iter(|| validate(series, Interval::Minute1));
        });
    }

    group.finish();
}

fn csv_append_benchmark(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Runtime::new() else {
        eprintln!("Skipping csv append benchmark: no tokio runtime");
        return;
    };

    let mut group = c.benchmark_group("csv_append");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));

    let page = 1_000;
    let series = contiguous(Interval::Minute1, page * 2);
    let key = bench_key(Interval::Minute1);
    let config = SyncConfig::default();
    group.throughput(Throughput::Elements(page as u64));

    // Seed one file with the first page, then copy it into a fresh root per
    // iteration so every append lands on the same tail.
    let Ok(seed_dir) = TempDir::new() else {
        return;
    };
    let seed = CsvStore::new(seed_dir.path());
    runtime
        .block_on(persist(&seed, &key, &series[..page], &config))
        .unwrap();
    let seed_file = seed.series_path(&key);

    group.bench_function("page_after_tail", |b| {
        b.to_async(&runtime).iter_batched(
            || {
                let dir = TempDir::new().unwrap();
                let store = CsvStore::new(dir.path());
                let target = store.series_path(&key);
                std::fs::create_dir_all(target.parent().unwrap()).unwrap();
                std::fs::copy(&seed_file, &target).unwrap();
                (dir, store)
            },
            |(dir, store)| {
                let (key, config, tail) = (&key, &config, &series[page..]);
                async move {
                    persist(&store, key, tail, config).await.unwrap();
                    drop(dir);
                }
            },
            BatchSize::PerIteration,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    normalize_benchmark,
    merge_benchmark,
    validate_benchmark,
    csv_append_benchmark
);
criterion_main!(benches);
