use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::StreamExt;
use sluice::{DeliveryMode, PoolConfig, TaskPool, ThreadPool, TransformError};
use std::{thread::scope, time::Instant};
use tokio::runtime::Builder;

// Number of jobs pushed through the pool per benchmark iteration.
const TOTAL_JOBS: usize = 4096;

fn checksum(x: u64) -> Result<u64, TransformError> {
    Ok(x.wrapping_mul(0x9E37_79B9_7F4A_7C15).rotate_left(17))
}

async fn checksum_async(x: u64) -> Result<u64, TransformError> {
    checksum(x)
}

fn config(workers: usize, delivery: DeliveryMode) -> PoolConfig {
    PoolConfig::new(workers, 256, 256, delivery)
}

/// Submits `TOTAL_JOBS` from the bench thread while a second thread drains
/// the outcomes.
fn bench_thread_pool(c: &mut Criterion, group_name: &str, delivery: DeliveryMode) {
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_JOBS as u64));

    for workers in [1, 2, 4, 8] {
        group.bench_function(format!("workers/{workers}"), |b| {
            b.iter_custom(|iters| {
                let start = Instant::now();

                for _ in 0..iters {
                    let pool = ThreadPool::new(config(workers, delivery), checksum).unwrap();
                    let results = pool.results().unwrap();
                    scope(|s| {
                        let collector = s.spawn(move || {
                            for outcome in results {
                                black_box(outcome);
                            }
                        });
                        for n in 0..TOTAL_JOBS as u64 {
                            pool.submit(n).unwrap();
                        }
                        pool.shutdown(true).unwrap();
                        collector.join().unwrap();
                    });
                }

                start.elapsed()
            });
        });
    }

    group.finish();
}

/// Same workload as [`bench_thread_pool`] on a multi-threaded Tokio runtime.
fn bench_task_pool(c: &mut Criterion, group_name: &str, delivery: DeliveryMode) {
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_JOBS as u64));

    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    for workers in [1, 2, 4, 8] {
        group.bench_function(format!("workers/{workers}"), |b| {
            b.to_async(&rt).iter_custom(|iters| async move {
                let start = Instant::now();

                for _ in 0..iters {
                    let pool = TaskPool::new(config(workers, delivery), checksum_async).unwrap();
                    let results = pool.results().unwrap();
                    let drain = results.for_each(|outcome| {
                        black_box(outcome);
                        async {}
                    });
                    let feed = async {
                        for n in 0..TOTAL_JOBS as u64 {
                            pool.submit(n).await.unwrap();
                        }
                        pool.shutdown(true).await.unwrap();
                    };
                    tokio::join!(drain, feed);
                }

                start.elapsed()
            });
        });
    }

    group.finish();
}

fn benchmark_thread_unordered(c: &mut Criterion) {
    bench_thread_pool(c, "thread/unordered", DeliveryMode::Unordered);
}

fn benchmark_thread_ordered(c: &mut Criterion) {
    bench_thread_pool(c, "thread/ordered", DeliveryMode::Ordered);
}

fn benchmark_tokio_unordered(c: &mut Criterion) {
    bench_task_pool(c, "async/tokio/unordered", DeliveryMode::Unordered);
}

fn benchmark_tokio_ordered(c: &mut Criterion) {
    bench_task_pool(c, "async/tokio/ordered", DeliveryMode::Ordered);
}

criterion_group!(
    benches,
    // Blocking
    benchmark_thread_unordered,
    benchmark_thread_ordered,
    // Async
    benchmark_tokio_unordered,
    benchmark_tokio_ordered,
);
criterion_main!(benches);
