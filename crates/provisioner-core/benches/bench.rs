use core::{hint::black_box, num::NonZeroUsize, time::Duration};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use provisioner_core::{
    Coordinator, DEFAULT_KEY_LENGTH, DEFAULT_MAX_ROUND_SIZE, KeyGenerator, RandomKeyGenerator,
    RoundOutcome, RoundSettings, TaskLimiter,
};
use std::sync::Arc;
use tokio::runtime::Builder;

// Keys per round in the round benchmarks.
const ROUND_SIZES: [usize; 3] = [1, 64, 1024];

fn bench_generator(c: &mut Criterion) {
    let mut group = c.benchmark_group("generator");
    group.throughput(Throughput::Elements(1));

    let generator = RandomKeyGenerator;
    group.bench_function(format!("len/{DEFAULT_KEY_LENGTH}"), |b| {
        b.iter(|| black_box(generator.generate(DEFAULT_KEY_LENGTH).unwrap()));
    });

    group.finish();
}

fn bench_round(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    for (name, limiter) in [
        ("unbounded", TaskLimiter::unbounded()),
        ("bounded/8", TaskLimiter::new(NonZeroUsize::new(8))),
    ] {
        let mut group = c.benchmark_group(format!("round/{name}"));
        let coordinator = Coordinator::new(
            Arc::new(RandomKeyGenerator),
            limiter,
            RoundSettings {
                key_length: DEFAULT_KEY_LENGTH,
                worker_delay: Duration::ZERO,
                round_timeout: None,
                max_round_size: DEFAULT_MAX_ROUND_SIZE,
            },
        );

        for size in ROUND_SIZES {
            group.throughput(Throughput::Elements(size as u64));
            group.bench_function(format!("keys/{size}"), |b| {
                b.to_async(&rt).iter(|| async {
                    match coordinator.run_round(size).await {
                        RoundOutcome::Completed(keys) => {
                            black_box(keys);
                        }
                        other => panic!("round did not complete: {other:?}"),
                    }
                });
            });
        }

        group.finish();
    }
}

criterion_group!(benches, bench_generator, bench_round);
criterion_main!(benches);
