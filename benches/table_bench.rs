use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use ordered_hm::Table;
use std::time::Duration;

const INSERTIONS: u32 = 0xFFFFF;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn filled_int32() -> Table<u32> {
    let mut t = Table::with_capacity(INSERTIONS as usize * 2).unwrap();
    for i in 0..INSERTIONS {
        t.set_pod_key(&i, i).unwrap();
    }
    t
}

fn bench_int32_set(c: &mut Criterion) {
    c.bench_function("table::int32_set_presized", |b| {
        b.iter_batched(
            || Table::<u32>::with_capacity(INSERTIONS as usize * 2).unwrap(),
            |mut t| {
                for i in 0..INSERTIONS {
                    t.set_pod_key(&i, i).unwrap();
                }
                black_box(t)
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_int32_get(c: &mut Criterion) {
    let t = filled_int32();
    c.bench_function("table::int32_get", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for i in 0..INSERTIONS {
                sum += u64::from(*t.get_pod_key(&i).unwrap());
            }
            black_box(sum)
        })
    });
}

fn bench_int32_remove(c: &mut Criterion) {
    c.bench_function("table::int32_remove_all", |b| {
        b.iter_batched(
            filled_int32,
            |mut t| {
                for i in 0..INSERTIONS {
                    t.remove_pod_key(&i);
                }
                assert!(t.is_empty());
                black_box(t)
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_string_insert_growing_100k(c: &mut Criterion) {
    c.bench_function("table::string_insert_growing_100k", |b| {
        b.iter_batched(
            Table::<u64>::new,
            |mut t| {
                for (i, x) in lcg(1).take(100_000).enumerate() {
                    t.set(&key(x), i as u64).unwrap();
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_iterate_100k(c: &mut Criterion) {
    let mut t = Table::<u64>::new();
    for (i, x) in lcg(9).take(100_000).enumerate() {
        t.set(&key(x), i as u64).unwrap();
    }
    c.bench_function("table::iterate_100k", |b| {
        b.iter(|| black_box(t.values().sum::<u64>()))
    });
}

fn config() -> Criterion {
    Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
        .sample_size(10)
}

criterion_group!(
    name = benches;
    config = config();
    targets = bench_int32_set, bench_int32_get, bench_int32_remove,
        bench_string_insert_growing_100k, bench_iterate_100k
);
criterion_main!(benches);
