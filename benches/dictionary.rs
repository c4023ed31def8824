use criterion::{criterion_group, criterion_main, Criterion};
use std::time::Instant;
use stripekv::Dictionary;

fn insert_cold(c: &mut Criterion) {
    c.bench_function("Dictionary: insert, cold", |b| {
        b.iter_custom(|iters| {
            let dictionary: Dictionary<u64, u64> = Dictionary::default();
            let start = Instant::now();
            for i in 0..iters {
                assert!(dictionary.try_add(i, i));
            }
            start.elapsed()
        })
    });
}

fn insert_warmed_up(c: &mut Criterion) {
    c.bench_function("Dictionary: insert, warmed up", |b| {
        b.iter_custom(|iters| {
            let dictionary: Dictionary<u64, u64> = Dictionary::with_capacity(iters as usize * 2);
            let start = Instant::now();
            for i in 0..iters {
                assert!(dictionary.try_add(i, i));
            }
            start.elapsed()
        })
    });
}

fn read(c: &mut Criterion) {
    c.bench_function("Dictionary: read", |b| {
        b.iter_custom(|iters| {
            let dictionary: Dictionary<u64, u64> = Dictionary::with_capacity(iters as usize * 2);
            for i in 0..iters {
                assert!(dictionary.try_add(i, i));
            }
            let start = Instant::now();
            for i in 0..iters {
                assert_eq!(dictionary.read(&i, |_, v| *v == i), Some(true));
            }
            start.elapsed()
        })
    });
}

fn add_or_update(c: &mut Criterion) {
    c.bench_function("Dictionary: add_or_update", |b| {
        b.iter_custom(|iters| {
            let dictionary: Dictionary<u64, u64> = Dictionary::default();
            let start = Instant::now();
            for i in 0..iters {
                dictionary.add_or_update(i % 1024, 0, |_, v| v + 1);
            }
            start.elapsed()
        })
    });
}

fn to_vec(c: &mut Criterion) {
    let dictionary: Dictionary<u64, u64> = (0..65_536).map(|i| (i, i)).collect();
    c.bench_function("Dictionary: to_vec, 65536 entries", |b| {
        b.iter(|| dictionary.to_vec().len())
    });
}

criterion_group!(
    dictionary,
    insert_cold,
    insert_warmed_up,
    read,
    add_or_update,
    to_vec
);
criterion_main!(dictionary);
