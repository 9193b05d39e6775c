use std::sync::Arc;
use std::thread;

use concurrent_u32_set::ConcurrentU32Set;
use criterion::{criterion_group, criterion_main, Criterion};

const PER_THREAD: i32 = 5_000;

fn single_thread_insert() {
    let set = ConcurrentU32Set::new(1, 1024);
    for key in 1..=PER_THREAD {
        set.insert_if_absent(0, key).unwrap();
    }
}

fn contended_insert(num_threads: usize) {
    let set = Arc::new(ConcurrentU32Set::new(num_threads, 1024));
    let handles: Vec<_> = (0..num_threads)
        .map(|tid| {
            let set = Arc::clone(&set);
            let base = (tid as i32) * PER_THREAD + 1;
            thread::spawn(move || {
                for key in base..base + PER_THREAD {
                    set.insert_if_absent(tid, key).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

fn insert_then_erase_same_key(num_threads: usize) {
    let set = Arc::new(ConcurrentU32Set::new(num_threads, 1024));
    let handles: Vec<_> = (0..num_threads)
        .map(|tid| {
            let set = Arc::clone(&set);
            thread::spawn(move || {
                for _ in 0..PER_THREAD {
                    set.insert_if_absent(tid, 1).unwrap();
                    set.erase(tid, 1).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("single_thread_insert", |b| b.iter(single_thread_insert));
    c.bench_function("contended_insert_4", |b| b.iter(|| contended_insert(4)));
    c.bench_function("same_key_contention_4", |b| {
        b.iter(|| insert_then_erase_same_key(4))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
