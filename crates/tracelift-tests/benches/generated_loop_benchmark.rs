use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use tracelift_tests::*;

fn accumulate_100_generated_bench(c: &mut Criterion) {
    c.bench_function("accumulate 100 generated", |b| {
        b.iter(|| loop_accumulate::forward(black_box(100), black_box(0)))
    });
}

fn accumulate_100_orig_bench(c: &mut Criterion) {
    c.bench_function("accumulate 100 plain rust", |b| {
        b.iter(|| accumulate_orig(black_box(100), black_box(0)))
    });
}

fn silu_generated_bench(c: &mut Criterion) {
    c.bench_function("silu generated (fused)", |b| {
        b.iter(|| silu::forward(black_box(0.75)))
    });
}

fn silu_unfused_bench(c: &mut Criterion) {
    c.bench_function("silu generated (unfused)", |b| {
        b.iter(|| silu_unfused::forward(black_box(0.75)))
    });
}

criterion_group!(
    benches,
    accumulate_100_generated_bench,
    accumulate_100_orig_bench,
    silu_generated_bench,
    silu_unfused_bench
);
criterion_main!(benches);
