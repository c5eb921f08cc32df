use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sapf::input::ZIn;
use sapf::parser::compile;
use sapf::vm::Thread;

/// Pull one second of a signal expression through the benchmark sink.
fn pull_seconds(source: &str, samples: usize) -> usize {
    let mut th = Thread::for_tests();
    let fun = compile(&th, source).unwrap();
    th.call_fun(&fun).unwrap();
    let v = th.pop().unwrap();
    let mut zin = ZIn::new(v);
    let mut n = samples;
    zin.bench(&mut th, &mut n).unwrap();
    n
}

fn series_bench(c: &mut Criterion) {
    c.bench_function("ramp 96k", |b| {
        b.iter(|| black_box(pull_seconds("0 0.0001 byz", 96000)))
    });
}

fn math_bench(c: &mut Criterion) {
    c.bench_function("ramp times ramp 96k", |b| {
        b.iter(|| black_box(pull_seconds("0 0.0001 byz 1 0.0001 byz *", 96000)))
    });
}

fn sine_bench(c: &mut Criterion) {
    c.bench_function("sin of ramp 96k", |b| {
        b.iter(|| black_box(pull_seconds("0 0.001 byz sin", 96000)))
    });
}

criterion_group!(benches, series_bench, math_bench, sine_bench);
criterion_main!(benches);
