mod common;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use common::{src_branchy, src_loop_accumulate, src_wide_program};
use tarnlib::bytecode::compile_source;
use tarnlib::parser::Parser;

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    let loop_src = src_loop_accumulate(1_000);
    group.bench_function("parse_loop", |b| {
        b.iter(|| {
            let _ = Parser::parse_source(black_box(&loop_src));
        })
    });
    group.bench_function("lower_loop", |b| {
        b.iter(|| {
            let _ = compile_source(black_box(&loop_src));
        })
    });

    let branchy_src = src_branchy(1_000);
    group.bench_function("lower_branchy", |b| {
        b.iter(|| {
            let _ = compile_source(black_box(&branchy_src));
        })
    });

    let wide_src = src_wide_program(120);
    group.bench_function("lower_wide_program", |b| {
        b.iter(|| {
            let _ = compile_source(black_box(&wide_src));
        })
    });

    group.finish();
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
