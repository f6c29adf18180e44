//! Benchmarks for span/position bookkeeping used on every diagnostic path.
//!
//! Run with: cargo bench --bench span_bench

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use joosc_common::position::LineMap;
use joosc_common::span::Span;

fn generate_source(lines: usize) -> String {
    let mut source = String::with_capacity(lines * 24);
    for i in 0..lines {
        source.push_str(&format!("int x{} = {};\n", i, i));
    }
    source
}

fn bench_line_map_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_map_build");

    for size in [100, 1000, 10000].iter() {
        let source = generate_source(*size);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, source| {
            b.iter(|| black_box(LineMap::new(black_box(source))))
        });
    }

    group.finish();
}

fn bench_position_lookup(c: &mut Criterion) {
    let source = generate_source(5000);
    let map = LineMap::new(&source);
    let offsets: Vec<u32> = (0..source.len() as u32).step_by(37).collect();

    c.bench_function("position_lookup", |b| {
        b.iter(|| {
            for &offset in &offsets {
                black_box(map.position(black_box(offset)));
            }
        })
    });
}

fn bench_span_merge(c: &mut Criterion) {
    c.bench_function("span_merge", |b| {
        b.iter(|| {
            let mut acc = Span::new(0, 1);
            for i in 0..1000u32 {
                acc = black_box(acc.merge(Span::new(i, i + 5)));
            }
            black_box(acc)
        })
    });
}

criterion_group!(benches, bench_line_map_build, bench_position_lookup, bench_span_merge);
criterion_main!(benches);
