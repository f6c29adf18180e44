//! Run with: cargo bench --bench lexer_bench

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use joosc_common::span::FileId;
use joosc_lexer::lex;

fn generate_source(decls: usize) -> String {
    let mut source = String::from("public class Generated {\n");
    for i in 0..decls {
        source.push_str(&format!(
            "  public int field{i} = {i};\n  public int method{i}(int x) {{ return x + {i}; }}\n"
        ));
    }
    source.push_str("}\n");
    source
}

fn bench_lex_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("lex_throughput");
    for size in [10, 100, 1000].iter() {
        let source = generate_source(*size);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, source| {
            b.iter(|| black_box(lex(FileId(0), black_box(source))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lex_throughput);
criterion_main!(benches);
