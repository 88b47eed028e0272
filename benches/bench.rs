use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rugo_compiler::preprocess_source;

const SAMPLE: &str = r#"
def fib(n)
  if n < 2
    n
  else
    fib(n - 1) + fib(n - 2)
  end
end

result = try fib(10) or 0
puts result
"#;

fn bench_preprocess(c: &mut Criterion) {
    c.bench_function("preprocess_sample", |b| {
        b.iter(|| preprocess_source(black_box(SAMPLE)).unwrap())
    });
}

criterion_group!(benches, bench_preprocess);
criterion_main!(benches);
