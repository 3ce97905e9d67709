//! Criterion benchmarks for dynquery.
//!
//! Separates the two costs of a dynamic operator call: building it
//! (parse, bind, type arguments, signature check) and running it through
//! the in-memory provider.
//!
//! Run:
//!   cargo bench
//!   cargo bench -- build      # one group
//!   cargo bench -- execute    # one group

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dynquery::{compile_lambda, Bindings, QuerySource, RecordType, Type, Value};

// ── Data builders ─────────────────────────────────────────────────────────────

fn product_type() -> Arc<RecordType> {
    RecordType::named(
        "Product",
        [
            ("Id", Type::Int),
            ("Name", Type::String),
            ("Category", Type::String),
            ("Price", Type::Float),
            ("Stock", Type::nullable(Type::Int)),
        ],
    )
}

/// `n` products spread over five categories.
fn products(n: usize) -> QuerySource {
    let ty = product_type();
    let values = (0..n)
        .map(|i| {
            Value::record(
                &ty,
                vec![
                    Value::Int(i as i32),
                    Value::from(format!("Product {i}")),
                    Value::from(format!("C{}", i % 5)),
                    Value::Float(10.0 + i as f64 * 2.5),
                    if i % 4 == 0 { Value::Null } else { Value::Int((i % 50) as i32) },
                ],
            )
            .unwrap()
        })
        .collect();
    QuerySource::from_values(Type::Record(ty), values).unwrap()
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let params = [Type::Record(product_type())];
    let bindings = Bindings::from([100]);

    let cases: &[(&str, &str)] = &[
        ("member", "Price"),
        ("predicate", "Price > @0 && Stock.HasValue"),
        ("projection", "new (Id, Name.ToUpper() as Upper, Price * 2 as Double)"),
        ("coalesce", "(Stock ?? 0) * Price"),
    ];
    for (name, text) in cases {
        group.bench_function(*name, |b| {
            b.iter(|| black_box(compile_lambda(black_box(text), &params, &bindings)))
        });
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    let source = products(100);

    group.bench_function("where", |b| {
        b.iter(|| black_box(source.filter(black_box("Price > 100"), ())))
    });
    group.bench_function("order_then_by", |b| {
        b.iter(|| {
            black_box(
                source
                    .order_by("Category", ())
                    .and_then(|q| q.then_by_descending("Price", ())),
            )
        })
    });
    group.bench_function("group_by_result", |b| {
        b.iter(|| {
            black_box(source.group_by_result("Category", "(k, ps) => ps.Sum(p => p.Price)", ()))
        })
    });
    group.finish();
}

fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute");

    for n in [100usize, 1_000, 10_000] {
        let source = products(n);
        let filtered = source.filter("Price > 100 && Stock.HasValue", ()).unwrap();
        let ordered = source
            .order_by("Category", ())
            .and_then(|q| q.then_by_descending("Price", ()))
            .unwrap();

        group.bench_with_input(BenchmarkId::new("where", n), &filtered, |b, q| {
            b.iter(|| black_box(q.to_vec()))
        });
        group.bench_with_input(BenchmarkId::new("order_then_by", n), &ordered, |b, q| {
            b.iter(|| black_box(q.to_vec()))
        });
        group.bench_with_input(BenchmarkId::new("sum", n), &source, |b, q| {
            b.iter(|| black_box(q.sum("Price", ())))
        });
        group.bench_with_input(BenchmarkId::new("count", n), &source, |b, q| {
            b.iter(|| black_box(q.count("Stock > 10", ())))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_build, bench_execute);
criterion_main!(benches);
