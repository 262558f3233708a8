//! Benchmarks for ripple-engine.
//!
//! Target: a single source mutation through a small pipeline well under the
//! cost of recompiling the query.

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ripple_core::Value;
use ripple_engine::{watch_collection, watch_scalar, Expr, OperationContext, SourceOperation};
use ripple_reactive::{ObservableCollection, ObservableVec};

fn ctx_with_source(size: usize) -> (Rc<ObservableVec<Value>>, Rc<OperationContext>) {
    let items = (0..size as i64).map(Value::Int).collect();
    let vec = Rc::new(ObservableVec::from_items(items));
    let node = SourceOperation::new(vec.clone());
    let ctx = OperationContext::with_variable(&OperationContext::root(), "s", node);
    (vec, ctx)
}

fn pipeline_expr() -> Expr {
    Expr::var("s")
        .where_("x", Expr::var("x").gt(Expr::constant(10)))
        .select("x", Expr::var("x").mul(Expr::constant(2)))
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    for size in [10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("where_select", size),
            &size,
            |b, &size| {
                let (_vec, ctx) = ctx_with_source(size);
                let expr = pipeline_expr();
                b.iter(|| {
                    let view = watch_collection(black_box(&expr), &ctx).unwrap();
                    view.dispose();
                })
            },
        );
    }

    group.finish();
}

fn bench_mutation_cascade(c: &mut Criterion) {
    let mut group = c.benchmark_group("cascade");

    for size in [10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("push_pop_where_select", size),
            &size,
            |b, &size| {
                let (vec, ctx) = ctx_with_source(size);
                let view = watch_collection(&pipeline_expr(), &ctx).unwrap();
                b.iter(|| {
                    vec.push(Value::Int(black_box(999)));
                    vec.remove_at(vec.len() - 1);
                });
                view.dispose();
            },
        );
    }

    group.finish();
}

fn bench_aggregate_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("sum_push_pop", size), &size, |b, &size| {
            let (vec, ctx) = ctx_with_source(size);
            let view = watch_scalar(&Expr::var("s").sum(), &ctx).unwrap();
            b.iter(|| {
                vec.push(Value::Int(black_box(7)));
                vec.remove_at(vec.len() - 1);
                black_box(view.current().unwrap());
            });
            view.dispose();
        });

        group.bench_with_input(BenchmarkId::new("min_push_pop", size), &size, |b, &size| {
            let (vec, ctx) = ctx_with_source(size);
            let view = watch_scalar(&Expr::var("s").min(), &ctx).unwrap();
            b.iter(|| {
                vec.push(Value::Int(black_box(-1)));
                vec.remove_at(vec.len() - 1);
                black_box(view.current().unwrap());
            });
            view.dispose();
        });
    }

    group.finish();
}

fn bench_order_by_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_by");

    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("insert_middle", size), &size, |b, &size| {
            let (vec, ctx) = ctx_with_source(size);
            let view =
                watch_collection(&Expr::var("s").order_by("x", Expr::var("x")), &ctx).unwrap();
            b.iter(|| {
                vec.push(Value::Int(black_box(size as i64 / 2)));
                vec.remove_at(vec.len() - 1);
            });
            view.dispose();
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("buffered_view", size), &size, |b, &size| {
            let (_vec, ctx) = ctx_with_source(size);
            let view = watch_collection(&pipeline_expr(), &ctx).unwrap();
            b.iter(|| black_box(view.snapshot()));
            view.dispose();
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compile,
    bench_mutation_cascade,
    bench_aggregate_update,
    bench_order_by_insert,
    bench_snapshot,
);
criterion_main!(benches);
