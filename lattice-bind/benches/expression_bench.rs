//! Benchmark: Expressions and Notification
//!
//! Measures tokenizing, compiling, evaluating and change propagation.
//! Run: cargo bench --bench expression_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lattice_bind::expr::tokenize;
use lattice_bind::{ContextManager, ListenerOptions, Parser, RuntimeConfig, Uid, Value};
use serde_json::json;

const SIMPLE: &str = "user.name";
const MIXED: &str = "a.b + c[d] * 2";
const TEMPLATE: &str = "items.length > 0 ? items[0].title + ' (' + items.length + ')' : 'empty'";

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");

    for (name, source) in [("simple", SIMPLE), ("mixed", MIXED), ("template", TEMPLATE)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let tokens = tokenize(black_box(source)).unwrap();
                black_box(tokens)
            });
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    // Every iteration compiles from scratch
    let uncached = Parser::with_config(&RuntimeConfig {
        cache_expressions: false,
        ..RuntimeConfig::default()
    });
    group.bench_function("cold", |b| {
        b.iter(|| black_box(uncached.parse(black_box(TEMPLATE))));
    });

    let cached = Parser::new();
    cached.parse(TEMPLATE);
    group.bench_function("cached", |b| {
        b.iter(|| black_box(cached.parse(black_box(TEMPLATE))));
    });

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    let parser = Parser::new();
    let ctx = Value::from(json!({
        "a": {"b": 1},
        "c": {"x": 3},
        "d": "x",
        "items": [{"title": "first"}, {"title": "second"}]
    }));

    for (name, source) in [("mixed", MIXED), ("template", TEMPLATE), ("constant", "[1, 2, 3].length * 10")] {
        let parsed = parser.parse(source);
        group.bench_function(name, |b| {
            b.iter(|| black_box(parsed.evaluate_in(black_box(&ctx))));
        });
    }

    group.finish();
}

/// One write fanned out to observed descendants
fn bench_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation");

    let root = Value::from(json!({"model": {"a": 1, "b": 2, "c": {"d": 3}}}));
    let manager = ContextManager::new(root.clone());
    let uid = Uid::new();
    for path in ["model.a", "model.b", "model.c.d"] {
        manager.observe(path, ListenerOptions::new(uid), |new, _| {
            black_box(new);
        });
    }
    let Some(holder) = root.as_object().cloned() else {
        return;
    };

    let mut n = 0;
    group.bench_function("replace_parent", |b| {
        b.iter(|| {
            n += 1;
            holder.set("model", Value::from(json!({"a": n, "b": 2, "c": {"d": n}})));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_tokenize, bench_parse, bench_evaluate, bench_propagation);
criterion_main!(benches);
