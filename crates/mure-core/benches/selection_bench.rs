//! # Selection Benchmarks
//!
//! Performance benchmarks for standardization, selector resolution and
//! linking.
//!
//! Run with: `cargo bench -p mure-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use mure_core::{
    Direction, DocumentStore, Item, ItemPath, MemoryStore, Selection, SelectionContext,
    StandardizeOptions, graph, standardize_document,
};
use serde_json::{Map, Value, json};
use std::hint::black_box;

/// A document whose `contents.rows` holds `size` small records.
fn wide_document(size: usize) -> Value {
    let rows: Vec<Value> = (0..size)
        .map(|i| json!({ "name": format!("row {i}"), "value": i, "tags": ["a", "b"] }))
        .collect();
    json!({ "_id": "application/json;bench.json", "contents": { "rows": rows } })
}

fn store_with(size: usize) -> MemoryStore {
    let mut store = MemoryStore::new();
    let doc = standardize_document(wide_document(size), &store, StandardizeOptions::default())
        .expect("standardize");
    store.put(&doc).expect("put");
    store
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_standardize(c: &mut Criterion) {
    let mut group = c.benchmark_group("standardize");
    let store = MemoryStore::new();

    for size in [100, 1000].iter() {
        let raw = wide_document(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &raw, |b, raw| {
            b.iter(|| {
                black_box(standardize_document(
                    raw.clone(),
                    &store,
                    StandardizeOptions { aggressive: true },
                ))
            });
        });
    }

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    for size in [100, 1000].iter() {
        let store = store_with(*size);
        let wildcard = Selection::parse(
            r#"@{"_id":"application/json;bench.json"}$.contents.rows[*].name"#,
            SelectionContext::None,
        )
        .expect("selector");
        let descent = Selection::parse("@$..value", SelectionContext::None).expect("selector");

        group.bench_with_input(BenchmarkId::new("wildcard", size), &wildcard, |b, sel| {
            b.iter(|| black_box(sel.items(&store, None)));
        });
        group.bench_with_input(BenchmarkId::new("descent", size), &descent, |b, sel| {
            b.iter(|| black_box(sel.items(&store, None)));
        });
    }

    group.finish();
}

fn bench_link_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("link_chain");

    for size in [50, 200].iter() {
        let contents: Map<String, Value> = (0..*size).map(|i| (format!("n{i}"), json!({}))).collect();
        let doc = standardize_document(
            json!({ "_id": "application/json;chain.json", "contents": contents }),
            &MemoryStore::new(),
            StandardizeOptions::default(),
        )
        .expect("standardize");

        group.bench_with_input(BenchmarkId::from_parameter(size), &doc, |b, doc| {
            b.iter(|| {
                let mut doc = doc.clone();
                let id = doc.id().clone();
                let nodes: Vec<Item> = (0..*size)
                    .map(|i| {
                        Item::infer(&doc, &id, ItemPath::from_keys(["contents".to_string(), format!("n{i}")]))
                            .expect("item")
                    })
                    .collect();
                for pair in nodes.windows(2) {
                    let _ = graph::link_to(&mut doc, &pair[0], &pair[1], None, Direction::Source);
                }
                black_box(doc)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_standardize, bench_resolve, bench_link_chain);
criterion_main!(benches);
