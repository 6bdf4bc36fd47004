//! Criterion benchmarks for schema synthesis and content extraction.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure the two hot paths: reducing a catalogue into
//! schema versions (once per catalogue push) and materializing content
//! trees (once per request, many items per batch).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::collections::BTreeMap;

use block_model::core::block_type::BlockTypeDefinition;
use block_model::core::ContentId;
use block_model::markup::{Document, Selector};
use block_model::parse::{DelimiterParser, MarkupParser};
use block_model::schema::versions::reduce;
use block_model::{BlockTypeRegistry, ExtractionEngine};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn definition(value: serde_json::Value) -> BlockTypeDefinition {
    serde_json::from_value(value).unwrap()
}

/// A catalogue in the shape clients actually push: a handful of sourced
/// attributes per type, some with deprecation history.
fn make_catalogue(types: usize) -> Vec<BlockTypeDefinition> {
    (0..types)
        .map(|i| {
            definition(json!({
                "name": format!("bench/type-{i}"),
                "attributes": {
                    "content": { "type": "string", "source": "html", "selector": "p" },
                    "align": { "type": "string", "default": "left" },
                    "level": { "type": "integer" }
                },
                "deprecated": [
                    { "attributes": {
                        "content": { "type": "string", "source": "html", "selector": "p" },
                        "align": { "type": "string" },
                        "level": { "type": "string" }
                    } }
                ]
            }))
        })
        .collect()
}

fn make_markup(blocks: usize) -> String {
    (0..blocks)
        .map(|i| {
            format!(
                "<!-- wp:bench/type-{} {{\"level\":{}}} -->\n<div><p>paragraph {} with <em>markup</em></p></div>\n<!-- /wp:bench/type-{} -->\n",
                i % 8, i % 5, i, i % 8
            )
        })
        .collect()
}

fn make_engine() -> ExtractionEngine {
    let registry = BlockTypeRegistry::new();
    registry.set(make_catalogue(8));
    ExtractionEngine::new(registry)
}

// ---------------------------------------------------------------------------
// Schema reduction
// ---------------------------------------------------------------------------

fn bench_reduce_single(c: &mut Criterion) {
    let block = definition(json!({
        "name": "bench/quote",
        "attributes": {
            "value": { "type": "string", "source": "html", "selector": "blockquote", "multiline": "p" },
            "citation": { "type": "string", "source": "html", "selector": "cite" }
        },
        "deprecated": [
            { "attributes": { "value": { "type": "string" }, "citation": { "type": "string", "default": "" } } },
            { "attributes": { "value": { "type": "string" } } }
        ]
    }));

    c.bench_function("reduce_single_type", |b| {
        b.iter(|| black_box(reduce(&block)));
    });
}

fn bench_catalogue_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalogue_push");

    for types in [10, 100, 500] {
        let catalogue = make_catalogue(types);
        group.bench_with_input(
            BenchmarkId::from_parameter(types),
            &catalogue,
            |b, catalogue| {
                b.iter(|| {
                    let registry = BlockTypeRegistry::new();
                    registry.set(catalogue.clone());
                    black_box(registry.get().unwrap().len())
                });
            },
        );
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Markup parsing
// ---------------------------------------------------------------------------

fn bench_delimiter_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("delimiter_parse");
    let parser = DelimiterParser::new();

    for blocks in [10, 100, 1_000] {
        let markup = make_markup(blocks);
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &markup, |b, markup| {
            b.iter(|| black_box(parser.parse(markup).unwrap().len()));
        });
    }
    group.finish();
}

fn bench_fragment_select(c: &mut Criterion) {
    let source: String = (0..50)
        .map(|i| format!("<li class=\"item\"><figure><img src=\"{i}.png\" alt=\"shot {i}\"/></figure></li>"))
        .collect();
    let source = format!("<ul class=\"gallery\">{source}</ul>");
    let selector = Selector::parse("li.item img").unwrap();

    c.bench_function("fragment_parse_and_select_50", |b| {
        b.iter(|| {
            let document = Document::parse(&source);
            black_box(document.select(&selector).len())
        });
    });
}

// ---------------------------------------------------------------------------
// End-to-end extraction
// ---------------------------------------------------------------------------

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    let engine = make_engine();

    for blocks in [10, 100, 500] {
        let markup = make_markup(blocks);
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &markup, |b, markup| {
            b.iter(|| {
                black_box(
                    engine
                        .extract(ContentId(1), markup)
                        .unwrap()
                        .blocks
                        .len(),
                )
            });
        });
    }
    group.finish();
}

fn bench_extract_batch(c: &mut Criterion) {
    let engine = make_engine();
    let items: BTreeMap<ContentId, String> = (0..50)
        .map(|i| (ContentId(i), make_markup(10)))
        .collect();

    c.bench_function("extract_batch_50x10", |b| {
        b.iter(|| black_box(engine.extract_batch(&items).len()));
    });
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

criterion_group!(
    schema_benches,
    bench_reduce_single,
    bench_catalogue_push,
);

criterion_group!(
    parse_benches,
    bench_delimiter_parse,
    bench_fragment_select,
);

criterion_group!(
    extract_benches,
    bench_extract,
    bench_extract_batch,
);

criterion_main!(schema_benches, parse_benches, extract_benches);
