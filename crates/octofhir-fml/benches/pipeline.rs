//! Whole-pipeline benchmarks using divan

use octofhir_fml::{
    AnalysisOptions, ModelRegistry, NoopTerminology, TransformOptions, analyse, parse, render,
    transform_source,
};
use serde_json::json;

fn main() {
    divan::main();
}

/// A map with `groups` chained copy groups
fn chained_map(groups: usize) -> String {
    let mut source = String::from("map \"http://example.org/StructureMap/chain\" = \"Chain\"\n\n");
    for i in 0..groups {
        source.push_str(&format!("group G{i}(source src, target tgt) {{\n"));
        source.push_str("  src.id as id -> tgt.id = id;\n");
        source.push_str("  src.name as n -> tgt.name = n;\n");
        if i + 1 < groups {
            source.push_str(&format!("  src.child as c -> tgt.child as t then G{}(c, t);\n", i + 1));
        }
        source.push_str("}\n\n");
    }
    source
}

#[divan::bench(args = [1, 10, 50])]
fn parse_and_render(bencher: divan::Bencher, groups: usize) {
    let source = chained_map(groups);
    bencher.bench_local(|| parse(divan::black_box(&source)).map(|map| render(&map).len()));
}

#[divan::bench(args = [1, 10, 50])]
fn parse_and_analyse(bencher: divan::Bencher, groups: usize) {
    let source = chained_map(groups);
    let registry = ModelRegistry::new();
    bencher.bench_local(|| {
        parse(divan::black_box(&source))
            .map(|map| analyse(&map, &registry, &AnalysisOptions::default()).profiles.len())
    });
}

#[divan::bench]
fn parse_and_transform(bencher: divan::Bencher) {
    let source = chained_map(3);
    let registry = ModelRegistry::new();
    let input = json!({
        "id": "a",
        "name": "first",
        "child": {"id": "b", "name": "second", "child": {"id": "c", "name": "third"}}
    });
    bencher.bench_local(|| {
        transform_source(
            divan::black_box(&source),
            &input,
            &registry,
            &NoopTerminology,
            &TransformOptions::default(),
        )
        .map(|outputs| outputs.len())
    });
}
