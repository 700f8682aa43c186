use asset_relations_explorer::describe::AssetDescriber;
use asset_relations_explorer::graph::{Analysis, ScanRules};
use asset_relations_explorer::progress::NullProgress;
use asset_relations_explorer::repository::ManifestRepository;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::Path;

mod common;

fn bench_build_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_graph");
    for size in [100usize, 1000] {
        let data = common::synthetic_manifest(size);
        let repo = ManifestRepository::from_json_str(&data, Path::new("bench.json")).expect("manifest");
        let rules = ScanRules::default();
        group.bench_function(BenchmarkId::new("analysis", size), |b| {
            b.iter(|| {
                let analysis = Analysis::build(
                    black_box(&repo),
                    &rules,
                    &AssetDescriber::default(),
                    &mut NullProgress,
                )
                .expect("analysis");
                black_box(analysis.references.forward_records().len())
            })
        });
    }
    group.finish();
}

criterion_group!(name = benches; config = Criterion::default(); targets = bench_build_graph);
criterion_main!(benches);
