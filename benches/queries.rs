use asset_relations_explorer::describe::AssetDescriber;
use asset_relations_explorer::graph::{Analysis, BatchInclusion, InclusionAnalyzer, ScanRules};
use asset_relations_explorer::progress::NullProgress;
use asset_relations_explorer::query::{
    AssetUsagesQuery, FilterQuery, PrefabReferencesQuery, Query, ReferencedByQuery,
};
use asset_relations_explorer::repository::ManifestRepository;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::Path;

mod common;

fn analysis_once() -> Analysis {
    let data = common::synthetic_manifest(1000);
    let repo = ManifestRepository::from_json_str(&data, Path::new("bench.json")).expect("manifest");
    Analysis::build(&repo, &ScanRules::default(), &AssetDescriber::default(), &mut NullProgress)
        .expect("analysis")
}

fn bench_queries(c: &mut Criterion) {
    // Setup outside of iter
    let analysis = analysis_once();
    let mut group = c.benchmark_group("queries");

    for expr in ["", "t:texture", "P1 mat:M3", "tex:T7"] {
        let filter = FilterQuery::parse(expr).expect("filter");
        let label = if expr.is_empty() { "unfiltered" } else { expr };
        group.bench_function(BenchmarkId::new("usages", label), |b| {
            b.iter(|| black_box(AssetUsagesQuery::new(&filter).run(black_box(&analysis)).len()))
        });
        group.bench_function(BenchmarkId::new("prefab_references", label), |b| {
            b.iter(|| black_box(PrefabReferencesQuery::new(&filter).run(black_box(&analysis)).len()))
        });
        group.bench_function(BenchmarkId::new("referenced_by", label), |b| {
            b.iter(|| black_box(ReferencedByQuery::new(&filter).run(black_box(&analysis)).len()))
        });
    }

    group.bench_function(BenchmarkId::new("inclusion", "single"), |b| {
        b.iter(|| {
            let a = InclusionAnalyzer::new(&analysis.usages);
            black_box(analysis.assets.iter().filter(|n| a.is_included(n.id)).count())
        })
    });
    group.bench_function(BenchmarkId::new("inclusion", "batch"), |b| {
        b.iter(|| {
            let mut a = BatchInclusion::new(&analysis.usages);
            black_box(analysis.assets.iter().filter(|n| a.is_included(n.id)).count())
        })
    });

    group.finish();
}

criterion_group!(name = benches; config = Criterion::default(); targets = bench_queries);
criterion_main!(benches);
