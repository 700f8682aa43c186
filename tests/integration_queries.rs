use asset_relations_explorer::describe::AssetDescriber;
use asset_relations_explorer::graph::{Analysis, BatchInclusion, InclusionAnalyzer, ScanRules};
use asset_relations_explorer::progress::{Checkpoint, NullProgress, ProgressSink};
use asset_relations_explorer::query::{
    AssetUsagesQuery, FilterQuery, PrefabReferencesQuery, Query, ReferencedByQuery, Session,
};
use asset_relations_explorer::repository::ManifestRepository;
use asset_relations_explorer::utils::prefs::{InclusionFilter, Preferences};
use std::path::Path;

const SMALL: &str = r#"{
    "assets": [
        {"path": "Assets/A.tex",
         "main": {"handle": 1, "name": "A", "type": "Texture2D",
                  "data": {"kind": "texture", "width": 64, "height": 64}}},
        {"path": "Assets/M.mat",
         "main": {"handle": 2, "name": "M", "type": "Material",
                  "data": {"kind": "material", "shader": "Standard"}},
         "dependencies": ["Assets/A.tex"]},
        {"path": "Assets/P.prefab",
         "main": {"handle": 3, "name": "P", "type": "GameObject",
                  "data": {"kind": "hierarchy", "nodes": [
                      {"name": "Root", "components": [
                          {"type_name": "Holder", "fields": [
                              {"property_path": "m_Material", "value": {"type": "object_reference", "value": 2}}
                          ]}
                      ]}
                  ]}},
         "dependencies": ["Assets/M.mat"]},
        {"path": "Assets/Main.unity",
         "main": {"handle": 4, "name": "Main", "type": "SceneAsset"},
         "dependencies": ["Assets/P.prefab"]}
    ],
    "build_scenes": [{"path": "Assets/Main.unity", "enabled": ENABLED}]
}"#;

fn analyse(json: &str) -> Analysis {
    let repo = ManifestRepository::from_json_str(json, Path::new("repo.json")).unwrap();
    Analysis::build(&repo, &ScanRules::default(), &AssetDescriber::default(), &mut NullProgress)
        .unwrap()
}

fn small(scene_enabled: bool) -> Analysis {
    analyse(&SMALL.replace("ENABLED", if scene_enabled { "true" } else { "false" }))
}

fn sample() -> Analysis {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sample_repo.json");
    let repo = ManifestRepository::load_json(&path).unwrap();
    Analysis::build(&repo, &ScanRules::default(), &AssetDescriber::default(), &mut NullProgress)
        .unwrap()
}

#[test]
fn prefab_material_texture_end_to_end() {
    let a = small(true);
    let tex = a.assets.id_of("Assets/A.tex").unwrap();
    let mat = a.assets.id_of("Assets/M.mat").unwrap();
    let prefab = a.assets.id_of("Assets/P.prefab").unwrap();

    assert_eq!(a.references.forward_records().len(), 1);
    let fwd = a.references.forward(prefab).unwrap();
    assert_eq!(fwd.nodes.len(), 1);
    assert_eq!(&*fwd.nodes[0].hierarchy_path, "Root");
    assert_eq!(fwd.nodes[0].components.len(), 1);
    let props = &fwd.nodes[0].components[0].properties;
    assert_eq!(props.len(), 1);
    assert_eq!(props[0].target, mat);

    let rev = a.references.reverse(mat).unwrap();
    assert_eq!(rev.referenced_by.len(), 1);
    assert_eq!(rev.referenced_by[0].root, prefab);
    assert!(a.references.reverse(tex).unwrap().referenced_by.is_empty());

    assert_eq!(a.usages.usages(mat), &[prefab]);
    assert_eq!(a.usages.usages(tex), &[mat]);
    assert!(a.usages.is_included(mat));
    assert!(a.usages.is_included(tex));
}

#[test]
fn disabled_build_scene_includes_nothing() {
    let a = small(false);
    let analyzer = InclusionAnalyzer::new(&a.usages);
    for node in a.assets.iter() {
        assert!(!analyzer.is_included(node.id), "{} should not be included", node.path);
    }
}

#[test]
fn forward_and_reverse_edges_mirror_each_other() {
    let a = sample();
    let mut fwd = a.references.forward_edges();
    let mut rev = a.references.reverse_edges();
    fwd.sort();
    rev.sort();
    assert_eq!(fwd, rev);
    for record in a.references.forward_records() {
        let from_reverse: usize = a
            .references
            .reverse_records()
            .iter()
            .flat_map(|r| r.referenced_by.iter())
            .filter(|g| g.root == record.root)
            .map(|g| g.nodes.iter().map(|n| n.property_count()).sum::<usize>())
            .sum();
        assert_eq!(record.edge_count(), from_reverse);
    }
}

#[test]
fn batch_inclusion_agrees_with_single_queries() {
    let a = sample();
    let single = InclusionAnalyzer::new(&a.usages);
    let mut batch = BatchInclusion::new(&a.usages);
    for node in a.assets.iter() {
        assert_eq!(batch.is_included(node.id), single.is_included(node.id), "{}", node.path);
    }
    let included = |p: &str| single.is_included(a.assets.id_of(p).unwrap());
    assert!(included("Assets/Textures/A.png"));
    assert!(included("Assets/Scripts/Player.cs"));
    assert!(!included("Assets/Prefabs/Wall.prefab"));
    assert!(!included("Assets/Meshes/Quad.asset"));
    assert!(!included("Assets/Textures/Unused.png"));
}

#[test]
fn texture_type_restriction_excludes_materials() {
    let a = sample();
    let filter = FilterQuery::parse("t:texture").unwrap();
    let view = AssetUsagesQuery::new(&filter).run(&a);
    let paths: Vec<_> =
        view.entries.iter().map(|e| a.assets.get(e.asset).unwrap().path.as_str()).collect();
    assert_eq!(paths, vec!["Assets/Textures/A.png", "Assets/Textures/Unused.png"]);
}

#[test]
fn references_and_referenced_by_follow_filters() {
    let a = sample();
    let all = FilterQuery::default();
    assert_eq!(PrefabReferencesQuery::new(&all).run(&a).len(), 2);

    let wall = FilterQuery::parse("wall").unwrap();
    let view = PrefabReferencesQuery::new(&wall).run(&a);
    assert_eq!(view.entries, vec![a.assets.id_of("Assets/Prefabs/Wall.prefab").unwrap()]);
    // MeshFilter -> Quad, MeshRenderer -> M
    assert_eq!(view.layout.total_rows(), 2);

    let by = ReferencedByQuery::new(&all).run(&a);
    let mat = a.assets.id_of("Assets/Materials/M.mat").unwrap();
    let quad = a.assets.id_of("Assets/Meshes/Quad.asset").unwrap();
    assert_eq!(by.entries, vec![mat, quad]);
    assert_eq!(a.references.reverse(mat).unwrap().referenced_by.len(), 2);
}

#[test]
fn session_filter_reset_and_preferences() {
    let mut s = Session::new(sample(), Preferences::default());
    assert_eq!(s.usages().len(), 8);
    assert!(s.set_filter_string("t:texture"));
    assert_eq!(s.usages().len(), 2);
    assert!(s.set_filter_string(""));
    assert!(s.filter().is_unrestricted());
    assert_eq!(s.usages().len(), 8);
    let before = s.recomputations();
    assert!(!s.set_filter_string(""));
    let _ = s.usages();
    assert_eq!(s.recomputations(), before);

    s.set_preferences(Preferences { inclusion: InclusionFilter::ExcludedOnly, ..Preferences::default() });
    let excluded: Vec<_> = s.usages().entries.iter().map(|e| e.asset).collect();
    let names: Vec<_> = excluded
        .iter()
        .map(|id| s.analysis().assets.get(*id).unwrap().path.clone())
        .collect();
    assert_eq!(
        names,
        vec!["Assets/Meshes/Quad.asset", "Assets/Prefabs/Wall.prefab", "Assets/Textures/Unused.png"]
    );
}

#[test]
fn density_grades_wall_quad() {
    let mut s = Session::new(sample(), Preferences::default());
    let view = s.density(&mut NullProgress).unwrap().clone();
    assert_eq!(view.len(), 1);
    let report = &s.density_reports()[view.entries[0]];
    assert_eq!(report.root, s.analysis().assets.id_of("Assets/Prefabs/Wall.prefab").unwrap());
    let tex = &report.renderers[0].materials[0].textures[0];
    assert_eq!(tex.size, Some((64, 64)));
    let dpx = tex.dpx.unwrap();
    // unit quad with 0..1 UVs: one UV per meter, times the 64x64 diagonal
    assert!((dpx.avg - 90.50967).abs() < 1e-2);
}

#[derive(Default)]
struct Recorder {
    seen: Vec<(String, f32)>,
}

impl ProgressSink for Recorder {
    fn report(&mut self, stage: &str, _message: &str, fraction: f32) -> Checkpoint {
        self.seen.push((stage.to_string(), fraction));
        Checkpoint::Continue
    }

    fn clear(&mut self) {}
}

#[test]
fn build_progress_never_moves_backwards() {
    let json = SMALL.replace("ENABLED", "true");
    let repo = ManifestRepository::from_json_str(&json, Path::new("repo.json")).unwrap();
    let mut rec = Recorder::default();
    Analysis::build(&repo, &ScanRules::default(), &AssetDescriber::default(), &mut rec).unwrap();

    let stages: Vec<&str> = rec.seen.iter().map(|(s, _)| s.as_str()).collect();
    for stage in ["collect", "invert", "describe", "references"] {
        assert!(stages.contains(&stage), "missing stage {stage}");
    }
    assert!(rec.seen.iter().all(|(_, f)| (0.0..=1.0).contains(f)));
    for w in rec.seen.windows(2) {
        assert!(w[0].1 <= w[1].1, "{:?} then {:?}", w[0], w[1]);
    }
}
