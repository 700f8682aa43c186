//! Repository-level usage graph: who uses each asset, and build inclusion.
use serde::Serialize;

use super::{AssetId, AssetTable, ObjectSlot};
use crate::describe::{Describe, Descriptor};
use crate::errors::AnalysisError;
use crate::progress::{checkpoint, ratio, within, ProgressSink, DESCRIBE_SPAN, INVERT_SPAN};
use crate::repository::{ContentRepository, ObjectType};

pub(crate) const STAGE_INVERT: &str = "invert";
pub(crate) const STAGE_DESCRIBE: &str = "describe";

/// Why an asset is, or is not, part of a build by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionReason {
    BuildScene,
    AlwaysIncludedLocation,
    BinaryModule,
    Script,
    NotIncluded,
}

impl InclusionReason {
    #[must_use]
    pub fn is_explicit(self) -> bool {
        !matches!(self, InclusionReason::NotIncluded)
    }
}

/// One representation of an asset with its descriptor.
#[derive(Debug, Clone)]
pub struct SubAsset {
    pub slot: ObjectSlot,
    pub descriptor: Descriptor,
}

/// Inverted one-level dependency graph over an [`AssetTable`].
#[derive(Debug, Clone, Default)]
pub struct UsageGraph {
    usages: Vec<Vec<AssetId>>,
    dependencies: Vec<Vec<AssetId>>,
    sub_assets: Vec<Vec<SubAsset>>,
    explicit: Vec<bool>,
}

impl UsageGraph {
    /// Invert direct dependencies and describe every asset's representations.
    ///
    /// Reports the `invert` (0.3 to 0.6) and `describe` (0.6 to 0.7) stages
    /// and clears the sink when done.
    ///
    /// # Errors
    /// Returns `AnalysisError::Cancelled` when the progress sink cancels.
    pub fn build(
        repo: &dyn ContentRepository,
        table: &AssetTable,
        describer: &dyn Describe,
        progress: &mut dyn ProgressSink,
    ) -> Result<Self, AnalysisError> {
        let n = table.len();
        let mut graph = Self {
            usages: vec![Vec::new(); n],
            dependencies: vec![Vec::new(); n],
            sub_assets: Vec::with_capacity(n),
            explicit: table.iter().map(super::AssetNode::explicitly_included).collect(),
        };

        for (i, node) in table.iter().enumerate() {
            checkpoint(
                progress,
                STAGE_INVERT,
                &format!("Step 2 ({} / {}) {}", i + 1, n, node.path),
                within(INVERT_SPAN, ratio(i, n)),
            )?;
            for dep in repo.direct_dependencies(&node.path) {
                let Some(target) = table.id_of(&dep) else {
                    continue;
                };
                if target == node.id {
                    continue;
                }
                graph.dependencies[node.id.0].push(target);
                graph.usages[target.0].push(node.id);
            }
        }

        for (i, node) in table.iter().enumerate() {
            checkpoint(
                progress,
                STAGE_DESCRIBE,
                &format!("Step 3 ({} / {}) {}", i + 1, n, node.path),
                within(DESCRIBE_SPAN, ratio(i, n)),
            )?;
            let tolerant = graph.usages[i].iter().any(|u| {
                table.get(*u).and_then(|a| a.concrete_type()) == Some(&ObjectType::SpriteAtlas)
            });
            let mut subs = vec![SubAsset {
                slot: ObjectSlot::Main,
                descriptor: node
                    .main
                    .as_ref()
                    .map(|m| describer.describe(m, tolerant))
                    .unwrap_or_default(),
            }];
            if !node.is_scene && !node.is_container() {
                subs.extend(node.subs.iter().enumerate().map(|(si, obj)| SubAsset {
                    slot: ObjectSlot::Sub(si),
                    descriptor: describer.describe(obj, tolerant),
                }));
            }
            graph.sub_assets.push(subs);
        }
        progress.clear();
        Ok(graph)
    }

    /// Graph from explicit flags and `(user, used)` edges, without descriptors.
    ///
    /// Edges pointing outside `explicit`, self-edges and repeats are ignored.
    #[must_use]
    pub fn from_edges(explicit: Vec<bool>, edges: &[(AssetId, AssetId)]) -> Self {
        let n = explicit.len();
        let mut graph = Self {
            usages: vec![Vec::new(); n],
            dependencies: vec![Vec::new(); n],
            sub_assets: vec![Vec::new(); n],
            explicit,
        };
        for &(user, used) in edges {
            if user.0 >= n || used.0 >= n || user == used || graph.dependencies[user.0].contains(&used)
            {
                continue;
            }
            graph.dependencies[user.0].push(used);
            graph.usages[used.0].push(user);
        }
        graph
    }

    /// Assets whose direct dependencies contain `id`.
    #[must_use]
    pub fn usages(&self, id: AssetId) -> &[AssetId] {
        self.usages.get(id.0).map_or(&[], Vec::as_slice)
    }

    /// Direct dependencies of `id` that are in the table.
    #[must_use]
    pub fn dependencies(&self, id: AssetId) -> &[AssetId] {
        self.dependencies.get(id.0).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn sub_assets(&self, id: AssetId) -> &[SubAsset] {
        self.sub_assets.get(id.0).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn is_explicitly_included(&self, id: AssetId) -> bool {
        self.explicit.get(id.0).copied().unwrap_or(false)
    }

    /// Transitive build inclusion; see [`super::InclusionAnalyzer`].
    #[must_use]
    pub fn is_included(&self, id: AssetId) -> bool {
        super::InclusionAnalyzer::new(self).is_included(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.explicit.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.explicit.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::AssetDescriber;
    use crate::graph::test_support::*;
    use crate::graph::ScanRules;
    use crate::progress::NullProgress;
    use crate::repository::{AssetObject, ManifestAsset, ObjectData, ObjectHandle};

    fn sprite(handle: u64, texture_width: u32) -> AssetObject {
        AssetObject {
            handle: ObjectHandle(handle),
            name: "s".into(),
            object_type: ObjectType::Sprite,
            data: ObjectData::Sprite {
                rect_width: 8.0,
                rect_height: 8.0,
                texture_width,
                texture_height: 64,
            },
        }
    }

    fn build(assets: Vec<ManifestAsset>) -> (AssetTable, UsageGraph) {
        let repo = repo(assets);
        let table = AssetTable::collect(&repo, &ScanRules::default(), &mut NullProgress).unwrap();
        let graph =
            UsageGraph::build(&repo, &table, &AssetDescriber::default(), &mut NullProgress).unwrap();
        (table, graph)
    }

    #[test]
    fn inverts_dependencies_in_user_order() {
        let (table, graph) = build(vec![
            asset("Assets/T.png", texture(1, "T", 4, 4), &[]),
            asset("Assets/M2.mat", object(3, "M2", ObjectType::Material), &["Assets/T.png"]),
            asset(
                "Assets/M1.mat",
                object(2, "M1", ObjectType::Material),
                &["Assets/T.png", "Assets/M1.mat", "Assets/Gone.png", "Packages/x.png"],
            ),
        ]);
        let t = table.id_of("Assets/T.png").unwrap();
        let m1 = table.id_of("Assets/M1.mat").unwrap();
        let m2 = table.id_of("Assets/M2.mat").unwrap();
        assert_eq!(graph.usages(t), &[m2, m1]);
        assert!(graph.usages(m1).is_empty());
        assert_eq!(graph.dependencies(m1), &[t]);
    }

    #[test]
    fn atlas_users_make_sprite_descriptors_tolerant() {
        let mut strict = asset("Assets/A.png", texture(1, "A", 100, 64), &[]);
        strict.subs.push(sprite(2, 100));
        let mut packed = asset("Assets/B.png", texture(3, "B", 100, 64), &[]);
        packed.subs.push(sprite(4, 100));
        let atlas = asset(
            "Assets/Atlas.spriteatlas",
            object(5, "Atlas", ObjectType::SpriteAtlas),
            &["Assets/B.png"],
        );
        let (table, graph) = build(vec![strict, packed, atlas]);

        let a = graph.sub_assets(table.id_of("Assets/A.png").unwrap());
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].slot, ObjectSlot::Main);
        assert!(a[1].descriptor.warning);
        let b = graph.sub_assets(table.id_of("Assets/B.png").unwrap());
        assert!(!b[1].descriptor.warning);
    }

    #[test]
    fn containers_and_scenes_list_main_only() {
        let mut p = asset("Assets/P.prefab", prefab(1, "P", vec![node("P", None, vec![])]), &[]);
        p.subs.push(object(2, "Mesh", ObjectType::Mesh));
        let mut s = asset("Assets/S.unity", object(3, "S", ObjectType::SceneAsset), &[]);
        s.subs.push(object(4, "Extra", ObjectType::Object));
        let (table, graph) = build(vec![p, s]);
        assert_eq!(graph.sub_assets(table.id_of("Assets/P.prefab").unwrap()).len(), 1);
        assert_eq!(graph.sub_assets(table.id_of("Assets/S.unity").unwrap()).len(), 1);
    }

    #[test]
    fn from_edges_ignores_self_and_repeat_edges() {
        let g = UsageGraph::from_edges(
            vec![false, true],
            &[(AssetId(0), AssetId(1)), (AssetId(0), AssetId(1)), (AssetId(1), AssetId(1)), (AssetId(0), AssetId(7))],
        );
        assert_eq!(g.usages(AssetId(1)), &[AssetId(0)]);
        assert!(g.usages(AssetId(0)).is_empty());
        assert!(g.usages(AssetId(9)).is_empty());
    }
}
