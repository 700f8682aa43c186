//! Asset graphs for a content repository.
//!
//! This module defines the asset table shared by every analysis
//! (`AssetTable`, `AssetNode`, `AssetId`) and the `Analysis` bundle that
//! owns the two graphs built from it:
//!
//! - `references`: which container roots reference which assets, located
//!   down to hierarchy node, component and property;
//! - `usage`: inverted one-level dependencies plus build-inclusion flags,
//!   queried by `reachability`.
//!
//! You typically construct an `Analysis` via [`Analysis::build`] and then
//! pass it to the views in `crate::query`.
use regex::Regex;
use std::collections::HashMap;

use crate::describe::Describe;
use crate::errors::AnalysisError;
use crate::progress::{checkpoint, ratio, within, ProgressSink, COLLECT_SPAN};
use crate::repository::{AssetObject, BuildScene, ContentRepository, ObjectHandle, ObjectType};
use crate::utils::config::AnalysisConfig;

pub mod reachability;
pub mod references;
pub mod usage;

pub use reachability::{BatchInclusion, InclusionAnalyzer};
pub use references::{
    ComponentReferences, ForwardRecord, NodeReferences, PropertyReference, ReferenceGraph,
    ReferencedBy, ReverseRecord,
};
pub use usage::{InclusionReason, SubAsset, UsageGraph};

pub(crate) const STAGE_COLLECT: &str = "collect";

/// Dense index of an asset inside one [`AssetTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct AssetId(pub usize);

/// Position of an object inside its asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectSlot {
    Main,
    Sub(usize),
}

#[derive(Debug, Clone)]
pub struct AssetNode {
    pub id: AssetId,
    pub path: String,
    pub main: Option<AssetObject>,
    pub subs: Vec<AssetObject>,
    pub is_scene: bool,
    pub inclusion: InclusionReason,
}

impl AssetNode {
    #[must_use]
    pub fn explicitly_included(&self) -> bool {
        self.inclusion.is_explicit()
    }

    /// Concrete type of the main object, if one loaded.
    #[must_use]
    pub fn concrete_type(&self) -> Option<&ObjectType> {
        self.main.as_ref().map(|m| &m.object_type)
    }

    /// Whether the main object carries a node hierarchy.
    #[must_use]
    pub fn is_container(&self) -> bool {
        self.main.as_ref().and_then(AssetObject::hierarchy).is_some()
    }

    #[must_use]
    pub fn object(&self, slot: ObjectSlot) -> Option<&AssetObject> {
        match slot {
            ObjectSlot::Main => self.main.as_ref(),
            ObjectSlot::Sub(i) => self.subs.get(i),
        }
    }

    /// Main object first, then every secondary representation.
    pub fn objects(&self) -> impl Iterator<Item = &AssetObject> {
        self.main.iter().chain(self.subs.iter())
    }

    /// File name without directories.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Path-unique set of assets under the managed root.
#[derive(Debug, Clone, Default)]
pub struct AssetTable {
    nodes: Vec<AssetNode>,
    by_path: HashMap<String, AssetId>,
    identity: HashMap<ObjectHandle, (AssetId, ObjectSlot)>,
}

impl AssetTable {
    /// Enumerate, load and classify every asset the rules select.
    ///
    /// Reports the `collect` stage (fractions 0.0 to 0.3 of the whole build).
    ///
    /// # Errors
    /// Returns `AnalysisError::Cancelled` when the progress sink cancels.
    pub fn collect(
        repo: &dyn ContentRepository,
        rules: &ScanRules,
        progress: &mut dyn ProgressSink,
    ) -> Result<Self, AnalysisError> {
        let scenes = repo.build_scenes();
        let paths = repo.list_all_paths();
        let total = paths.len();
        let mut table = Self::default();
        for (i, path) in paths.iter().enumerate() {
            checkpoint(
                progress,
                STAGE_COLLECT,
                &format!("Step 1 ({} / {}) {}", i + 1, total, path),
                within(COLLECT_SPAN, ratio(i, total)),
            )?;
            if !rules.is_managed(path) || repo.is_folder(path) {
                continue;
            }
            let (main, subs) = match repo.load_main_and_sub_objects(path) {
                Some(loaded) => (loaded.main, loaded.subs),
                None => (None, Vec::new()),
            };
            let inclusion = rules.classify(path, main.as_ref(), &scenes);
            let is_scene = rules.is_scene(path);
            table.insert(repo, path, main, subs, is_scene, inclusion);
        }
        tracing::debug!(assets = table.len(), "asset table collected");
        Ok(table)
    }

    /// Add an asset; a path already present keeps its existing entry.
    pub fn insert(
        &mut self,
        repo: &dyn ContentRepository,
        path: &str,
        main: Option<AssetObject>,
        subs: Vec<AssetObject>,
        is_scene: bool,
        inclusion: InclusionReason,
    ) -> AssetId {
        if let Some(&id) = self.by_path.get(path) {
            return id;
        }
        let id = AssetId(self.nodes.len());
        if !is_scene {
            if let Some(m) = &main {
                self.identity.entry(repo.stable_handle(m)).or_insert((id, ObjectSlot::Main));
            }
            for (i, s) in subs.iter().enumerate() {
                self.identity.entry(repo.stable_handle(s)).or_insert((id, ObjectSlot::Sub(i)));
            }
        }
        self.by_path.insert(path.to_string(), id);
        self.nodes.push(AssetNode { id, path: path.to_string(), main, subs, is_scene, inclusion });
        id
    }

    #[must_use]
    pub fn get(&self, id: AssetId) -> Option<&AssetNode> {
        self.nodes.get(id.0)
    }

    #[must_use]
    pub fn id_of(&self, path: &str) -> Option<AssetId> {
        self.by_path.get(path).copied()
    }

    #[must_use]
    pub fn by_path(&self, path: &str) -> Option<&AssetNode> {
        self.id_of(path).and_then(|id| self.get(id))
    }

    /// Owning asset and object of a handle; scene contents are not indexed.
    #[must_use]
    pub fn resolve(&self, handle: ObjectHandle) -> Option<(AssetId, &AssetObject)> {
        let &(id, slot) = self.identity.get(&handle)?;
        self.get(id).and_then(|n| n.object(slot)).map(|o| (id, o))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetNode> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Which paths are analysed and which are always part of a build.
#[derive(Debug, Clone)]
pub struct ScanRules {
    managed_root: String,
    scene_suffix: String,
    always_included: Vec<Regex>,
    binary_modules: Regex,
}

impl Default for ScanRules {
    fn default() -> Self {
        Self {
            managed_root: "Assets/".to_string(),
            scene_suffix: ".unity".to_string(),
            always_included: vec![
                Regex::new("/Resources/").expect("literal pattern"),
                Regex::new("/Plugins/").expect("literal pattern"),
            ],
            binary_modules: Regex::new(r"(?i)\.dll$").expect("literal pattern"),
        }
    }
}

impl ScanRules {
    /// Build rules from the `[analysis]` config table, defaults for unset keys.
    ///
    /// # Errors
    /// Returns `AnalysisError::Config` if a pattern is not a valid regex.
    pub fn from_config(cfg: Option<&AnalysisConfig>) -> Result<Self, AnalysisError> {
        let mut rules = Self::default();
        let Some(cfg) = cfg else {
            return Ok(rules);
        };
        if let Some(root) = &cfg.managed_root {
            rules.managed_root = if root.ends_with('/') { root.clone() } else { format!("{root}/") };
        }
        if let Some(suffix) = &cfg.scene_suffix {
            rules.scene_suffix = suffix.clone();
        }
        if let Some(patterns) = &cfg.always_included {
            rules.always_included = patterns
                .iter()
                .map(|p| compile(p, "always_included"))
                .collect::<Result<_, _>>()?;
        }
        if let Some(p) = &cfg.binary_modules {
            rules.binary_modules = compile(p, "binary_modules")?;
        }
        Ok(rules)
    }

    #[must_use]
    pub fn managed_root(&self) -> &str {
        &self.managed_root
    }

    #[must_use]
    pub fn is_managed(&self, path: &str) -> bool {
        path.starts_with(&self.managed_root)
    }

    #[must_use]
    pub fn is_scene(&self, path: &str) -> bool {
        path.len() >= self.scene_suffix.len()
            && path.is_char_boundary(path.len() - self.scene_suffix.len())
            && path[path.len() - self.scene_suffix.len()..].eq_ignore_ascii_case(&self.scene_suffix)
    }

    /// Classify build inclusion in fixed priority order.
    ///
    /// A scene is included only when it is listed and enabled; the location
    /// rules do not apply to scenes.
    #[must_use]
    pub fn classify(
        &self,
        path: &str,
        main: Option<&AssetObject>,
        scenes: &[BuildScene],
    ) -> InclusionReason {
        if self.is_scene(path) {
            return if scenes.iter().any(|s| s.enabled && s.path == path) {
                InclusionReason::BuildScene
            } else {
                InclusionReason::NotIncluded
            };
        }
        if self.always_included.iter().any(|r| r.is_match(path)) {
            InclusionReason::AlwaysIncludedLocation
        } else if self.binary_modules.is_match(path) {
            InclusionReason::BinaryModule
        } else if main.is_some_and(|m| m.object_type == ObjectType::MonoScript) {
            InclusionReason::Script
        } else {
            InclusionReason::NotIncluded
        }
    }
}

fn compile(pattern: &str, key: &str) -> Result<Regex, AnalysisError> {
    Regex::new(pattern).map_err(|e| AnalysisError::Config(format!("{key}: {e}")))
}

/// Both graphs built from one repository snapshot.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub assets: AssetTable,
    pub usages: UsageGraph,
    pub references: ReferenceGraph,
}

impl Analysis {
    /// Collect the asset table and build the usage and reference graphs.
    ///
    /// # Errors
    /// Returns `AnalysisError::Cancelled` when the progress sink cancels.
    pub fn build(
        repo: &dyn ContentRepository,
        rules: &ScanRules,
        describer: &dyn Describe,
        progress: &mut dyn ProgressSink,
    ) -> Result<Self, AnalysisError> {
        let assets = AssetTable::collect(repo, rules, progress)?;
        let usages = UsageGraph::build(repo, &assets, describer, progress)?;
        let references = ReferenceGraph::build(&assets, describer, progress)?;
        tracing::debug!(
            assets = assets.len(),
            containers = references.forward_records().len(),
            "analysis built"
        );
        Ok(Self { assets, usages, references })
    }
}
