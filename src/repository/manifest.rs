use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

use super::{
    AssetObject, BuildScene, ContentRepository, LoadedAsset, ObjectData, StorageSizeLookup,
};
use crate::errors::AnalysisError;

/// On-disk shape of a repository snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub folders: Vec<String>,
    #[serde(default)]
    pub assets: Vec<ManifestAsset>,
    #[serde(default)]
    pub build_scenes: Vec<BuildScene>,
    /// Whether object storage sizes can be reported.
    #[serde(default = "yes")]
    pub storage_sizes: bool,
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestAsset {
    pub path: String,
    #[serde(default)]
    pub main: Option<AssetObject>,
    #[serde(default)]
    pub subs: Vec<AssetObject>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// [`ContentRepository`] over an in-memory [`Manifest`].
#[derive(Debug, Clone, Default)]
pub struct ManifestRepository {
    manifest: Manifest,
    index: HashMap<String, usize>,
    folders: HashSet<String>,
}

impl ManifestRepository {
    /// Index a manifest. Duplicate asset paths keep their first entry.
    #[must_use]
    pub fn from_manifest(mut manifest: Manifest) -> Self {
        let mut index = HashMap::new();
        let mut kept = Vec::with_capacity(manifest.assets.len());
        for mut asset in std::mem::take(&mut manifest.assets) {
            if index.contains_key(&asset.path) {
                tracing::warn!(path = %asset.path, "duplicate manifest entry dropped");
                continue;
            }
            for obj in asset.main.iter_mut().chain(asset.subs.iter_mut()) {
                if let ObjectData::Hierarchy(h) = &mut obj.data {
                    h.link_children();
                }
            }
            index.insert(asset.path.clone(), kept.len());
            kept.push(asset);
        }
        manifest.assets = kept;
        let folders = manifest.folders.iter().cloned().collect();
        Self { manifest, index, folders }
    }

    /// Parse a manifest from JSON text.
    ///
    /// # Errors
    /// Returns `AnalysisError::Manifest` when the text is not a valid manifest.
    pub fn from_json_str(data: &str, origin: &Path) -> Result<Self, AnalysisError> {
        let manifest: Manifest = serde_json::from_str(data)
            .map_err(|source| AnalysisError::Manifest { path: origin.to_path_buf(), source })?;
        Ok(Self::from_manifest(manifest))
    }

    /// Read and parse a manifest file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_json(path: &Path) -> Result<Self, AnalysisError> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data, path)
    }

    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn asset(&self, path: &str) -> Option<&ManifestAsset> {
        self.index.get(path).and_then(|&i| self.manifest.assets.get(i))
    }
}

impl ContentRepository for ManifestRepository {
    fn list_all_paths(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.manifest.folders.len() + self.manifest.assets.len());
        out.extend(self.manifest.folders.iter().cloned());
        out.extend(self.manifest.assets.iter().map(|a| a.path.clone()));
        out
    }

    fn is_folder(&self, path: &str) -> bool {
        self.folders.contains(path)
    }

    fn load_main_and_sub_objects(&self, path: &str) -> Option<LoadedAsset> {
        let asset = self.asset(path)?;
        Some(LoadedAsset { main: asset.main.clone(), subs: asset.subs.clone() })
    }

    fn direct_dependencies(&self, path: &str) -> BTreeSet<String> {
        self.asset(path).map(|a| a.dependencies.iter().cloned().collect()).unwrap_or_default()
    }

    fn build_scenes(&self) -> Vec<BuildScene> {
        self.manifest.build_scenes.clone()
    }

    fn storage_sizes(&self) -> Option<&dyn StorageSizeLookup> {
        if self.manifest.storage_sizes {
            Some(self)
        } else {
            None
        }
    }
}

impl StorageSizeLookup for ManifestRepository {
    fn storage_size(&self, object: &AssetObject) -> u64 {
        match object.data {
            ObjectData::Texture { storage_size: Some(size), .. } => size,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{FieldValue, NodeId, ObjectHandle, ObjectType};

    const SAMPLE: &str = r#"{
        "folders": ["Assets", "Assets/Prefabs"],
        "assets": [
            {"path": "Assets/A.png",
             "main": {"handle": 1, "name": "A", "type": "Texture2D",
                      "data": {"kind": "texture", "width": 64, "height": 64, "storage_size": 4096}}},
            {"path": "Assets/Prefabs/P.prefab",
             "main": {"handle": 2, "name": "P", "type": "GameObject",
                      "data": {"kind": "hierarchy", "nodes": [
                          {"name": "P"},
                          {"name": "Child", "parent": 0, "components": [
                              {"type_name": "SpriteRenderer", "fields": [
                                  {"property_path": "m_Sprite", "value": {"type": "object_reference", "value": 1}}
                              ]}
                          ]}
                      ]}},
             "dependencies": ["Assets/A.png"]},
            {"path": "Assets/A.png"}
        ],
        "build_scenes": [{"path": "Assets/Main.unity"}]
    }"#;

    #[test]
    fn parses_and_indexes_manifest() {
        let repo = ManifestRepository::from_json_str(SAMPLE, Path::new("repo.json")).unwrap();
        assert_eq!(
            repo.list_all_paths(),
            vec!["Assets", "Assets/Prefabs", "Assets/A.png", "Assets/Prefabs/P.prefab"]
        );
        assert!(repo.is_folder("Assets/Prefabs"));
        assert!(!repo.is_folder("Assets/A.png"));
        let deps = repo.direct_dependencies("Assets/Prefabs/P.prefab");
        assert!(deps.contains("Assets/A.png"));
        assert!(repo.direct_dependencies("Assets/Missing.mat").is_empty());
        assert_eq!(repo.build_scenes()[0].path, "Assets/Main.unity");
        assert!(repo.build_scenes()[0].enabled);
    }

    #[test]
    fn duplicate_paths_keep_first_entry() {
        let repo = ManifestRepository::from_json_str(SAMPLE, Path::new("repo.json")).unwrap();
        let loaded = repo.load_main_and_sub_objects("Assets/A.png").unwrap();
        let main = loaded.main.unwrap();
        assert_eq!(main.object_type, ObjectType::Texture2D);
        assert_eq!(repo.storage_sizes().unwrap().storage_size(&main), 4096);
    }

    #[test]
    fn hierarchy_children_are_linked_on_load() {
        let repo = ManifestRepository::from_json_str(SAMPLE, Path::new("repo.json")).unwrap();
        let loaded = repo.load_main_and_sub_objects("Assets/Prefabs/P.prefab").unwrap();
        let main = loaded.main.unwrap();
        let h = main.hierarchy().unwrap();
        assert_eq!(h.nodes[0].children, vec![NodeId(1)]);
        let field = &h.nodes[1].components[0].fields[0];
        assert_eq!(field.value, FieldValue::ObjectReference(Some(ObjectHandle(1))));
    }

    #[test]
    fn malformed_manifest_reports_origin() {
        let err = ManifestRepository::from_json_str("{\"assets\": 3}", Path::new("bad.json"))
            .unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn storage_capability_can_be_disabled() {
        let repo = ManifestRepository::from_json_str(
            r#"{"storage_sizes": false}"#,
            Path::new("repo.json"),
        )
        .unwrap();
        assert!(repo.storage_sizes().is_none());
    }
}
