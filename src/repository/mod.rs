//! Content repository access.
//!
//! The analyzer never talks to an engine directly. Everything it needs is
//! pulled through [`ContentRepository`]: path enumeration, folder tests,
//! object loading and one-level dependency sets. The object model below is
//! the minimal serializable view of loaded objects the builders, the
//! descriptor and the density assessment consume.
//!
//! [`ManifestRepository`] is a JSON-backed implementation used by the CLI,
//! the tests and the benches.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub mod manifest;

pub use manifest::{Manifest, ManifestAsset, ManifestRepository};

/// Stable opaque handle assigned to an object when it is loaded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ObjectHandle(pub u64);

/// Concrete type of a loaded object.
///
/// Types form a single-inheritance chain rooted at [`ObjectType::Object`];
/// see [`ObjectType::parent`]. Names that are not recognised are kept
/// verbatim in [`ObjectType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ObjectType {
    Object,
    Texture,
    Texture2D,
    Cubemap,
    RenderTexture,
    Sprite,
    SpriteAtlas,
    Material,
    Shader,
    Mesh,
    AnimationClip,
    AudioClip,
    AudioMixer,
    Avatar,
    RuntimeAnimatorController,
    AnimatorController,
    GameObject,
    PhysicMaterial,
    PhysicsMaterial2D,
    SceneAsset,
    TextAsset,
    MonoScript,
    Other(String),
}

impl ObjectType {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ObjectType::Object => "Object",
            ObjectType::Texture => "Texture",
            ObjectType::Texture2D => "Texture2D",
            ObjectType::Cubemap => "Cubemap",
            ObjectType::RenderTexture => "RenderTexture",
            ObjectType::Sprite => "Sprite",
            ObjectType::SpriteAtlas => "SpriteAtlas",
            ObjectType::Material => "Material",
            ObjectType::Shader => "Shader",
            ObjectType::Mesh => "Mesh",
            ObjectType::AnimationClip => "AnimationClip",
            ObjectType::AudioClip => "AudioClip",
            ObjectType::AudioMixer => "AudioMixer",
            ObjectType::Avatar => "Avatar",
            ObjectType::RuntimeAnimatorController => "RuntimeAnimatorController",
            ObjectType::AnimatorController => "AnimatorController",
            ObjectType::GameObject => "GameObject",
            ObjectType::PhysicMaterial => "PhysicMaterial",
            ObjectType::PhysicsMaterial2D => "PhysicsMaterial2D",
            ObjectType::SceneAsset => "SceneAsset",
            ObjectType::TextAsset => "TextAsset",
            ObjectType::MonoScript => "MonoScript",
            ObjectType::Other(name) => name.as_str(),
        }
    }

    /// Direct supertype, `None` only for [`ObjectType::Object`].
    #[must_use]
    pub fn parent(&self) -> Option<ObjectType> {
        match self {
            ObjectType::Object => None,
            ObjectType::Texture2D | ObjectType::Cubemap | ObjectType::RenderTexture => {
                Some(ObjectType::Texture)
            }
            ObjectType::MonoScript => Some(ObjectType::TextAsset),
            ObjectType::AnimatorController => Some(ObjectType::RuntimeAnimatorController),
            _ => Some(ObjectType::Object),
        }
    }

    /// True when `self` equals `other` or is a strict subtype of it.
    #[must_use]
    pub fn is_a(&self, other: &ObjectType) -> bool {
        let mut cur = Some(self.clone());
        while let Some(t) = cur {
            if &t == other {
                return true;
            }
            cur = t.parent();
        }
        false
    }
}

impl From<String> for ObjectType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Object" => ObjectType::Object,
            "Texture" => ObjectType::Texture,
            "Texture2D" => ObjectType::Texture2D,
            "Cubemap" => ObjectType::Cubemap,
            "RenderTexture" => ObjectType::RenderTexture,
            "Sprite" => ObjectType::Sprite,
            "SpriteAtlas" => ObjectType::SpriteAtlas,
            "Material" => ObjectType::Material,
            "Shader" => ObjectType::Shader,
            "Mesh" => ObjectType::Mesh,
            "AnimationClip" => ObjectType::AnimationClip,
            "AudioClip" => ObjectType::AudioClip,
            "AudioMixer" => ObjectType::AudioMixer,
            "Avatar" => ObjectType::Avatar,
            "RuntimeAnimatorController" => ObjectType::RuntimeAnimatorController,
            "AnimatorController" => ObjectType::AnimatorController,
            "GameObject" => ObjectType::GameObject,
            "PhysicMaterial" => ObjectType::PhysicMaterial,
            "PhysicsMaterial2D" => ObjectType::PhysicsMaterial2D,
            "SceneAsset" => ObjectType::SceneAsset,
            "TextAsset" => ObjectType::TextAsset,
            "MonoScript" => ObjectType::MonoScript,
            _ => ObjectType::Other(s),
        }
    }
}

impl From<ObjectType> for String {
    fn from(t: ObjectType) -> Self {
        match t {
            ObjectType::Other(name) => name,
            other => other.name().to_string(),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A loaded object: the main object of an asset or one of its sub-objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetObject {
    pub handle: ObjectHandle,
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    #[serde(default)]
    pub data: ObjectData,
}

impl AssetObject {
    #[must_use]
    pub fn hierarchy(&self) -> Option<&Hierarchy> {
        match &self.data {
            ObjectData::Hierarchy(h) => Some(h),
            _ => None,
        }
    }
}

/// Type-specific payload of a loaded object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectData {
    #[default]
    None,
    Texture {
        width: u32,
        height: u32,
        #[serde(default = "one")]
        mip_count: u32,
        /// Storage size in bytes when the environment can report it.
        #[serde(default)]
        storage_size: Option<u64>,
    },
    Sprite {
        rect_width: f32,
        rect_height: f32,
        texture_width: u32,
        texture_height: u32,
    },
    Mesh(MeshData),
    AnimationClip {
        length: f32,
        #[serde(default = "default_wrap_mode")]
        wrap_mode: String,
        #[serde(default)]
        curve_count: usize,
        #[serde(default)]
        legacy: bool,
    },
    AudioClip {
        length: f32,
        frequency: u32,
        channels: u32,
        #[serde(default = "default_compression")]
        compression: String,
    },
    Material {
        shader: String,
    },
    Hierarchy(Hierarchy),
}

fn one() -> u32 {
    1
}

fn default_wrap_mode() -> String {
    "Default".to_string()
}

fn default_compression() -> String {
    "Vorbis".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<[f32; 3]>,
    /// Up to eight UV channels; a channel counts when it has one entry per vertex.
    #[serde(default)]
    pub uv_channels: Vec<Vec<[f32; 2]>>,
    #[serde(default)]
    pub color_count: usize,
    #[serde(default)]
    pub bone_weight_count: usize,
    /// Triangle index lists, one per sub-mesh.
    #[serde(default)]
    pub submeshes: Vec<Vec<u32>>,
}

/// Index of a node inside a [`Hierarchy`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// Node tree of a container root. Node 0 is the root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hierarchy {
    pub nodes: Vec<HierarchyNode>,
}

impl Hierarchy {
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(NodeId(0))
        }
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&HierarchyNode> {
        self.nodes.get(id.0)
    }

    /// Rebuild child lists from parent links, in node order.
    ///
    /// Parent links are authoritative; links that point outside the arena or
    /// at the node itself are cut.
    pub fn link_children(&mut self) {
        let len = self.nodes.len();
        for n in &mut self.nodes {
            n.children.clear();
        }
        for i in 0..len {
            let parent = match self.nodes[i].parent {
                Some(p) if p.0 < len && p.0 != i => p,
                Some(_) => {
                    self.nodes[i].parent = None;
                    continue;
                }
                None => continue,
            };
            self.nodes[parent.0].children.push(NodeId(i));
        }
    }

    /// Whether the node and all of its ancestors are active.
    #[must_use]
    pub fn is_active_in_hierarchy(&self, id: NodeId) -> bool {
        let mut cur = Some(id);
        let mut steps = 0usize;
        while let Some(n) = cur.and_then(|c| self.node(c)) {
            if !n.active {
                return false;
            }
            steps += 1;
            if steps > self.nodes.len() {
                break;
            }
            cur = n.parent;
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub name: String,
    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default = "active_default")]
    pub active: bool,
    #[serde(default)]
    pub transform: Transform,
}

fn active_default() -> bool {
    true
}

/// Local-to-world affine transform, three rows of a 4x4 matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transform(pub [[f32; 4]; 3]);

impl Default for Transform {
    fn default() -> Self {
        Transform([[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]])
    }
}

impl Transform {
    #[must_use]
    pub fn transform_point(&self, p: [f32; 3]) -> [f32; 3] {
        let m = &self.0;
        [
            m[0][0] * p[0] + m[0][1] * p[1] + m[0][2] * p[2] + m[0][3],
            m[1][0] * p[0] + m[1][1] * p[1] + m[1][2] * p[2] + m[1][3],
            m[2][0] * p[0] + m[2][1] * p[1] + m[2][2] * p[2] + m[2][3],
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub type_name: String,
    #[serde(default)]
    pub fields: Vec<SerializedField>,
}

impl Component {
    /// First object reference stored under `property_path`.
    #[must_use]
    pub fn object_reference(&self, property_path: &str) -> Option<ObjectHandle> {
        self.fields.iter().find(|f| f.property_path == property_path).and_then(|f| match f.value {
            FieldValue::ObjectReference(h) => h,
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedField {
    pub property_path: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    ObjectReference(Option<ObjectHandle>),
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Every object stored at one path, main object first.
#[derive(Debug, Clone)]
pub struct LoadedAsset {
    pub main: Option<AssetObject>,
    pub subs: Vec<AssetObject>,
}

/// One entry of the build configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildScene {
    pub path: String,
    #[serde(default = "active_default")]
    pub enabled: bool,
}

/// Optional environment capability: storage size of a loaded object.
pub trait StorageSizeLookup {
    fn storage_size(&self, object: &AssetObject) -> u64;
}

/// Read access to a content repository.
pub trait ContentRepository {
    /// Every known path, folders included, in enumeration order.
    fn list_all_paths(&self) -> Vec<String>;

    fn is_folder(&self, path: &str) -> bool;

    /// Main object and secondary representations stored at `path`.
    fn load_main_and_sub_objects(&self, path: &str) -> Option<LoadedAsset>;

    /// One-level dependency set of the asset at `path`.
    fn direct_dependencies(&self, path: &str) -> BTreeSet<String>;

    fn stable_handle(&self, object: &AssetObject) -> ObjectHandle {
        object.handle
    }

    /// Scenes listed in the build configuration, in build order.
    fn build_scenes(&self) -> Vec<BuildScene>;

    /// Storage-size capability, checked once by the caller.
    fn storage_sizes(&self) -> Option<&dyn StorageSizeLookup> {
        None
    }
}
