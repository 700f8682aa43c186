//! Filter evaluation.
//!
//! A [`FilterQuery`] holds the keyword buckets of a parsed filter string.
//! The *primary* subject of a result entry is matched against the default
//! bucket and the type restrictions; *associated* objects (users,
//! referenced objects) are matched against the bucket of their own kind.
//! An entry passes when every restricted kind is satisfied by at least one
//! associated object, see [`GroupScan`].
use serde::Serialize;
use std::collections::BTreeMap;

use crate::errors::FilterParseError;
use crate::graph::AssetNode;
use crate::parser::{Category, FilterParser, Keyword};
use crate::repository::{AssetObject, ObjectType};

/// Closed set of object kinds that keyword categories refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AssetKind {
    AnimationClip,
    AudioClip,
    AudioMixer,
    Avatar,
    Controller,
    GameObject,
    Material,
    Mesh,
    PhysicMaterial,
    PhysicMaterial2D,
    Scene,
    Script,
    Shader,
    Sprite,
    SpriteAtlas,
    TextAsset,
    Texture,
}

impl AssetKind {
    /// Kind of an object type; `None` for types no category covers.
    ///
    /// Checked in a fixed order so `MonoScript` is a script before it is a
    /// text asset.
    #[must_use]
    pub fn of(t: &ObjectType) -> Option<Self> {
        const ORDER: [(ObjectType, AssetKind); 17] = [
            (ObjectType::AnimationClip, AssetKind::AnimationClip),
            (ObjectType::AudioClip, AssetKind::AudioClip),
            (ObjectType::AudioMixer, AssetKind::AudioMixer),
            (ObjectType::Avatar, AssetKind::Avatar),
            (ObjectType::AnimatorController, AssetKind::Controller),
            (ObjectType::GameObject, AssetKind::GameObject),
            (ObjectType::Material, AssetKind::Material),
            (ObjectType::Mesh, AssetKind::Mesh),
            (ObjectType::PhysicMaterial, AssetKind::PhysicMaterial),
            (ObjectType::PhysicsMaterial2D, AssetKind::PhysicMaterial2D),
            (ObjectType::SceneAsset, AssetKind::Scene),
            (ObjectType::MonoScript, AssetKind::Script),
            (ObjectType::Shader, AssetKind::Shader),
            (ObjectType::Sprite, AssetKind::Sprite),
            (ObjectType::SpriteAtlas, AssetKind::SpriteAtlas),
            (ObjectType::TextAsset, AssetKind::TextAsset),
            (ObjectType::Texture, AssetKind::Texture),
        ];
        ORDER.iter().find(|(ty, _)| t.is_a(ty)).map(|(_, k)| *k)
    }
}

/// Concrete type named by a `t:` keyword, matched case-insensitively.
#[must_use]
pub fn resolve_type_alias(alias: &str) -> Option<ObjectType> {
    let t = match alias.to_lowercase().as_str() {
        "anim" | "animationclip" => ObjectType::AnimationClip,
        "audio" | "audioclip" => ObjectType::AudioClip,
        "audiomixer" => ObjectType::AudioMixer,
        "avatar" => ObjectType::Avatar,
        "controller" | "animatorcontroller" => ObjectType::AnimatorController,
        "prefab" | "gameobject" => ObjectType::GameObject,
        "mat" | "material" => ObjectType::Material,
        "mesh" => ObjectType::Mesh,
        "scene" => ObjectType::SceneAsset,
        "phymat" | "physicmat" | "physicsmat" | "physicmaterial" | "physicsmaterial" => {
            ObjectType::PhysicMaterial
        }
        "phymat2d" | "physicmat2d" | "physiscmat2d" | "physicmaterial2d" | "physicsmaterial2d" => {
            ObjectType::PhysicsMaterial2D
        }
        "script" | "mono" | "monoscript" => ObjectType::MonoScript,
        "shader" => ObjectType::Shader,
        "sprite" => ObjectType::Sprite,
        "atlas" | "spriteatlas" => ObjectType::SpriteAtlas,
        "text" | "textasset" => ObjectType::TextAsset,
        "tex" | "texture" => ObjectType::Texture,
        "tex2d" | "texture2d" => ObjectType::Texture2D,
        _ => return None,
    };
    Some(t)
}

/// An object as seen by the filter: its asset path (or name) and type.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub path: &'a str,
    pub name: &'a str,
    pub object_type: &'a ObjectType,
}

impl<'a> Candidate<'a> {
    #[must_use]
    pub fn new(asset: &'a AssetNode, object: &'a AssetObject) -> Self {
        Self { path: &asset.path, name: &object.name, object_type: &object.object_type }
    }

    fn content(&self) -> &'a str {
        if self.path.is_empty() {
            self.name
        } else {
            self.path
        }
    }
}

/// Parsed filter: keyword buckets and resolved type restrictions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterQuery {
    default: Vec<String>,
    types: Vec<String>,
    kinds: BTreeMap<AssetKind, Vec<String>>,
    type_restrictions: Vec<ObjectType>,
}

impl FilterQuery {
    /// Parse a filter string.
    ///
    /// # Errors
    /// Returns `FilterParseError` for malformed input.
    pub fn parse(input: &str) -> Result<Self, FilterParseError> {
        FilterParser::new().parse(input).map(Self::from_keywords)
    }

    #[must_use]
    pub fn from_keywords(keywords: Vec<Keyword>) -> Self {
        let mut q = Self::default();
        for k in keywords {
            match k.category {
                Category::Default => q.default.push(k.text),
                Category::Types => {
                    if let Some(t) = resolve_type_alias(&k.text) {
                        q.type_restrictions.push(t);
                    }
                    q.types.push(k.text);
                }
                Category::Kind(kind) => q.kinds.entry(kind).or_default().push(k.text),
            }
        }
        q
    }

    /// True when the filter accepts everything.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.default.is_empty() && self.type_restrictions.is_empty() && self.kinds.is_empty()
    }

    #[must_use]
    pub fn keywords(&self, category: Category) -> &[String] {
        match category {
            Category::Default => &self.default,
            Category::Types => &self.types,
            Category::Kind(k) => self.kinds.get(&k).map_or(&[], Vec::as_slice),
        }
    }

    #[must_use]
    pub fn is_restricted(&self, kind: AssetKind) -> bool {
        self.kinds.contains_key(&kind)
    }

    /// Kinds with at least one keyword, in declaration order.
    #[must_use]
    pub fn restricted_kinds(&self) -> Vec<AssetKind> {
        self.kinds.keys().copied().collect()
    }

    #[must_use]
    pub fn type_restrictions(&self) -> &[ObjectType] {
        &self.type_restrictions
    }

    /// Match the primary subject of an entry. A missing object passes.
    #[must_use]
    pub fn matches_primary(&self, candidate: Option<&Candidate<'_>>) -> bool {
        let Some(c) = candidate else {
            return true;
        };
        if !self.type_restrictions.is_empty()
            && !self.type_restrictions.iter().any(|t| c.object_type.is_a(t))
        {
            return false;
        }
        contains_any(c.content(), &self.default, true)
    }

    /// Match an associated object against the bucket of its own kind.
    ///
    /// Objects of no known kind, or whose kind has no keywords, pass; a
    /// missing object fails.
    #[must_use]
    pub fn matches_associated(&self, candidate: Option<&Candidate<'_>>) -> bool {
        let Some(c) = candidate else {
            return false;
        };
        match AssetKind::of(c.object_type) {
            None => true,
            Some(kind) => contains_any(c.content(), self.keywords(Category::Kind(kind)), true),
        }
    }

    #[must_use]
    pub fn group_scan(&self) -> GroupScan<'_> {
        GroupScan { filter: self, pending: self.restricted_kinds() }
    }
}

fn contains_any(content: &str, keywords: &[String], empty_pass: bool) -> bool {
    if keywords.is_empty() {
        return empty_pass;
    }
    let haystack = content.to_lowercase();
    keywords.iter().any(|k| haystack.contains(&k.to_lowercase()))
}

/// Folds associated objects into "every restricted kind has a match".
#[derive(Debug, Clone)]
pub struct GroupScan<'f> {
    filter: &'f FilterQuery,
    pending: Vec<AssetKind>,
}

impl GroupScan<'_> {
    /// Account for one associated object. Missing objects satisfy nothing.
    pub fn observe(&mut self, candidate: Option<&Candidate<'_>>) {
        let Some(c) = candidate else {
            return;
        };
        let Some(kind) = AssetKind::of(c.object_type) else {
            return;
        };
        let Some(pos) = self.pending.iter().position(|k| *k == kind) else {
            return;
        };
        if self.filter.matches_associated(Some(c)) {
            self.pending.swap_remove(pos);
        }
    }

    /// Every restricted kind has been satisfied (vacuously true when none).
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.pending.is_empty()
    }
}

/// The current filter string and what it parsed to.
///
/// A string that fails to parse leaves an unrestricted filter behind and
/// keeps the error for the caller to show.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    text: String,
    query: FilterQuery,
    error: Option<FilterParseError>,
}

impl FilterState {
    /// Replace the filter string. Returns whether results must be recomputed;
    /// setting the same string again returns `false`.
    pub fn set_filter_string(&mut self, text: &str) -> bool {
        if self.text == text {
            return false;
        }
        self.text = text.to_string();
        match FilterQuery::parse(text) {
            Ok(q) => {
                self.query = q;
                self.error = None;
            }
            Err(e) => {
                tracing::error!("{e}");
                self.query = FilterQuery::default();
                self.error = Some(e);
            }
        }
        true
    }

    #[must_use]
    pub fn filter_string(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn query(&self) -> &FilterQuery {
        &self.query
    }

    #[must_use]
    pub fn error(&self) -> Option<&FilterParseError> {
        self.error.as_ref()
    }
}
