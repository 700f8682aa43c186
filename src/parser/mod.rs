//! Filter expression parser.
//!
//! A filter is a whitespace-separated list of keywords. A keyword may be
//! prefixed with `category:` to land in that category's bucket instead of
//! the default one; the prefix applies to the next keyword only. `\`
//! escapes a space, a tab or another backslash inside a keyword.
use crate::errors::FilterParseError;
use crate::query::filter::AssetKind;

/// Bucket a keyword is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Default,
    /// `t:` / `type:` keywords naming object types.
    Types,
    Kind(AssetKind),
}

impl Category {
    /// Category for a prefix as typed; prefixes are case-sensitive.
    #[must_use]
    pub fn from_alias(alias: &str) -> Option<Self> {
        let kind = match alias {
            "t" | "type" => return Some(Category::Types),
            "anim" | "animationclip" => AssetKind::AnimationClip,
            "audio" | "audioclip" => AssetKind::AudioClip,
            "audiomixer" => AssetKind::AudioMixer,
            "avatar" => AssetKind::Avatar,
            "controller" | "animatorcontroller" => AssetKind::Controller,
            "prefab" | "gameobject" => AssetKind::GameObject,
            "mat" | "material" => AssetKind::Material,
            "mesh" => AssetKind::Mesh,
            "scene" => AssetKind::Scene,
            "phymat" | "physicmat" | "physicmaterial" => AssetKind::PhysicMaterial,
            "phymat2d" | "physicmat2d" | "physicmaterial2d" => AssetKind::PhysicMaterial2D,
            "script" | "mono" | "monoscript" => AssetKind::Script,
            "shader" => AssetKind::Shader,
            "sprite" => AssetKind::Sprite,
            "atlas" | "spriteatlas" => AssetKind::SpriteAtlas,
            "text" | "textasset" => AssetKind::TextAsset,
            "tex" | "texture" => AssetKind::Texture,
            _ => return None,
        };
        Some(Category::Kind(kind))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub category: Category,
    pub text: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FilterParser;

impl FilterParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Split a filter string into categorised keywords.
    ///
    /// Unknown category prefixes are dropped; the keyword after them goes to
    /// the default bucket. A trailing lone `\` is kept literally.
    ///
    /// # Errors
    /// Returns `FilterParseError` for an escape of any other character, or a
    /// second category prefix directly after a recognised one.
    pub fn parse(&self, input: &str) -> Result<Vec<Keyword>, FilterParseError> {
        let mut out = Vec::new();
        let mut token = String::new();
        let mut pending = Category::Default;
        let mut escaped = false;
        for (index, ch) in input.chars().enumerate() {
            if escaped {
                let Some(c) = unescape(ch) else {
                    return Err(FilterParseError::UnescapableChar {
                        ch,
                        index,
                        input: input.to_string(),
                    });
                };
                token.push(c);
                escaped = false;
                continue;
            }
            match ch {
                '\\' => escaped = true,
                ':' => {
                    if token.is_empty() {
                        continue;
                    }
                    if pending != Category::Default {
                        return Err(FilterParseError::UnexpectedColon {
                            index,
                            input: input.to_string(),
                        });
                    }
                    if let Some(c) = Category::from_alias(&token) {
                        pending = c;
                    }
                    token.clear();
                }
                c if is_blank(c) => flush(&mut out, &mut token, &mut pending),
                c => token.push(c),
            }
        }
        if escaped {
            token.push('\\');
        }
        flush(&mut out, &mut token, &mut pending);
        Ok(out)
    }
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn unescape(c: char) -> Option<char> {
    match c {
        ' ' | '\t' | '\\' => Some(c),
        _ => None,
    }
}

fn flush(out: &mut Vec<Keyword>, token: &mut String, pending: &mut Category) {
    if token.is_empty() {
        return;
    }
    out.push(Keyword { category: *pending, text: std::mem::take(token) });
    *pending = Category::Default;
}
