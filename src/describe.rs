//! Short human-readable descriptions of loaded objects.
use serde::Serialize;

use crate::repository::{
    AssetObject, Hierarchy, MeshData, NodeId, ObjectData, ObjectType, StorageSizeLookup,
};

/// Text shown next to an object, with two presentation hints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    pub text: String,
    pub bold: bool,
    pub warning: bool,
}

impl Descriptor {
    fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), bold: false, warning: false }
    }
}

/// Produces a [`Descriptor`] for an object.
///
/// `suppress_dimension_warning` silences the non-power-of-two warning for
/// sprites whose owning texture is NPOT.
pub trait Describe {
    fn describe(&self, object: &AssetObject, suppress_dimension_warning: bool) -> Descriptor;
}

/// Storage-size capability, resolved once when the describer is created.
#[derive(Clone, Copy, Default)]
pub struct StorageSizes<'a> {
    lookup: Option<&'a dyn StorageSizeLookup>,
}

impl<'a> StorageSizes<'a> {
    #[must_use]
    pub fn new(lookup: Option<&'a dyn StorageSizeLookup>) -> Self {
        if lookup.is_none() {
            tracing::debug!("storage size capability unavailable; sizes report as 0");
        }
        Self { lookup }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.lookup.is_some()
    }

    /// Storage size in bytes, 0 when the capability is absent.
    #[must_use]
    pub fn size_of(&self, object: &AssetObject) -> u64 {
        self.lookup.map_or(0, |l| l.storage_size(object))
    }
}

/// Default [`Describe`] implementation.
#[derive(Clone, Copy, Default)]
pub struct AssetDescriber<'a> {
    storage: StorageSizes<'a>,
}

impl<'a> AssetDescriber<'a> {
    #[must_use]
    pub fn new(storage: StorageSizes<'a>) -> Self {
        Self { storage }
    }
}

impl Describe for AssetDescriber<'_> {
    fn describe(&self, object: &AssetObject, suppress_dimension_warning: bool) -> Descriptor {
        match &object.data {
            ObjectData::Texture { width, height, mip_count, .. }
                if object.object_type == ObjectType::Texture2D =>
            {
                let pot = is_pot(*width) && is_pot(*height);
                let text = format!(
                    "{}  {}x{}  {}",
                    if pot { "POT" } else { "NPOT" },
                    width,
                    height,
                    format_bytes(self.storage.size_of(object))
                );
                Descriptor { text, bold: *mip_count > 1, warning: !pot }
            }
            ObjectData::Texture { .. } => {
                Descriptor::plain(format_bytes(self.storage.size_of(object)))
            }
            ObjectData::Sprite { rect_width, rect_height, texture_width, texture_height } => {
                let npot = !(is_pot(*texture_width) && is_pot(*texture_height));
                if npot && !suppress_dimension_warning {
                    Descriptor {
                        text: format!("Texture NPOT  {rect_width}x{rect_height}"),
                        bold: false,
                        warning: true,
                    }
                } else {
                    Descriptor::plain(format!("{rect_width}x{rect_height}"))
                }
            }
            ObjectData::Mesh(mesh) => Descriptor::plain(mesh_summary(mesh)),
            ObjectData::AnimationClip { length, wrap_mode, curve_count, legacy } => Descriptor {
                text: format!(
                    "{}s {} curves:{}",
                    to_fixed_string(f64::from(*length), 3),
                    wrap_mode,
                    curve_count
                ),
                bold: *legacy,
                warning: false,
            },
            ObjectData::AudioClip { length, frequency, channels, compression } => {
                Descriptor::plain(format!(
                    "{} {}kHz {}chs {}",
                    audio_length(*length),
                    *frequency as f32 / 1000.0,
                    channels,
                    compression
                ))
            }
            ObjectData::Hierarchy(h) => Descriptor::plain(hierarchy_summary(h)),
            ObjectData::Material { shader } => Descriptor::plain(shader.clone()),
            ObjectData::None => Descriptor::default(),
        }
    }
}

fn is_pot(v: u32) -> bool {
    v != 0 && v & (v - 1) == 0
}

fn mesh_summary(mesh: &MeshData) -> String {
    let verts = mesh.vertices.len();
    let uvs = mesh.uv_channels.iter().take(8).filter(|c| c.len() == verts).count();
    let tris: usize = mesh.submeshes.iter().map(Vec::len).sum::<usize>() / 3;
    format!(
        "v:{} t:{} uv:{}{}{}",
        verts,
        tris,
        uvs,
        if mesh.color_count == verts { " col" } else { "" },
        if mesh.bone_weight_count == verts { " skin" } else { "" }
    )
}

fn audio_length(len: f32) -> String {
    if len > 60.0 {
        format!("{}:{:06.3}", (len / 60.0).floor(), len % 60.0)
    } else {
        format!("{len:06.3}")
    }
}

fn hierarchy_summary(h: &Hierarchy) -> String {
    let nodes = h.nodes.len();
    let active = (0..nodes).filter(|&i| h.is_active_in_hierarchy(NodeId(i))).count();
    format!("{} nodes, {} inactived", nodes, nodes - active)
}

/// Byte count with a binary unit, one decimal above bytes.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Format `val` with roughly `digits` significant digits.
///
/// The integer part always keeps its digits; at least one digit is counted
/// for values below 1.
#[must_use]
pub fn to_fixed_string(val: f64, digits: i32) -> String {
    let int_digits = if val > 0.0 { val.log10() as i32 + 1 } else { 1 };
    let decimals = (digits - int_digits.max(1)).max(0) as usize;
    format!("{val:.decimals$}")
}
