//! Texture density assessment.
//!
//! For every container root, each mesh renderer is paired with the
//! materials of its sub-meshes and the textures those materials depend on.
//! UV change per world-space meter is measured over each sub-mesh's
//! triangles and scaled by the texture diagonal to estimate how many
//! texture pixels land on one meter of surface.
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::describe::to_fixed_string;
use crate::errors::AnalysisError;
use crate::graph::references::PathArena;
use crate::graph::{Analysis, AssetId, AssetNode};
use crate::progress::{checkpoint, ProgressSink};
use crate::query::{AssetKind, Candidate, FilterQuery, FilteredView, Query, RowLayout};
use crate::repository::{
    AssetObject, Component, FieldValue, Hierarchy, MeshData, NodeId, ObjectData, ObjectHandle,
    ObjectType, Transform,
};

pub(crate) const STAGE_DENSITY: &str = "density";

const MESH_FILTER: &str = "MeshFilter";
const MESH_RENDERER: &str = "MeshRenderer";
const SKINNED_MESH_RENDERER: &str = "SkinnedMeshRenderer";
const MESH_FIELD: &str = "m_Mesh";
const MATERIALS_FIELD: &str = "m_Materials";

/// Target pixels-per-meter, chosen from ten fixed levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DensityLevel(u8);

impl Default for DensityLevel {
    fn default() -> Self {
        DensityLevel(4)
    }
}

impl DensityLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    #[must_use]
    pub fn new(level: u8) -> Self {
        DensityLevel(level)
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Standard density in pixels per meter; unknown levels read as 100.
    #[must_use]
    pub fn standard_dpx(self) -> f32 {
        match self.0 {
            1 => 40.0,
            2 => 60.0,
            3 => 80.0,
            4 => 100.0,
            5 => 150.0,
            6 => 200.0,
            7 => 250.0,
            8 => 300.0,
            9 => 400.0,
            10 => 500.0,
            _ => 100.0,
        }
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN..=Self::MAX).map(DensityLevel)
    }
}

/// Min, max and area-weighted average of a per-meter rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UvStats {
    pub min: f32,
    pub max: f32,
    pub avg: f32,
}

impl UvStats {
    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        UvStats { min: self.min * factor, max: self.max * factor, avg: self.avg * factor }
    }

    /// `"min    max    avg"` with five significant digits each.
    #[must_use]
    pub fn info(&self) -> String {
        format!(
            "{}    {}    {}",
            to_fixed_string(f64::from(self.min), 5),
            to_fixed_string(f64::from(self.max), 5),
            to_fixed_string(f64::from(self.avg), 5)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityGrade {
    Ok,
    High,
    Excessive,
}

/// Grade of an average density against a level, with a 0..1 severity
/// inside the band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DensityRating {
    pub grade: DensityGrade,
    pub severity: f32,
}

impl DensityRating {
    #[must_use]
    pub fn of(dpx_avg: f32, level: DensityLevel) -> Self {
        let standard = level.standard_dpx();
        if dpx_avg <= standard {
            DensityRating { grade: DensityGrade::Ok, severity: 0.0 }
        } else if dpx_avg <= standard * 2.0 {
            DensityRating {
                grade: DensityGrade::High,
                severity: inverse_lerp(standard, standard * 2.0, dpx_avg),
            }
        } else {
            DensityRating {
                grade: DensityGrade::Excessive,
                severity: inverse_lerp(standard * 2.0, standard * 4.0, dpx_avg),
            }
        }
    }
}

fn inverse_lerp(from: f32, to: f32, v: f32) -> f32 {
    if to == from {
        return 0.0;
    }
    ((v - from) / (to - from)).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Serialize)]
pub struct TextureDensity {
    pub texture: AssetId,
    /// Pixel size, known for 2D textures only.
    pub size: Option<(u32, u32)>,
    pub mip_count: u32,
    /// Pixels per meter; `None` when the size is unknown or the material
    /// has no UV measurement.
    pub dpx: Option<UvStats>,
}

impl TextureDensity {
    #[must_use]
    pub fn rating(&self, level: DensityLevel) -> Option<DensityRating> {
        self.dpx.map(|d| DensityRating::of(d.avg, level))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MaterialDensity {
    pub submesh: usize,
    /// Material in the renderer's slot for this sub-mesh, if any.
    pub material: Option<AssetId>,
    pub uv: Option<UvStats>,
    pub textures: Vec<TextureDensity>,
}

impl MaterialDensity {
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.textures.len().max(1)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RendererDensity {
    pub node: NodeId,
    pub hierarchy_path: Arc<str>,
    pub component_index: usize,
    pub type_name: String,
    pub mesh: AssetId,
    pub mesh_name: String,
    pub materials: Vec<MaterialDensity>,
}

impl RendererDensity {
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.materials.iter().map(MaterialDensity::row_count).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerDensity {
    pub root: AssetId,
    pub renderers: Vec<RendererDensity>,
}

impl ContainerDensity {
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.renderers.iter().map(RendererDensity::row_count).sum()
    }
}

/// World-space vertex buffer and node path cache reused across renderers.
#[derive(Debug, Default)]
pub struct MeshScratch {
    world: Vec<[f32; 3]>,
    arena: PathArena,
    paths: Vec<Option<Arc<str>>>,
}

impl MeshScratch {
    fn load(&mut self, mesh: &MeshData, transform: &Transform) {
        self.world.clear();
        self.world.extend(mesh.vertices.iter().map(|v| transform.transform_point(*v)));
    }

    /// Forget cached node paths; call once per hierarchy.
    fn reset_paths(&mut self, len: usize) {
        self.paths.clear();
        self.paths.resize(len, None);
    }

    /// Path of `node`, walked once per hierarchy and shared afterwards.
    fn node_path(&mut self, hierarchy: &Hierarchy, node: NodeId) -> Arc<str> {
        if let Some(Some(p)) = self.paths.get(node.0) {
            return Arc::clone(p);
        }
        let p = self.arena.hierarchy_path(hierarchy, node);
        if let Some(slot) = self.paths.get_mut(node.0) {
            *slot = Some(Arc::clone(&p));
        }
        p
    }
}

/// UV-per-meter statistics of one sub-mesh.
///
/// Uses UV channel 0, which must have one entry per vertex. Triangles with
/// an out-of-range index or a zero-length edge are skipped.
#[must_use]
pub fn uv_stats(world: &[[f32; 3]], uvs: &[[f32; 2]], triangles: &[u32]) -> Option<UvStats> {
    if uvs.is_empty() || uvs.len() != world.len() {
        return None;
    }
    let mut min = f32::INFINITY;
    let mut max = 0.0f32;
    let mut sum = 0.0f32;
    let mut weight = 0.0f32;
    let mut plain_sum = 0.0f32;
    let mut edges = 0usize;
    for tri in triangles.chunks_exact(3) {
        let idx = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if idx.iter().any(|&i| i >= world.len()) {
            continue;
        }
        let v = idx.map(|i| world[i]);
        let t = idx.map(|i| uvs[i]);
        let d = [distance3(v[0], v[1]), distance3(v[1], v[2]), distance3(v[2], v[0])];
        if d.iter().any(|&x| x <= 0.0) {
            continue;
        }
        let duv = [
            distance2(t[0], t[1]) / d[0],
            distance2(t[1], t[2]) / d[1],
            distance2(t[2], t[0]) / d[2],
        ];
        let heron = (d[0] + d[1] + d[2])
            * (d[0] + d[1] - d[2])
            * (d[0] + d[2] - d[1])
            * (d[1] + d[2] - d[0]);
        let s = 0.25 * heron.max(0.0).sqrt();
        for x in duv {
            min = min.min(x);
            max = max.max(x);
            plain_sum += x;
        }
        edges += 3;
        sum += (duv[0] + duv[1] + duv[2]) * s;
        weight += 3.0 * s;
    }
    if edges == 0 {
        return None;
    }
    // Degenerate (zero-area) triangles only: fall back to the plain mean.
    let avg = if weight > 0.0 { sum / weight } else { plain_sum / edges as f32 };
    Some(UvStats { min, max, avg })
}

fn distance3(a: [f32; 3], b: [f32; 3]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

fn distance2(a: [f32; 2], b: [f32; 2]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

/// Density reports for every container root with at least one mesh renderer.
///
/// Reports the `density` stage, one checkpoint per container root.
///
/// # Errors
/// Returns `AnalysisError::Cancelled` when the progress sink cancels.
pub fn assess(
    analysis: &Analysis,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<ContainerDensity>, AnalysisError> {
    let roots: Vec<&AssetNode> =
        analysis.assets.iter().filter(|a| !a.is_scene && a.is_container()).collect();
    let len = roots.len();
    let mut scratch = MeshScratch::default();
    let mut out = Vec::new();
    for (i, root) in roots.into_iter().enumerate() {
        checkpoint(
            progress,
            STAGE_DENSITY,
            &format!("({}/{}) {}", i + 1, len, root.path),
            (i as f32 + 0.5) / len as f32,
        )?;
        let Some(hierarchy) = root.main.as_ref().and_then(AssetObject::hierarchy) else {
            continue;
        };
        let renderers = assess_hierarchy(analysis, hierarchy, &mut scratch);
        if !renderers.is_empty() {
            out.push(ContainerDensity { root: root.id, renderers });
        }
    }
    progress.clear();
    tracing::debug!(containers = out.len(), "density assessed");
    Ok(out)
}

fn assess_hierarchy(
    analysis: &Analysis,
    hierarchy: &Hierarchy,
    scratch: &mut MeshScratch,
) -> Vec<RendererDensity> {
    let mut out = Vec::new();
    scratch.reset_paths(hierarchy.nodes.len());
    for id in preorder(hierarchy) {
        let Some(node) = hierarchy.node(id) else {
            continue;
        };
        for (ci, component) in node.components.iter().enumerate() {
            let mesh_handle = match component.type_name.as_str() {
                SKINNED_MESH_RENDERER => component.object_reference(MESH_FIELD),
                MESH_RENDERER => node
                    .components
                    .iter()
                    .find(|c| c.type_name == MESH_FILTER)
                    .and_then(|c| c.object_reference(MESH_FIELD)),
                _ => continue,
            };
            let Some((mesh_id, mesh_obj)) = mesh_handle.and_then(|h| analysis.assets.resolve(h))
            else {
                continue;
            };
            let ObjectData::Mesh(mesh) = &mesh_obj.data else {
                continue;
            };
            scratch.load(mesh, &node.transform);
            let slots = material_slots(component);
            let materials = mesh
                .submeshes
                .iter()
                .enumerate()
                .map(|(si, triangles)| {
                    let material = slots
                        .get(si)
                        .copied()
                        .flatten()
                        .and_then(|h| analysis.assets.resolve(h))
                        .filter(|(_, o)| o.object_type.is_a(&ObjectType::Material))
                        .map(|(id, _)| id);
                    let uv = mesh
                        .uv_channels
                        .first()
                        .and_then(|uvs| uv_stats(&scratch.world, uvs, triangles));
                    let textures =
                        material.map(|m| textures_of(analysis, m, uv)).unwrap_or_default();
                    MaterialDensity { submesh: si, material, uv, textures }
                })
                .collect();
            out.push(RendererDensity {
                node: id,
                hierarchy_path: scratch.node_path(hierarchy, id),
                component_index: ci,
                type_name: component.type_name.clone(),
                mesh: mesh_id,
                mesh_name: mesh_obj.name.clone(),
                materials,
            });
        }
    }
    out
}

// Material slots of a renderer in serialized order; empty slots stay `None`.
fn material_slots(component: &Component) -> Vec<Option<ObjectHandle>> {
    component
        .fields
        .iter()
        .filter(|f| {
            f.property_path == MATERIALS_FIELD
                || f.property_path.starts_with(&format!("{MATERIALS_FIELD}."))
        })
        .filter_map(|f| match f.value {
            FieldValue::ObjectReference(h) => Some(h),
            _ => None,
        })
        .collect()
}

fn textures_of(analysis: &Analysis, material: AssetId, uv: Option<UvStats>) -> Vec<TextureDensity> {
    analysis
        .usages
        .dependencies(material)
        .iter()
        .filter_map(|&dep| {
            let asset = analysis.assets.get(dep)?;
            let main = asset.main.as_ref()?;
            if !main.object_type.is_a(&ObjectType::Texture) {
                return None;
            }
            let (size, mip_count) = match main.data {
                ObjectData::Texture { width, height, mip_count, .. }
                    if main.object_type == ObjectType::Texture2D =>
                {
                    (Some((width, height)), mip_count)
                }
                _ => (None, 1),
            };
            let diagonal = size
                .map(|(w, h)| (f64::from(w).powi(2) + f64::from(h).powi(2)).sqrt() as f32)
                .filter(|d| *d > 0.0);
            let dpx = match (uv, diagonal) {
                (Some(uv), Some(d)) => Some(uv.scaled(d)),
                _ => None,
            };
            Some(TextureDensity { texture: dep, size, mip_count, dpx })
        })
        .collect()
}

fn preorder(hierarchy: &Hierarchy) -> Vec<NodeId> {
    let mut order = Vec::with_capacity(hierarchy.nodes.len());
    let mut visited = vec![false; hierarchy.nodes.len()];
    let mut stack: Vec<NodeId> = hierarchy.root().into_iter().collect();
    while let Some(id) = stack.pop() {
        if std::mem::replace(&mut visited[id.0], true) {
            continue;
        }
        order.push(id);
        if let Some(node) = hierarchy.node(id) {
            stack.extend(node.children.iter().rev().filter(|c| c.0 < visited.len()));
        }
    }
    order
}

/// Density reports filtered by container root and by the materials,
/// shaders and textures they use. Entries index into `reports`.
///
/// Rows per entry: one per texture, at least one per material.
pub struct DensityQuery<'f, 'r> {
    pub filter: &'f FilterQuery,
    pub reports: &'r [ContainerDensity],
}

impl<'f, 'r> DensityQuery<'f, 'r> {
    #[must_use]
    pub fn new(filter: &'f FilterQuery, reports: &'r [ContainerDensity]) -> Self {
        Self { filter, reports }
    }
}

impl Query<FilteredView<usize>> for DensityQuery<'_, '_> {
    fn run(&self, analysis: &Analysis) -> FilteredView<usize> {
        let table = &analysis.assets;
        let shader_type = ObjectType::Shader;
        let mut entries = Vec::new();
        for (i, report) in self.reports.iter().enumerate() {
            let Some(root) = table.get(report.root) else {
                continue;
            };
            let c = root.main.as_ref().map(|m| Candidate::new(root, m));
            if !self.filter.matches_primary(c.as_ref()) {
                continue;
            }
            let mut need_mat = self.filter.is_restricted(AssetKind::Material);
            let mut need_shader = self.filter.is_restricted(AssetKind::Shader);
            let mut need_tex = self.filter.is_restricted(AssetKind::Texture);
            let materials = report.renderers.iter().flat_map(|r| r.materials.iter());
            for md in materials {
                if !(need_mat || need_shader || need_tex) {
                    break;
                }
                if let Some(mat) = md.material.and_then(|m| table.get(m)) {
                    if let Some(main) = &mat.main {
                        if need_mat && self.filter.matches_associated(Some(&Candidate::new(mat, main))) {
                            need_mat = false;
                        }
                        if need_shader {
                            let shader_asset = analysis.usages.dependencies(mat.id).iter().find_map(|d| {
                                let a = table.get(*d)?;
                                let m = a.main.as_ref().filter(|m| m.object_type == ObjectType::Shader)?;
                                Some(Candidate::new(a, m))
                            });
                            let shader = shader_asset.or_else(|| match &main.data {
                                ObjectData::Material { shader } if !shader.is_empty() => {
                                    Some(Candidate { path: "", name: shader, object_type: &shader_type })
                                }
                                _ => None,
                            });
                            if self.filter.matches_associated(shader.as_ref()) {
                                need_shader = false;
                            }
                        }
                    }
                }
                for td in &md.textures {
                    if need_tex {
                        let tex = table.get(td.texture).and_then(|a| a.main.as_ref().map(|m| Candidate::new(a, m)));
                        if self.filter.matches_associated(tex.as_ref()) {
                            need_tex = false;
                        }
                    }
                }
            }
            if !(need_mat || need_shader || need_tex) {
                entries.push(i);
            }
        }
        let layout =
            RowLayout::from_counts(entries.iter().map(|&i| self.reports[i].row_count()));
        FilteredView { entries, layout }
    }
}
