//! Reference graph: which container roots reference which assets, and where.
//!
//! Every edge is recorded twice, once under the referencing root's
//! [`ForwardRecord`] and once under the referenced asset's
//! [`ReverseRecord`], grouped by hierarchy node and then by component.
use std::collections::HashMap;
use std::sync::Arc;

use super::{AssetId, AssetTable};
use crate::describe::{Describe, Descriptor};
use crate::errors::AnalysisError;
use crate::progress::{checkpoint, within, ProgressSink, REFERENCES_SPAN};
use crate::repository::{AssetObject, FieldValue, Hierarchy, NodeId, ObjectHandle};

pub(crate) const STAGE_REFERENCES: &str = "references";

/// Component type that never carries asset references.
const TRANSFORM: &str = "Transform";

/// One serialized property holding a resolved asset reference.
#[derive(Debug, Clone)]
pub struct PropertyReference {
    pub property_path: String,
    pub target: AssetId,
    /// The referenced object, which may be a sub-object of `target`.
    pub object: ObjectHandle,
    pub descriptor: Descriptor,
}

#[derive(Debug, Clone)]
pub struct ComponentReferences {
    /// Position of the component on its node.
    pub component_index: usize,
    pub type_name: String,
    pub properties: Vec<PropertyReference>,
}

#[derive(Debug, Clone)]
pub struct NodeReferences {
    pub node: NodeId,
    /// Node names from the root down, joined with `/`.
    pub hierarchy_path: Arc<str>,
    pub components: Vec<ComponentReferences>,
}

impl NodeReferences {
    #[must_use]
    pub fn property_count(&self) -> usize {
        self.components.iter().map(|c| c.properties.len()).sum()
    }
}

fn property_count(nodes: &[NodeReferences]) -> usize {
    nodes.iter().map(NodeReferences::property_count).sum()
}

/// Everything one container root references.
#[derive(Debug, Clone)]
pub struct ForwardRecord {
    pub root: AssetId,
    pub nodes: Vec<NodeReferences>,
}

impl ForwardRecord {
    #[must_use]
    pub fn edge_count(&self) -> usize {
        property_count(&self.nodes)
    }

    /// Display rows: one per property, at least one.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.edge_count().max(1)
    }
}

/// References to one asset made from inside one container root.
#[derive(Debug, Clone)]
pub struct ReferencedBy {
    pub root: AssetId,
    pub nodes: Vec<NodeReferences>,
}

/// Every container root that references one asset.
#[derive(Debug, Clone)]
pub struct ReverseRecord {
    pub asset: AssetId,
    pub referenced_by: Vec<ReferencedBy>,
}

impl ReverseRecord {
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.referenced_by.iter().map(|g| property_count(&g.nodes)).sum()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.edge_count()
    }
}

/// Flattened edge used to compare both directions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub root: AssetId,
    pub node: NodeId,
    pub component_index: usize,
    pub property_path: String,
    pub target: AssetId,
}

/// Reusable buffer for building hierarchy paths.
#[derive(Debug, Default)]
pub struct PathArena {
    chain: Vec<NodeId>,
    buf: String,
}

impl PathArena {
    /// `Root/Child/Leaf` path of `node`. Parent cycles are cut after one lap.
    pub fn hierarchy_path(&mut self, hierarchy: &Hierarchy, node: NodeId) -> Arc<str> {
        self.chain.clear();
        self.buf.clear();
        let mut cur = Some(node);
        while let Some(id) = cur {
            let Some(n) = hierarchy.node(id) else {
                break;
            };
            if self.chain.len() > hierarchy.nodes.len() {
                break;
            }
            self.chain.push(id);
            cur = n.parent;
        }
        for (i, id) in self.chain.iter().rev().enumerate() {
            if i > 0 {
                self.buf.push('/');
            }
            if let Some(n) = hierarchy.node(*id) {
                self.buf.push_str(&n.name);
            }
        }
        Arc::from(self.buf.as_str())
    }
}

/// Traversal state for one container root, reset between roots.
#[derive(Debug, Default)]
struct TraversalScratch {
    stack: Vec<NodeId>,
    visited: Vec<bool>,
    paths: Vec<Option<Arc<str>>>,
    arena: PathArena,
}

impl TraversalScratch {
    fn reset(&mut self, len: usize) {
        self.stack.clear();
        self.visited.clear();
        self.visited.resize(len, false);
        self.paths.clear();
        self.paths.resize(len, None);
    }

    fn path_of(&mut self, hierarchy: &Hierarchy, node: NodeId) -> Arc<str> {
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

/// Forward and reverse reference records for one [`AssetTable`].
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
    forward: Vec<ForwardRecord>,
    forward_index: HashMap<AssetId, usize>,
    reverse: Vec<ReverseRecord>,
}

impl ReferenceGraph {
    /// Walk every container root and record its asset references.
    ///
    /// Reports the `references` stage (0.7 to 1.0) and clears the sink when done.
    ///
    /// # Errors
    /// Returns `AnalysisError::Cancelled` when the progress sink cancels.
    pub fn build(
        table: &AssetTable,
        describer: &dyn Describe,
        progress: &mut dyn ProgressSink,
    ) -> Result<Self, AnalysisError> {
        let mut graph = Self {
            forward: Vec::new(),
            forward_index: HashMap::new(),
            reverse: table
                .iter()
                .map(|a| ReverseRecord { asset: a.id, referenced_by: Vec::new() })
                .collect(),
        };
        let roots: Vec<_> = table.iter().filter(|a| !a.is_scene && a.is_container()).collect();
        let len = roots.len();
        let mut scratch = TraversalScratch::default();
        for (i, root) in roots.into_iter().enumerate() {
            checkpoint(
                progress,
                STAGE_REFERENCES,
                &format!("Step 4 ({} / {}) {}", i + 1, len, root.path),
                within(REFERENCES_SPAN, (i as f32 + 0.5) / len as f32),
            )?;
            let Some(hierarchy) = root.main.as_ref().and_then(AssetObject::hierarchy) else {
                continue;
            };
            let record = graph.trace(table, root.id, hierarchy, describer, &mut scratch);
            graph.forward_index.insert(root.id, graph.forward.len());
            graph.forward.push(record);
        }
        progress.clear();
        Ok(graph)
    }

    fn trace(
        &mut self,
        table: &AssetTable,
        root: AssetId,
        hierarchy: &Hierarchy,
        describer: &dyn Describe,
        scratch: &mut TraversalScratch,
    ) -> ForwardRecord {
        let mut forward = ForwardRecord { root, nodes: Vec::new() };
        scratch.reset(hierarchy.nodes.len());
        if let Some(r) = hierarchy.root() {
            scratch.visited[r.0] = true;
            scratch.stack.push(r);
        }
        while let Some(id) = scratch.stack.pop() {
            let Some(node) = hierarchy.node(id) else {
                continue;
            };
            for (ci, component) in node.components.iter().enumerate() {
                if component.type_name == TRANSFORM {
                    continue;
                }
                for field in &component.fields {
                    let FieldValue::ObjectReference(Some(handle)) = field.value else {
                        continue;
                    };
                    let Some((target, object)) = table.resolve(handle) else {
                        continue;
                    };
                    if target == root {
                        continue;
                    }
                    let path = scratch.path_of(hierarchy, id);
                    let property = PropertyReference {
                        property_path: field.property_path.clone(),
                        target,
                        object: handle,
                        descriptor: describer.describe(object, true),
                    };
                    let groups = &mut self.reverse[target.0].referenced_by;
                    let group = match groups.iter().position(|g| g.root == root) {
                        Some(g) => g,
                        None => {
                            groups.push(ReferencedBy { root, nodes: Vec::new() });
                            groups.len() - 1
                        }
                    };
                    let site = Site { node: id, path: &path, component_index: ci, type_name: &component.type_name };
                    site.record(&mut groups[group].nodes, property.clone());
                    site.record(&mut forward.nodes, property);
                }
            }
            for child in node.children.iter().rev() {
                if let Some(seen) = scratch.visited.get_mut(child.0) {
                    if !*seen {
                        *seen = true;
                        scratch.stack.push(*child);
                    }
                }
            }
        }
        forward
    }

    /// Forward record of a container root.
    #[must_use]
    pub fn forward(&self, root: AssetId) -> Option<&ForwardRecord> {
        self.forward_index.get(&root).and_then(|&i| self.forward.get(i))
    }

    /// Forward records in table order of their roots.
    #[must_use]
    pub fn forward_records(&self) -> &[ForwardRecord] {
        &self.forward
    }

    #[must_use]
    pub fn reverse(&self, asset: AssetId) -> Option<&ReverseRecord> {
        self.reverse.get(asset.0)
    }

    /// Reverse records, one per asset in table order.
    #[must_use]
    pub fn reverse_records(&self) -> &[ReverseRecord] {
        &self.reverse
    }

    /// Every edge as seen from the forward records.
    #[must_use]
    pub fn forward_edges(&self) -> Vec<EdgeKey> {
        let mut out = Vec::new();
        for rec in &self.forward {
            push_edges(&mut out, rec.root, &rec.nodes);
        }
        out
    }

    /// Every edge as seen from the reverse records.
    #[must_use]
    pub fn reverse_edges(&self) -> Vec<EdgeKey> {
        let mut out = Vec::new();
        for rec in &self.reverse {
            for group in &rec.referenced_by {
                push_edges(&mut out, group.root, &group.nodes);
            }
        }
        out
    }
}

fn push_edges(out: &mut Vec<EdgeKey>, root: AssetId, nodes: &[NodeReferences]) {
    for n in nodes {
        for c in &n.components {
            for p in &c.properties {
                out.push(EdgeKey {
                    root,
                    node: n.node,
                    component_index: c.component_index,
                    property_path: p.property_path.clone(),
                    target: p.target,
                });
            }
        }
    }
}

/// Where a property lives inside a container.
struct Site<'a> {
    node: NodeId,
    path: &'a Arc<str>,
    component_index: usize,
    type_name: &'a str,
}

impl Site<'_> {
    /// Append `property`, reusing the node and component entries if present.
    fn record(&self, nodes: &mut Vec<NodeReferences>, property: PropertyReference) {
        let n = match nodes.iter().rposition(|n| n.node == self.node) {
            Some(n) => n,
            None => {
                nodes.push(NodeReferences {
                    node: self.node,
                    hierarchy_path: Arc::clone(self.path),
                    components: Vec::new(),
                });
                nodes.len() - 1
            }
        };
        let components = &mut nodes[n].components;
        let c = match components.iter().position(|c| c.component_index == self.component_index) {
            Some(c) => c,
            None => {
                components.push(ComponentReferences {
                    component_index: self.component_index,
                    type_name: self.type_name.to_string(),
                    properties: Vec::new(),
                });
                components.len() - 1
            }
        };
        components[c].properties.push(property);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::AssetDescriber;
    use crate::graph::test_support::*;
    use crate::graph::ScanRules;
    use crate::progress::NullProgress;
    use crate::repository::{ManifestAsset, ObjectType};

    fn build(assets: Vec<ManifestAsset>) -> (AssetTable, ReferenceGraph) {
        let repo = repo(assets);
        let table = AssetTable::collect(&repo, &ScanRules::default(), &mut NullProgress).unwrap();
        let graph = ReferenceGraph::build(&table, &AssetDescriber::default(), &mut NullProgress).unwrap();
        (table, graph)
    }

    #[test]
    fn records_edges_in_both_directions() {
        let (table, graph) = build(vec![
            asset("Assets/A.tex", texture(1, "A", 64, 64), &[]),
            asset("Assets/M.mat", object(2, "M", ObjectType::Material), &["Assets/A.tex"]),
            asset(
                "Assets/P.prefab",
                prefab(
                    3,
                    "Root",
                    vec![
                        node("Root", None, vec![]),
                        node("Child", Some(0), vec![component("Renderer", vec![reference("m_Materials.Array.data[0]", Some(2))])]),
                    ],
                ),
                &["Assets/M.mat"],
            ),
        ]);
        let p = table.id_of("Assets/P.prefab").unwrap();
        let m = table.id_of("Assets/M.mat").unwrap();
        let fwd = graph.forward(p).unwrap();
        assert_eq!(fwd.edge_count(), 1);
        assert_eq!(&*fwd.nodes[0].hierarchy_path, "Root/Child");
        assert_eq!(fwd.nodes[0].components[0].type_name, "Renderer");
        assert_eq!(fwd.nodes[0].components[0].properties[0].target, m);

        let rev = graph.reverse(m).unwrap();
        assert_eq!(rev.referenced_by.len(), 1);
        assert_eq!(rev.referenced_by[0].root, p);
        assert_eq!(rev.edge_count(), 1);
        assert_eq!(graph.reverse(table.id_of("Assets/A.tex").unwrap()).unwrap().edge_count(), 0);
    }

    #[test]
    fn dedups_by_node_then_component() {
        let renderer = component(
            "Renderer",
            vec![reference("m_A", Some(1)), reference("m_B", Some(1)), reference("m_C", None)],
        );
        let other = component("Other", vec![reference("m_D", Some(1))]);
        let (table, graph) = build(vec![
            asset("Assets/A.png", texture(1, "A", 4, 4), &[]),
            asset("Assets/P.prefab", prefab(2, "P", vec![node("P", None, vec![renderer, other])]), &[]),
        ]);
        let fwd = graph.forward(table.id_of("Assets/P.prefab").unwrap()).unwrap();
        assert_eq!(fwd.nodes.len(), 1);
        assert_eq!(fwd.nodes[0].components.len(), 2);
        assert_eq!(fwd.nodes[0].components[0].properties.len(), 2);
        assert_eq!(fwd.edge_count(), 3);
        let rev = graph.reverse(table.id_of("Assets/A.png").unwrap()).unwrap();
        assert_eq!(rev.referenced_by[0].nodes.len(), 1);
        assert_eq!(rev.referenced_by[0].nodes[0].components.len(), 2);
    }

    #[test]
    fn skips_transforms_self_references_and_unknown_handles() {
        let (table, graph) = build(vec![
            asset("Assets/A.png", texture(1, "A", 4, 4), &[]),
            asset(
                "Assets/P.prefab",
                prefab(
                    2,
                    "P",
                    vec![node(
                        "P",
                        None,
                        vec![
                            component("Transform", vec![reference("m_Father", Some(1))]),
                            component("Spawner", vec![reference("m_Self", Some(2)), reference("m_Gone", Some(99))]),
                        ],
                    )],
                ),
                &[],
            ),
        ]);
        let fwd = graph.forward(table.id_of("Assets/P.prefab").unwrap()).unwrap();
        assert_eq!(fwd.edge_count(), 0);
        assert_eq!(fwd.row_count(), 1);
        assert!(graph.reverse_edges().is_empty());
    }

    #[test]
    fn visits_depth_first_first_child_first() {
        let hit = |p: &str| component("C", vec![reference(p, Some(1))]);
        let (table, graph) = build(vec![
            asset("Assets/A.png", texture(1, "A", 4, 4), &[]),
            asset(
                "Assets/P.prefab",
                prefab(
                    2,
                    "R",
                    vec![
                        node("R", None, vec![]),
                        node("X", Some(0), vec![hit("x")]),
                        node("Y", Some(0), vec![hit("y")]),
                        node("X1", Some(1), vec![hit("x1")]),
                    ],
                ),
                &[],
            ),
        ]);
        let fwd = graph.forward(table.id_of("Assets/P.prefab").unwrap()).unwrap();
        let order: Vec<&str> = fwd.nodes.iter().map(|n| &*n.hierarchy_path).collect();
        assert_eq!(order, vec!["R/X", "R/X/X1", "R/Y"]);
    }

    #[test]
    fn reverse_groups_per_root() {
        let user = |h: u64, name: &str| {
            prefab(h, name, vec![node(name, None, vec![component("C", vec![reference("m", Some(1))])])])
        };
        let (table, graph) = build(vec![
            asset("Assets/A.png", texture(1, "A", 4, 4), &[]),
            asset("Assets/P.prefab", user(2, "P"), &[]),
            asset("Assets/Q.prefab", user(3, "Q"), &[]),
        ]);
        let rev = graph.reverse(table.id_of("Assets/A.png").unwrap()).unwrap();
        let roots: Vec<AssetId> = rev.referenced_by.iter().map(|g| g.root).collect();
        assert_eq!(roots, vec![table.id_of("Assets/P.prefab").unwrap(), table.id_of("Assets/Q.prefab").unwrap()]);

        let mut f = graph.forward_edges();
        let mut r = graph.reverse_edges();
        f.sort();
        r.sort();
        assert_eq!(f, r);
    }

    #[test]
    fn path_arena_cuts_parent_cycles() {
        let h = Hierarchy { nodes: vec![node("A", Some(1), vec![]), node("B", Some(0), vec![])] };
        let mut arena = PathArena::default();
        let p = arena.hierarchy_path(&h, NodeId(0));
        assert!(p.ends_with("B/A"));
        let single = Hierarchy { nodes: vec![node("Only", None, vec![])] };
        assert_eq!(&*arena.hierarchy_path(&single, NodeId(0)), "Only");
    }
}
