//! Layer/subcanvas hierarchy.
//!
//! Layers and subcanvases arrive as flat keyed records with parent links and child
//! id lists. [`SceneHierarchy::build`] turns them into a forest. Inconsistent input
//! (dangling parents, cycles, children claimed twice) still produces a forest in
//! which every record appears at most once.

use kurbo::{Rect, Size};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Placement of a layer or subcanvas in canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Radians. Not used for bounds.
    pub rotation: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, scale_x: 1.0, scale_y: 1.0, rotation: 0.0 }
    }
}

impl Transform {
    pub fn at(x: f64, y: f64) -> Self {
        Self { x, y, ..Self::default() }
    }

    /// Axis-aligned extent of something of `size` placed by this transform.
    pub fn bounds(&self, size: Size) -> Rect {
        Rect::new(
            self.x,
            self.y,
            self.x + size.width * self.scale_x.abs(),
            self.y + size.height * self.scale_y.abs(),
        )
    }
}

fn default_true() -> bool {
    true
}

/// An image layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub id: String,
    #[serde(default)]
    pub transform: Transform,
    pub size: Size,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl LayerRecord {
    pub fn new(id: impl Into<String>, transform: Transform, size: Size) -> Self {
        Self { id: id.into(), transform, size, visible: true, locked: false, parent_id: None }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// A container of layers and nested subcanvases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubcanvasRecord {
    pub id: String,
    #[serde(default)]
    pub transform: Transform,
    pub size: Size,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub child_layer_ids: Vec<String>,
    #[serde(default)]
    pub child_subcanvas_ids: Vec<String>,
}

impl SubcanvasRecord {
    pub fn new(id: impl Into<String>, transform: Transform, size: Size) -> Self {
        Self {
            id: id.into(),
            transform,
            size,
            visible: true,
            locked: false,
            parent_id: None,
            child_layer_ids: Vec::new(),
            child_subcanvas_ids: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_layers(mut self, ids: &[&str]) -> Self {
        self.child_layer_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_subcanvases(mut self, ids: &[&str]) -> Self {
        self.child_subcanvas_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Layer,
    Subcanvas,
}

/// The record a node was built from.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Layer(LayerRecord),
    Subcanvas(SubcanvasRecord),
}

impl NodeData {
    pub fn transform(&self) -> &Transform {
        match self {
            NodeData::Layer(l) => &l.transform,
            NodeData::Subcanvas(s) => &s.transform,
        }
    }

    pub fn size(&self) -> Size {
        match self {
            NodeData::Layer(l) => l.size,
            NodeData::Subcanvas(s) => s.size,
        }
    }

    pub fn visible(&self) -> bool {
        match self {
            NodeData::Layer(l) => l.visible,
            NodeData::Subcanvas(s) => s.visible,
        }
    }

    pub fn locked(&self) -> bool {
        match self {
            NodeData::Layer(l) => l.locked,
            NodeData::Subcanvas(s) => s.locked,
        }
    }
}

/// A node of the built forest.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyNode {
    pub id: String,
    pub kind: NodeKind,
    pub data: NodeData,
    pub children: Vec<HierarchyNode>,
    pub depth: usize,
    /// Id of the subcanvas this node was placed under; `None` for roots.
    pub parent_id: Option<String>,
}

impl HierarchyNode {
    pub fn bounds(&self) -> Rect {
        self.data.transform().bounds(self.data.size())
    }
}

/// Flat scene records plus their display order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSource {
    pub layers: HashMap<String, LayerRecord>,
    pub subcanvases: HashMap<String, SubcanvasRecord>,
    pub layer_order: Vec<String>,
    pub subcanvas_order: Vec<String>,
}

impl SceneSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a layer, appending it to the layer order.
    pub fn add_layer(&mut self, layer: LayerRecord) {
        if !self.layers.contains_key(&layer.id) {
            self.layer_order.push(layer.id.clone());
        }
        self.layers.insert(layer.id.clone(), layer);
    }

    /// Insert a subcanvas, appending it to the subcanvas order.
    pub fn add_subcanvas(&mut self, subcanvas: SubcanvasRecord) {
        if !self.subcanvases.contains_key(&subcanvas.id) {
            self.subcanvas_order.push(subcanvas.id.clone());
        }
        self.subcanvases.insert(subcanvas.id.clone(), subcanvas);
    }

    /// Ids in display order, followed by any records the order list misses (sorted).
    fn ordered<'a, T>(order: &'a [String], records: &'a HashMap<String, T>) -> Vec<&'a str> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut ids: Vec<&str> = order
            .iter()
            .map(String::as_str)
            .filter(|id| records.contains_key(*id) && seen.insert(*id))
            .collect();
        let mut rest: Vec<&str> = records.keys().map(String::as_str).filter(|id| !seen.contains(id)).collect();
        rest.sort_unstable();
        ids.extend(rest);
        ids
    }
}

struct ArenaNode {
    kind: NodeKind,
    id: String,
    depth: usize,
    parent_id: Option<String>,
    children: Vec<usize>,
}

enum Frame<'a> {
    /// Create the subcanvas node and queue its children.
    Enter { id: &'a str, parent: Option<usize>, depth: usize },
    /// Attach the subcanvas's layers once its child subcanvases are done.
    Layers { index: usize },
}

/// Iterative forest builder over an index arena.
struct Builder<'a> {
    source: &'a SceneSource,
    arena: Vec<ArenaNode>,
    roots: Vec<usize>,
    visited: HashSet<(NodeKind, &'a str)>,
}

impl<'a> Builder<'a> {
    fn new(source: &'a SceneSource) -> Self {
        Self { source, arena: Vec::new(), roots: Vec::new(), visited: HashSet::new() }
    }

    fn push_node(&mut self, kind: NodeKind, id: &str, parent: Option<usize>, depth: usize) -> usize {
        let index = self.arena.len();
        let parent_id = parent.map(|p| self.arena[p].id.clone());
        self.arena.push(ArenaNode { kind, id: id.to_string(), depth, parent_id, children: Vec::new() });
        match parent {
            Some(p) => self.arena[p].children.push(index),
            None => self.roots.push(index),
        }
        index
    }

    fn expand_subcanvas(&mut self, root: &'a str) {
        let source = self.source;
        let mut stack = vec![Frame::Enter { id: root, parent: None, depth: 0 }];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter { id, parent, depth } => {
                    if !self.visited.insert((NodeKind::Subcanvas, id)) {
                        log::warn!("Subcanvas {} referenced more than once; keeping the first placement", id);
                        continue;
                    }
                    let Some(record) = source.subcanvases.get(id) else {
                        continue;
                    };
                    let index = self.push_node(NodeKind::Subcanvas, id, parent, depth);
                    stack.push(Frame::Layers { index });
                    for child in record.child_subcanvas_ids.iter().rev() {
                        if source.subcanvases.contains_key(child) {
                            stack.push(Frame::Enter { id: child.as_str(), parent: Some(index), depth: depth + 1 });
                        } else {
                            log::warn!("Subcanvas {} lists unknown child subcanvas {}", id, child);
                        }
                    }
                }
                Frame::Layers { index } => {
                    let Some(record) = source.subcanvases.get(&self.arena[index].id) else {
                        continue;
                    };
                    let depth = self.arena[index].depth + 1;
                    for layer_id in &record.child_layer_ids {
                        if !source.layers.contains_key(layer_id) {
                            log::warn!("Subcanvas {} lists unknown layer {}", record.id, layer_id);
                            continue;
                        }
                        if self.visited.insert((NodeKind::Layer, layer_id.as_str())) {
                            self.push_node(NodeKind::Layer, layer_id, Some(index), depth);
                        }
                    }
                }
            }
        }
    }

    fn build(mut self) -> Vec<HierarchyNode> {
        let source = self.source;
        let subcanvas_ids = SceneSource::ordered(&source.subcanvas_order, &source.subcanvases);

        // Root subcanvases: no parent, or a parent that does not exist.
        for id in &subcanvas_ids {
            let Some(record) = source.subcanvases.get(*id) else {
                continue;
            };
            let is_root = match &record.parent_id {
                None => true,
                Some(parent) if !source.subcanvases.contains_key(parent) => {
                    log::warn!("Subcanvas {} has unknown parent {}; placing at root", id, parent);
                    true
                }
                Some(_) => false,
            };
            if is_root && !self.visited.contains(&(NodeKind::Subcanvas, *id)) {
                self.expand_subcanvas(*id);
            }
        }

        // Subcanvases whose parent never claimed them, or that sit on a cycle.
        for id in &subcanvas_ids {
            if !self.visited.contains(&(NodeKind::Subcanvas, *id)) {
                log::warn!("Subcanvas {} is unreachable from its parent; placing at root", id);
                self.expand_subcanvas(*id);
            }
        }

        for id in SceneSource::ordered(&source.layer_order, &source.layers) {
            if self.visited.contains(&(NodeKind::Layer, id)) {
                continue;
            }
            if let Some(parent) = source.layers.get(id).and_then(|l| l.parent_id.as_ref()) {
                log::warn!("Layer {} not claimed by parent {}; placing at root", id, parent);
            }
            self.visited.insert((NodeKind::Layer, id));
            self.push_node(NodeKind::Layer, id, None, 0);
        }

        self.assemble()
    }

    /// Turn the arena into owned nested nodes. Children always follow their parent
    /// in the arena, so a reverse sweep sees every child before its parent.
    fn assemble(self) -> Vec<HierarchyNode> {
        let mut built: Vec<Option<HierarchyNode>> = Vec::with_capacity(self.arena.len());
        built.resize_with(self.arena.len(), || None);

        for (index, node) in self.arena.iter().enumerate().rev() {
            let data = match node.kind {
                NodeKind::Layer => self.source.layers.get(&node.id).cloned().map(NodeData::Layer),
                NodeKind::Subcanvas => self.source.subcanvases.get(&node.id).cloned().map(NodeData::Subcanvas),
            };
            let Some(data) = data else {
                continue;
            };
            let children = node.children.iter().filter_map(|c| built[*c].take()).collect();
            built[index] = Some(HierarchyNode {
                id: node.id.clone(),
                kind: node.kind,
                data,
                children,
                depth: node.depth,
                parent_id: node.parent_id.clone(),
            });
        }

        self.roots.iter().filter_map(|r| built[*r].take()).collect()
    }
}

/// The built layer/subcanvas forest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneHierarchy {
    roots: Vec<HierarchyNode>,
}

impl SceneHierarchy {
    /// Build a fresh forest from `source`.
    ///
    /// Root subcanvases come first in subcanvas order, each expanded depth-first:
    /// child subcanvases, then child layers as leaves. Layers nobody claimed follow
    /// as roots in layer order.
    pub fn build(source: &SceneSource) -> Self {
        let roots = Builder::new(source).build();
        log::debug!("Built scene hierarchy with {} root(s)", roots.len());
        Self { roots }
    }

    pub fn rebuild(&mut self, source: &SceneSource) {
        *self = Self::build(source);
    }

    pub fn roots(&self) -> &[HierarchyNode] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Pre-order walk, optionally skipping the subtrees of nodes `descend` rejects.
    fn walk<'a>(&'a self, mut descend: impl FnMut(&HierarchyNode) -> bool) -> Vec<&'a HierarchyNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&HierarchyNode> = self.roots.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if !descend(node) {
                continue;
            }
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Every node, pre-order.
    pub fn flatten(&self) -> Vec<&HierarchyNode> {
        self.walk(|_| true)
    }

    /// First node with `id` in pre-order.
    pub fn node_by_id(&self, id: &str) -> Option<&HierarchyNode> {
        let mut stack: Vec<&HierarchyNode> = self.roots.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if node.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// Visible nodes; an invisible node hides its whole subtree.
    pub fn visible_nodes(&self) -> Vec<&HierarchyNode> {
        self.walk(|node| node.data.visible())
    }

    /// Nodes whose bounds touch `rect`. Every subtree is searched, since children
    /// are not required to lie inside their parent.
    pub fn nodes_in_bounds(&self, rect: Rect) -> Vec<&HierarchyNode> {
        self.flatten()
            .into_iter()
            .filter(|node| {
                let b = node.bounds();
                b.x0 <= rect.x1 && rect.x0 <= b.x1 && b.y0 <= rect.y1 && rect.y0 <= b.y1
            })
            .collect()
    }

    /// Path from the root down to, but excluding, the node with `id`.
    pub fn ancestors_of(&self, id: &str) -> Vec<&HierarchyNode> {
        let mut path: Vec<&HierarchyNode> = Vec::new();
        // (node, depth within the walk) so the path can be unwound on backtrack.
        let mut stack: Vec<(&HierarchyNode, usize)> = self.roots.iter().rev().map(|n| (n, 0)).collect();
        while let Some((node, level)) = stack.pop() {
            path.truncate(level);
            if node.id == id {
                return path;
            }
            path.push(node);
            stack.extend(node.children.iter().rev().map(|c| (c, level + 1)));
        }
        Vec::new()
    }

    /// Whether the node or any ancestor is locked. Unknown ids are not locked.
    pub fn is_effectively_locked(&self, id: &str) -> bool {
        let Some(node) = self.node_by_id(id) else {
            return false;
        };
        node.data.locked() || self.ancestors_of(id).iter().any(|a| a.data.locked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size() -> Size {
        Size::new(100.0, 100.0)
    }

    fn ids(nodes: &[&HierarchyNode]) -> Vec<String> {
        nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// board
    /// ├── panel
    /// │   └── photo
    /// └── caption
    /// loose
    fn nested() -> SceneSource {
        let mut source = SceneSource::new();
        source.add_subcanvas(
            SubcanvasRecord::new("board", Transform::at(0.0, 0.0), Size::new(1000.0, 1000.0))
                .with_subcanvases(&["panel"])
                .with_layers(&["caption"]),
        );
        source.add_subcanvas(
            SubcanvasRecord::new("panel", Transform::at(2000.0, 2000.0), size())
                .with_parent("board")
                .with_layers(&["photo"]),
        );
        source.add_layer(LayerRecord::new("photo", Transform::at(5000.0, 5000.0), size()).with_parent("panel"));
        source.add_layer(LayerRecord::new("caption", Transform::at(10.0, 10.0), size()).with_parent("board"));
        source.add_layer(LayerRecord::new("loose", Transform::at(-500.0, 0.0), size()));
        source
    }

    #[test]
    fn test_build_orders_subcanvases_before_layers() {
        let hierarchy = SceneHierarchy::build(&nested());
        assert_eq!(ids(&hierarchy.flatten()), vec!["board", "panel", "photo", "caption", "loose"]);

        let roots = hierarchy.roots();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].kind, NodeKind::Subcanvas);
        assert_eq!(roots[1].id, "loose");
        assert_eq!(roots[1].parent_id, None);

        let photo = hierarchy.node_by_id("photo").unwrap();
        assert_eq!(photo.depth, 2);
        assert_eq!(photo.parent_id.as_deref(), Some("panel"));
        assert_eq!(photo.kind, NodeKind::Layer);
    }

    #[test]
    fn test_dangling_parent_becomes_root_once() {
        let mut source = SceneSource::new();
        source.add_layer(LayerRecord::new("orphan", Transform::default(), size()).with_parent("gone"));
        source.add_subcanvas(SubcanvasRecord::new("lost", Transform::default(), size()).with_parent("gone"));

        let hierarchy = SceneHierarchy::build(&source);
        assert_eq!(ids(&hierarchy.flatten()), vec!["lost", "orphan"]);
        assert!(hierarchy.roots().iter().all(|r| r.depth == 0 && r.parent_id.is_none()));
    }

    #[test]
    fn test_duplicate_child_references() {
        let mut source = SceneSource::new();
        source.add_subcanvas(
            SubcanvasRecord::new("a", Transform::default(), size())
                .with_subcanvases(&["b", "b"])
                .with_layers(&["shared", "shared"]),
        );
        source.add_subcanvas(
            SubcanvasRecord::new("b", Transform::default(), size())
                .with_parent("a")
                .with_layers(&["shared"]),
        );
        source.add_layer(LayerRecord::new("shared", Transform::default(), size()));

        let hierarchy = SceneHierarchy::build(&source);
        let flat = ids(&hierarchy.flatten());
        assert_eq!(flat, vec!["a", "b", "shared"]);
        // The deeper subcanvas is expanded first and keeps the layer.
        assert_eq!(hierarchy.node_by_id("shared").unwrap().parent_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_cycle_terminates() {
        let mut source = SceneSource::new();
        source.add_subcanvas(
            SubcanvasRecord::new("x", Transform::default(), size())
                .with_parent("y")
                .with_subcanvases(&["y"]),
        );
        source.add_subcanvas(
            SubcanvasRecord::new("y", Transform::default(), size())
                .with_parent("x")
                .with_subcanvases(&["x"]),
        );

        let hierarchy = SceneHierarchy::build(&source);
        assert_eq!(ids(&hierarchy.flatten()), vec!["x", "y"]);
        assert_eq!(hierarchy.roots().len(), 1);
    }

    #[test]
    fn test_self_reference_terminates() {
        let mut source = SceneSource::new();
        source.add_subcanvas(SubcanvasRecord::new("me", Transform::default(), size()).with_subcanvases(&["me"]));
        let hierarchy = SceneHierarchy::build(&source);
        assert_eq!(hierarchy.flatten().len(), 1);
    }

    #[test]
    fn test_deep_nesting() {
        let mut source = SceneSource::new();
        let depth = 1_000;
        for i in 0..depth {
            let mut record = SubcanvasRecord::new(format!("s{}", i), Transform::default(), size());
            if i > 0 {
                record = record.with_parent(format!("s{}", i - 1));
            }
            if i + 1 < depth {
                record.child_subcanvas_ids.push(format!("s{}", i + 1));
            }
            source.add_subcanvas(record);
        }
        let hierarchy = SceneHierarchy::build(&source);
        assert_eq!(hierarchy.flatten().len(), depth);
        assert_eq!(hierarchy.node_by_id("s999").unwrap().depth, depth - 1);
        assert_eq!(hierarchy.ancestors_of("s999").len(), depth - 1);
    }

    #[test]
    fn test_invisible_subtree_hidden() {
        let mut source = nested();
        if let Some(panel) = source.subcanvases.get_mut("panel") {
            panel.visible = false;
        }
        let hierarchy = SceneHierarchy::build(&source);
        assert_eq!(ids(&hierarchy.visible_nodes()), vec!["board", "caption", "loose"]);
    }

    #[test]
    fn test_nodes_in_bounds_searches_all_subtrees() {
        let hierarchy = SceneHierarchy::build(&nested());
        // Only the deeply nested photo lies here; its ancestors do not.
        let hits = hierarchy.nodes_in_bounds(Rect::new(5050.0, 5050.0, 5060.0, 5060.0));
        assert_eq!(ids(&hits), vec!["photo"]);

        let hits = hierarchy.nodes_in_bounds(Rect::new(0.0, 0.0, 20.0, 20.0));
        assert_eq!(ids(&hits), vec!["board", "caption"]);
    }

    #[test]
    fn test_scaled_bounds() {
        let mut source = SceneSource::new();
        source.add_layer(LayerRecord::new(
            "flipped",
            Transform { x: 0.0, y: 0.0, scale_x: -2.0, scale_y: 0.5, rotation: 0.0 },
            size(),
        ));
        let hierarchy = SceneHierarchy::build(&source);
        let node = hierarchy.node_by_id("flipped").unwrap();
        assert_eq!(node.bounds(), Rect::new(0.0, 0.0, 200.0, 50.0));
    }

    #[test]
    fn test_ancestors_and_locking() {
        let mut source = nested();
        if let Some(board) = source.subcanvases.get_mut("board") {
            board.locked = true;
        }
        let hierarchy = SceneHierarchy::build(&source);
        assert_eq!(ids(&hierarchy.ancestors_of("photo")), vec!["board", "panel"]);
        assert!(hierarchy.ancestors_of("board").is_empty());
        assert!(hierarchy.ancestors_of("missing").is_empty());

        assert!(hierarchy.is_effectively_locked("photo"));
        assert!(hierarchy.is_effectively_locked("board"));
        assert!(!hierarchy.is_effectively_locked("loose"));
        assert!(!hierarchy.is_effectively_locked("missing"));
    }

    #[test]
    fn test_records_missing_from_order_are_kept() {
        let mut source = SceneSource::new();
        source.layers.insert("b".into(), LayerRecord::new("b", Transform::default(), size()));
        source.layers.insert("a".into(), LayerRecord::new("a", Transform::default(), size()));
        source.layer_order = vec!["b".into(), "ghost".into()];
        let hierarchy = SceneHierarchy::build(&source);
        assert_eq!(ids(&hierarchy.flatten()), vec!["b", "a"]);
    }

    #[test]
    fn test_rebuild_is_fresh() {
        let mut hierarchy = SceneHierarchy::build(&nested());
        hierarchy.rebuild(&SceneSource::new());
        assert!(hierarchy.is_empty());
    }
}
