//! The window/container tree.
//!
//! All nodes live in one slotmap arena. A node stores its parent handle and
//! its ordered children, so navigation is O(1) in both directions without
//! reference cycles. Workspaces are the roots; there is no node above them.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::sys::ax::WindowId;
use crate::sys::geometry::{Point, Rect, Size};

slotmap::new_key_type! {
    /// Represents a node somewhere in the tree.
    pub struct NodeId;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[strum(to_string = "horizontal", serialize = "h")]
    Horizontal,
    #[strum(to_string = "vertical", serialize = "v")]
    Vertical,
}

impl Orientation {
    pub fn opposite(self) -> Orientation {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    #[default]
    Tiles,
    Accordion,
}

/// Containers for windows that the OS has taken out of normal tiling.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialKind {
    NativeFullscreen,
    NativeMinimized,
    NativeHidden,
    Popup,
}

/// The kind of a node that can have children.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentKind {
    Tiling,
    Workspace,
    Special(SpecialKind),
}

/// Why a window sits where it does.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutReason {
    #[default]
    Standard,
    /// Moved into a native container; remembers where it came from.
    Macos { prev_parent: ParentKind },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub id: WindowId,
    pub last_floating_size: Option<Size>,
    pub is_fullscreen: bool,
    pub no_outer_gaps_in_fullscreen: bool,
    pub layout_reason: LayoutReason,
    /// Top-left corner relative to the workspace monitor, recorded when the
    /// window was moved into the hiding corner.
    pub prev_unhidden_position: Option<Point>,
    pub last_applied_layout: Option<Rect>,
    pub focus_stamp: u64,
}

impl Window {
    pub fn new(id: WindowId) -> Window {
        Window {
            id,
            last_floating_size: None,
            is_fullscreen: false,
            no_outer_gaps_in_fullscreen: false,
            layout_reason: LayoutReason::Standard,
            prev_unhidden_position: None,
            last_applied_layout: None,
            focus_stamp: 0,
        }
    }

    pub fn is_hidden_in_corner(&self) -> bool { self.prev_unhidden_position.is_some() }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TilingContainer {
    pub orientation: Orientation,
    pub layout: Layout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    pub name: String,
    /// The monitor this workspace was last shown on.
    pub assigned_monitor: Option<Point>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Window(Window),
    Tiling(TilingContainer),
    Workspace(Workspace),
    Special(SpecialKind),
}

impl NodeKind {
    fn describe(&self) -> &'static str {
        match self {
            NodeKind::Window(_) => "window",
            NodeKind::Tiling(_) => "tiling container",
            NodeKind::Workspace(_) => "workspace",
            NodeKind::Special(SpecialKind::NativeFullscreen) => "fullscreen container",
            NodeKind::Special(SpecialKind::NativeMinimized) => "minimized container",
            NodeKind::Special(SpecialKind::NativeHidden) => "hidden app container",
            NodeKind::Special(SpecialKind::Popup) => "popup container",
        }
    }

    pub fn parent_kind(&self) -> Option<ParentKind> {
        match self {
            NodeKind::Window(_) => None,
            NodeKind::Tiling(_) => Some(ParentKind::Tiling),
            NodeKind::Workspace(_) => Some(ParentKind::Workspace),
            NodeKind::Special(kind) => Some(ParentKind::Special(*kind)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Share of the parent's extent along the parent's orientation.
    pub weight: f64,
    pub kind: NodeKind,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> { self.parent }
    pub fn children(&self) -> &[NodeId] { &self.children }
}

/// How much space a newly bound node gets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weight {
    /// The average weight of the new siblings, or 1 when there are none.
    Auto,
    Exact(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    At(usize),
    Last,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("a {parent} can't contain a {child}")]
    Incompatible {
        child: &'static str,
        parent: &'static str,
    },
    #[error("workspace already has a {0}")]
    Duplicate(&'static str),
    #[error("a node can't be bound inside itself")]
    Cycle,
    #[error("node no longer exists")]
    Gone,
}

/// Where a node was before [`Tree::unbind`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detached {
    pub parent: NodeId,
    pub index: usize,
    pub weight: f64,
}

#[derive(Default)]
pub struct Tree {
    nodes: SlotMap<NodeId, Node>,
}

impl Index<NodeId> for Tree {
    type Output = Node;

    fn index(&self, index: NodeId) -> &Node { &self.nodes[index] }
}

impl IndexMut<NodeId> for Tree {
    fn index_mut(&mut self, index: NodeId) -> &mut Node { &mut self.nodes[index] }
}

impl Tree {
    pub fn new() -> Tree { Tree::default() }

    /// Creates a node that is not attached anywhere yet.
    pub fn insert(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.insert(Node {
            parent: None,
            children: Vec::new(),
            weight: 1.0,
            kind,
        })
    }

    pub fn contains(&self, node: NodeId) -> bool { self.nodes.contains_key(node) }

    pub fn get(&self, node: NodeId) -> Option<&Node> { self.nodes.get(node) }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> { self.nodes.get(node)?.parent }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes.get(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|&c| c == node)
    }

    pub fn parent_kind(&self, node: NodeId) -> Option<ParentKind> {
        self.nodes.get(self.parent(node)?)?.kind.parent_kind()
    }

    pub fn window(&self, node: NodeId) -> Option<&Window> {
        match &self.nodes.get(node)?.kind {
            NodeKind::Window(window) => Some(window),
            _ => None,
        }
    }

    pub fn window_mut(&mut self, node: NodeId) -> Option<&mut Window> {
        match &mut self.nodes.get_mut(node)?.kind {
            NodeKind::Window(window) => Some(window),
            _ => None,
        }
    }

    pub fn tiling(&self, node: NodeId) -> Option<&TilingContainer> {
        match &self.nodes.get(node)?.kind {
            NodeKind::Tiling(container) => Some(container),
            _ => None,
        }
    }

    pub fn tiling_mut(&mut self, node: NodeId) -> Option<&mut TilingContainer> {
        match &mut self.nodes.get_mut(node)?.kind {
            NodeKind::Tiling(container) => Some(container),
            _ => None,
        }
    }

    pub fn workspace(&self, node: NodeId) -> Option<&Workspace> {
        match &self.nodes.get(node)?.kind {
            NodeKind::Workspace(workspace) => Some(workspace),
            _ => None,
        }
    }

    pub fn workspace_mut(&mut self, node: NodeId) -> Option<&mut Workspace> {
        match &mut self.nodes.get_mut(node)?.kind {
            NodeKind::Workspace(workspace) => Some(workspace),
            _ => None,
        }
    }

    pub fn special_kind(&self, node: NodeId) -> Option<SpecialKind> {
        match self.nodes.get(node)?.kind {
            NodeKind::Special(kind) => Some(kind),
            _ => None,
        }
    }

    /// Returns the node itself followed by its parent, grandparent, and so on.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut next = self.contains(node).then_some(node);
        std::iter::from_fn(move || {
            let cur = next?;
            next = self.parent(cur);
            Some(cur)
        })
    }

    /// The workspace at the root of the node's tree.
    pub fn workspace_of(&self, node: NodeId) -> Option<NodeId> {
        self.ancestors(node).find(|&n| self.workspace(n).is_some())
    }

    pub fn is_detached(&self, node: NodeId) -> bool {
        self.parent(node).is_none() && self.workspace(node).is_none()
    }

    /// Visits `node` and all of its descendants, parents before children.
    pub fn preorder(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(cur) = stack.pop() {
            if !self.contains(cur) {
                continue;
            }
            out.push(cur);
            stack.extend(self.children(cur).iter().rev());
        }
        out
    }

    /// All window leaves under `node`, in tree order.
    pub fn leaf_windows(&self, node: NodeId) -> Vec<NodeId> {
        self.preorder(node).into_iter().filter(|&n| self.window(n).is_some()).collect()
    }

    fn check_accepts(&self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let parent_node = self.nodes.get(parent).ok_or(TreeError::Gone)?;
        let child_node = self.nodes.get(child).ok_or(TreeError::Gone)?;
        let incompatible = || TreeError::Incompatible {
            child: child_node.kind.describe(),
            parent: parent_node.kind.describe(),
        };
        match (&child_node.kind, &parent_node.kind) {
            (NodeKind::Workspace(_), _) | (_, NodeKind::Window(_)) => Err(incompatible()),
            (NodeKind::Window(_), _) => Ok(()),
            (NodeKind::Tiling(_), NodeKind::Tiling(_)) => Ok(()),
            (NodeKind::Tiling(_), NodeKind::Workspace(_)) => {
                let has_root = parent_node
                    .children
                    .iter()
                    .any(|&c| c != child && self.tiling(c).is_some());
                if has_root { Err(TreeError::Duplicate("root container")) } else { Ok(()) }
            }
            (NodeKind::Special(kind), NodeKind::Workspace(_)) => {
                let has_kind = parent_node
                    .children
                    .iter()
                    .any(|&c| c != child && self.special_kind(c) == Some(*kind));
                if has_kind { Err(TreeError::Duplicate(child_node.kind.describe())) } else { Ok(()) }
            }
            (NodeKind::Tiling(_) | NodeKind::Special(_), _) => Err(incompatible()),
        }
    }

    /// Attaches `node` under `parent`, detaching it from its current parent
    /// first.
    pub fn bind(
        &mut self,
        node: NodeId,
        parent: NodeId,
        weight: Weight,
        position: Position,
    ) -> Result<(), TreeError> {
        self.check_accepts(parent, node)?;
        if self.ancestors(parent).any(|n| n == node) {
            return Err(TreeError::Cycle);
        }
        self.unbind(node);

        let weight = match weight {
            Weight::Exact(weight) => weight,
            Weight::Auto => {
                let siblings = self.children(parent);
                if self.tiling(parent).is_some() && !siblings.is_empty() {
                    siblings.iter().map(|&c| self.nodes[c].weight).sum::<f64>()
                        / siblings.len() as f64
                } else {
                    1.0
                }
            }
        };

        let children = &mut self.nodes[parent].children;
        let index = match position {
            Position::At(i) => i.min(children.len()),
            Position::Last => children.len(),
        };
        children.insert(index, node);
        let node = &mut self.nodes[node];
        node.parent = Some(parent);
        node.weight = weight;
        Ok(())
    }

    /// Detaches `node` from its parent. The node and its subtree stay alive.
    pub fn unbind(&mut self, node: NodeId) -> Option<Detached> {
        let parent = self.nodes.get_mut(node)?.parent.take()?;
        let children = &mut self.nodes[parent].children;
        let index = children.iter().position(|&c| c == node)?;
        children.remove(index);
        Some(Detached {
            parent,
            index,
            weight: self.nodes[node].weight,
        })
    }

    /// Detaches `node` and frees it together with its subtree.
    pub fn remove(&mut self, node: NodeId) -> Option<Detached> {
        let detached = self.unbind(node);
        for id in self.preorder(node) {
            self.nodes.remove(id);
        }
        detached
    }

    /// Restores the structural invariants of the tiling tree under `root`.
    ///
    /// A tiling container with a single child is replaced by that child when
    /// `flatten` is set, except that the root keeps a single window child.
    /// Empty non-root containers are removed. With `opposite_orientation`, a
    /// nested container never shares its parent's orientation.
    pub fn normalize_containers(&mut self, root: NodeId, flatten: bool, opposite_orientation: bool) {
        let root = self.collapse(root, true, flatten);
        if opposite_orientation {
            self.alternate_orientation(root);
        }
    }

    /// Returns the node that ends up in the place of `container`.
    fn collapse(&mut self, container: NodeId, is_root: bool, flatten: bool) -> NodeId {
        let children = self.children(container).to_vec();
        if let &[only] = children.as_slice() {
            let only_is_tiling = self.tiling(only).is_some();
            if flatten && (only_is_tiling || !is_root) {
                if let Some(slot) = self.unbind(container) {
                    self.unbind(only);
                    self.nodes.remove(container);
                    if self.bind(only, slot.parent, Weight::Exact(slot.weight), Position::At(slot.index)).is_ok() {
                        return if only_is_tiling { self.collapse(only, is_root, flatten) } else { only };
                    }
                }
                return container;
            }
        }

        for child in children {
            if self.tiling(child).is_some() {
                self.collapse(child, false, flatten);
            }
        }
        if !is_root && self.children(container).is_empty() {
            self.remove(container);
        }
        container
    }

    fn alternate_orientation(&mut self, container: NodeId) {
        let parent_orientation =
            self.parent(container).and_then(|p| self.tiling(p)).map(|t| t.orientation);
        if let Some(tiling) = self.tiling_mut(container) {
            if Some(tiling.orientation) == parent_orientation {
                tiling.orientation = tiling.orientation.opposite();
            }
        }
        for child in self.children(container).to_vec() {
            if self.tiling(child).is_some() {
                self.alternate_orientation(child);
            }
        }
    }

    /// Renders the subtree for debug logs.
    pub fn draw(&self, node: NodeId) -> String {
        let mut out = String::new();
        if ascii_tree::write_tree(&mut out, &self.ascii_tree(node)).is_err() {
            out.clear();
        }
        out
    }

    fn ascii_tree(&self, node: NodeId) -> ascii_tree::Tree {
        let Some(n) = self.nodes.get(node) else {
            return ascii_tree::Tree::Leaf(vec!["<gone>".into()]);
        };
        let desc = match &n.kind {
            NodeKind::Window(w) => format!("window {} ({:.2})", w.id, n.weight),
            NodeKind::Tiling(t) => format!("{} {} ({:.2})", t.layout, t.orientation, n.weight),
            NodeKind::Workspace(ws) => format!("workspace {:?}", ws.name),
            kind => kind.describe().to_string(),
        };
        if n.children.is_empty() {
            ascii_tree::Tree::Leaf(vec![desc])
        } else {
            ascii_tree::Tree::Node(desc, n.children.iter().map(|&c| self.ascii_tree(c)).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    /// A tree with the following structure:
    /// ```text
    ///        workspace
    ///       /         \
    ///    root(h)      popup
    ///   /   |   \
    ///  w1  w2   inner(v)
    ///             |
    ///             w3
    /// ```
    struct TestTree {
        tree: Tree,
        ws: NodeId,
        root: NodeId,
        popup: NodeId,
        inner: NodeId,
        w1: NodeId,
        w2: NodeId,
        w3: NodeId,
    }

    fn tiling(orientation: Orientation) -> NodeKind {
        NodeKind::Tiling(TilingContainer { orientation, layout: Layout::Tiles })
    }

    fn window(idx: u32) -> NodeKind { NodeKind::Window(Window::new(WindowId::new(1, idx))) }

    impl TestTree {
        fn new() -> Self {
            let mut tree = Tree::new();
            let ws = tree.insert(NodeKind::Workspace(Workspace {
                name: "1".into(),
                assigned_monitor: None,
            }));
            let root = tree.insert(tiling(Orientation::Horizontal));
            let popup = tree.insert(NodeKind::Special(SpecialKind::Popup));
            let inner = tree.insert(tiling(Orientation::Vertical));
            let w1 = tree.insert(window(1));
            let w2 = tree.insert(window(2));
            let w3 = tree.insert(window(3));
            tree.bind(root, ws, Weight::Auto, Position::Last).unwrap();
            tree.bind(popup, ws, Weight::Auto, Position::Last).unwrap();
            tree.bind(w1, root, Weight::Auto, Position::Last).unwrap();
            tree.bind(w2, root, Weight::Auto, Position::Last).unwrap();
            tree.bind(inner, root, Weight::Auto, Position::Last).unwrap();
            tree.bind(w3, inner, Weight::Auto, Position::Last).unwrap();
            TestTree { tree, ws, root, popup, inner, w1, w2, w3 }
        }

        #[track_caller]
        fn assert_consistent(&self) {
            for id in self.tree.preorder(self.ws) {
                for &child in self.tree.children(id) {
                    assert_eq!(Some(id), self.tree.parent(child), "parent of child did not match");
                }
            }
        }
    }

    #[test]
    fn bind_places_children_in_order() {
        let t = TestTree::new();
        assert_eq!(t.tree.children(t.root), &[t.w1, t.w2, t.inner]);
        assert_eq!(t.tree.children(t.ws), &[t.root, t.popup]);
        assert_eq!(t.tree.leaf_windows(t.ws), vec![t.w1, t.w2, t.w3]);
        assert_eq!(t.tree.index_in_parent(t.inner), Some(2));
        t.assert_consistent();
    }

    #[test]
    fn bind_moves_between_parents() {
        let mut t = TestTree::new();
        t.tree.bind(t.w1, t.inner, Weight::Auto, Position::At(0)).unwrap();
        assert_eq!(t.tree.children(t.root), &[t.w2, t.inner]);
        assert_eq!(t.tree.children(t.inner), &[t.w1, t.w3]);
        assert_eq!(t.tree.parent_kind(t.w1), Some(ParentKind::Tiling));
        t.assert_consistent();
    }

    #[test]
    fn bind_position_is_clamped() {
        let mut t = TestTree::new();
        t.tree.bind(t.w1, t.root, Weight::Auto, Position::At(99)).unwrap();
        assert_eq!(t.tree.children(t.root), &[t.w2, t.inner, t.w1]);
    }

    #[test]
    fn auto_weight_is_sibling_average() {
        let mut t = TestTree::new();
        t.tree[t.w1].weight = 2.0;
        t.tree[t.w2].weight = 4.0;
        t.tree[t.inner].weight = 6.0;
        let w4 = t.tree.insert(window(4));
        t.tree.bind(w4, t.root, Weight::Auto, Position::Last).unwrap();
        assert_eq!(t.tree[w4].weight, 4.0);

        let floating = t.tree.insert(window(5));
        t.tree.bind(floating, t.ws, Weight::Auto, Position::Last).unwrap();
        assert_eq!(t.tree[floating].weight, 1.0);
    }

    #[test]
    fn bind_rejects_incompatible_parents() {
        let mut t = TestTree::new();
        let ws2 = t.tree.insert(NodeKind::Workspace(Workspace {
            name: "2".into(),
            assigned_monitor: None,
        }));
        assert!(matches!(
            t.tree.bind(ws2, t.root, Weight::Auto, Position::Last),
            Err(TreeError::Incompatible { .. })
        ));
        assert!(matches!(
            t.tree.bind(t.w2, t.w1, Weight::Auto, Position::Last),
            Err(TreeError::Incompatible { .. })
        ));
        assert!(matches!(
            t.tree.bind(t.inner, t.popup, Weight::Auto, Position::Last),
            Err(TreeError::Incompatible { .. })
        ));
        let second_root = t.tree.insert(tiling(Orientation::Vertical));
        assert_eq!(
            t.tree.bind(second_root, t.ws, Weight::Auto, Position::Last),
            Err(TreeError::Duplicate("root container"))
        );
        let second_popup = t.tree.insert(NodeKind::Special(SpecialKind::Popup));
        assert!(matches!(
            t.tree.bind(second_popup, t.ws, Weight::Auto, Position::Last),
            Err(TreeError::Duplicate(_))
        ));
        // Failed binds leave the tree untouched.
        assert_eq!(t.tree.children(t.root), &[t.w1, t.w2, t.inner]);
        t.assert_consistent();
    }

    #[test]
    fn unbind_returns_former_slot() {
        let mut t = TestTree::new();
        t.tree[t.w2].weight = 3.0;
        let detached = t.tree.unbind(t.w2).unwrap();
        assert_eq!(detached, Detached { parent: t.root, index: 1, weight: 3.0 });
        assert!(t.tree.is_detached(t.w2));
        assert_eq!(t.tree.unbind(t.w2), None);
        assert_eq!(t.tree.children(t.root), &[t.w1, t.inner]);
    }

    #[test]
    fn remove_frees_subtree() {
        let mut t = TestTree::new();
        t.tree.remove(t.inner);
        assert!(!t.tree.contains(t.inner));
        assert!(!t.tree.contains(t.w3));
        assert_eq!(t.tree.leaf_windows(t.ws), vec![t.w1, t.w2]);
    }

    #[test]
    fn workspace_of_walks_to_root() {
        let mut t = TestTree::new();
        assert_eq!(t.tree.workspace_of(t.w3), Some(t.ws));
        assert_eq!(t.tree.ancestors(t.w3).collect::<Vec<_>>(), vec![t.w3, t.inner, t.root, t.ws]);
        t.tree.unbind(t.inner);
        assert_eq!(t.tree.workspace_of(t.w3), None);
    }

    #[test]
    fn single_child_container_is_replaced_by_child() {
        let mut t = TestTree::new();
        t.tree[t.inner].weight = 5.0;
        t.tree.normalize_containers(t.root, true, false);
        assert!(!t.tree.contains(t.inner));
        assert_eq!(t.tree.children(t.root), &[t.w1, t.w2, t.w3]);
        assert_eq!(t.tree[t.w3].weight, 5.0);
        t.assert_consistent();
    }

    #[test]
    fn flattening_can_be_disabled() {
        let mut t = TestTree::new();
        t.tree.normalize_containers(t.root, false, false);
        assert_eq!(t.tree.children(t.inner), &[t.w3]);
    }

    #[test]
    fn empty_containers_are_removed() {
        let mut t = TestTree::new();
        t.tree.unbind(t.w3);
        t.tree.normalize_containers(t.root, true, false);
        assert!(!t.tree.contains(t.inner));
        assert_eq!(t.tree.children(t.root), &[t.w1, t.w2]);
    }

    #[test]
    fn root_keeps_single_window_but_not_single_container() {
        let mut t = TestTree::new();
        t.tree.unbind(t.w1);
        t.tree.unbind(t.w2);
        t.tree.normalize_containers(t.root, true, false);
        // root(h) -> inner(v) -> w3 collapses into a root that holds w3.
        let root = t.tree.children(t.ws)
            .iter()
            .copied()
            .find(|&c| t.tree.tiling(c).is_some())
            .unwrap();
        assert_eq!(t.tree.children(root), &[t.w3]);
        assert_eq!(t.tree.tiling(root).unwrap().orientation, Orientation::Vertical);
        t.assert_consistent();

        t.tree.normalize_containers(root, true, false);
        assert_eq!(t.tree.children(root), &[t.w3]);
    }

    #[test]
    fn empty_root_survives() {
        let mut t = TestTree::new();
        t.tree.remove(t.inner);
        t.tree.unbind(t.w1);
        t.tree.unbind(t.w2);
        t.tree.normalize_containers(t.root, true, false);
        assert!(t.tree.contains(t.root));
        assert!(t.tree.children(t.root).is_empty());
    }

    #[test]
    fn nested_orientation_alternates() {
        let mut t = TestTree::new();
        t.tree.tiling_mut(t.inner).unwrap().orientation = Orientation::Horizontal;
        let w4 = t.tree.insert(window(4));
        t.tree.bind(w4, t.inner, Weight::Auto, Position::Last).unwrap();
        t.tree.normalize_containers(t.root, true, true);
        assert_eq!(t.tree.tiling(t.inner).unwrap().orientation, Orientation::Vertical);
        assert_eq!(t.tree.tiling(t.root).unwrap().orientation, Orientation::Horizontal);
    }

    #[test]
    fn draw_lists_nodes() {
        let t = TestTree::new();
        let drawing = t.tree.draw(t.ws);
        assert!(drawing.contains("workspace \"1\""));
        assert!(drawing.contains("window 1:3"));
        assert!(drawing.contains("popup container"));
    }
}
