//! The model of everything the window manager knows about.
//!
//! [`World`] owns the tree, the window registry, the workspaces keyed by name,
//! the monitors and the focus. It is only touched from the coordination
//! context.

use std::time::Instant;

use once_cell::sync::Lazy;
use tracing::{debug, trace};

use super::classify::WindowClass;
use super::closed_windows::{ClosedWindow, Placement};
use super::tree::{
    Layout, NodeId, NodeKind, Orientation, ParentKind, Position, SpecialKind, TilingContainer,
    Tree, TreeError, Weight, Window, Workspace,
};
use crate::common::collections::{BTreeMap, HashMap, HashSet};
use crate::common::config::{LayoutSettings, WorkspaceSettings};
use crate::sys::ax::{MonitorInfo, WindowId, pid_t};
use crate::sys::geometry::{Point, Rect};

const FALLBACK_FRAME: Rect = Rect::new(0.0, 0.0, 1920.0, 1080.0);

/// Stands in while monitors are being rebuilt.
static FALLBACK_MONITOR: Lazy<Monitor> = Lazy::new(|| Monitor {
    frame: FALLBACK_FRAME,
    visible_frame: FALLBACK_FRAME,
    active_workspace: NodeId::default(),
});

#[derive(Debug, Clone, PartialEq)]
pub struct Monitor {
    pub frame: Rect,
    pub visible_frame: Rect,
    pub active_workspace: NodeId,
}

impl Monitor {
    /// Monitors are identified by their top-left corner.
    pub fn key(&self) -> Point { self.frame.top_left() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Focus {
    pub workspace: NodeId,
    pub window: Option<WindowId>,
}

/// What was left behind when a window was removed.
#[derive(Debug, Clone)]
pub struct RemovedWindow {
    pub window: Window,
    pub workspace: Option<NodeId>,
    pub parent_kind: Option<ParentKind>,
    pub placement: Option<(String, Placement)>,
    pub weight: f64,
}

pub struct World {
    pub tree: Tree,
    windows: HashMap<WindowId, NodeId>,
    workspaces: BTreeMap<String, NodeId>,
    monitors: Vec<Monitor>,
    focus: Focus,
    prev_focused_workspace: Option<(NodeId, Instant)>,
    focus_counter: u64,
    layout: LayoutSettings,
    workspace_settings: WorkspaceSettings,
}

impl World {
    pub fn new(
        layout: LayoutSettings,
        workspace_settings: WorkspaceSettings,
        monitors: &[MonitorInfo],
    ) -> World {
        let mut world = World {
            tree: Tree::new(),
            windows: HashMap::default(),
            workspaces: BTreeMap::new(),
            monitors: Vec::new(),
            focus: Focus { workspace: NodeId::default(), window: None },
            prev_focused_workspace: None,
            focus_counter: 0,
            layout,
            workspace_settings,
        };
        let fallback = [MonitorInfo { frame: FALLBACK_FRAME, visible_frame: FALLBACK_FRAME }];
        world.refresh_monitors(if monitors.is_empty() { &fallback } else { monitors });
        for name in world.workspace_settings.persistent.clone() {
            world.ensure_workspace(&name);
        }
        world
    }

    pub fn layout_settings(&self) -> &LayoutSettings { &self.layout }

    pub fn set_layout_settings(&mut self, layout: LayoutSettings) { self.layout = layout; }

    // Workspaces.

    pub fn workspace_named(&self, name: &str) -> Option<NodeId> { self.workspaces.get(name).copied() }

    pub fn workspaces(&self) -> impl Iterator<Item = NodeId> + '_ { self.workspaces.values().copied() }

    pub fn workspace_name(&self, ws: NodeId) -> &str {
        self.tree.workspace(ws).map(|w| w.name.as_str()).unwrap_or_default()
    }

    pub fn ensure_workspace(&mut self, name: &str) -> NodeId {
        let frame = self.main_monitor().unwrap_or(&FALLBACK_MONITOR).visible_frame;
        self.ensure_workspace_on(name, frame)
    }

    fn ensure_workspace_on(&mut self, name: &str, frame: Rect) -> NodeId {
        if let Some(ws) = self.workspace_named(name) {
            return ws;
        }
        let ws = self.tree.insert(NodeKind::Workspace(Workspace {
            name: name.to_owned(),
            assigned_monitor: None,
        }));
        self.workspaces.insert(name.to_owned(), ws);
        self.create_root(ws, frame);
        debug!(name, "created workspace");
        ws
    }

    /// The root tiling container of `ws`, created if missing.
    pub fn root_container(&mut self, ws: NodeId) -> NodeId {
        match self.find_root(ws) {
            Some(root) => root,
            None => self.create_root(ws, self.monitor_of(ws).visible_frame),
        }
    }

    fn create_root(&mut self, ws: NodeId, frame: Rect) -> NodeId {
        let orientation = self.layout.default_orientation.unwrap_or(if frame.width() >= frame.height() {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        });
        let root = self.tree.insert(NodeKind::Tiling(TilingContainer {
            orientation,
            layout: self.layout.default_root_layout,
        }));
        self.bind_or_drop(root, ws, Position::At(0));
        root
    }

    pub fn find_root(&self, ws: NodeId) -> Option<NodeId> {
        self.tree.children(ws).iter().copied().find(|&c| self.tree.tiling(c).is_some())
    }

    /// The container of `kind` under `ws`, created if missing.
    pub fn special_container(&mut self, ws: NodeId, kind: SpecialKind) -> NodeId {
        if let Some(c) = self.find_special(ws, kind) {
            return c;
        }
        let container = self.tree.insert(NodeKind::Special(kind));
        self.bind_or_drop(container, ws, Position::Last);
        container
    }

    pub fn find_special(&self, ws: NodeId, kind: SpecialKind) -> Option<NodeId> {
        self.tree.children(ws).iter().copied().find(|&c| self.tree.special_kind(c) == Some(kind))
    }

    fn bind_or_drop(&mut self, node: NodeId, parent: NodeId, position: Position) {
        if let Err(err) = self.tree.bind(node, parent, Weight::Auto, position) {
            debug!(?err, "dropping container");
            self.tree.remove(node);
        }
    }

    pub fn floating_windows(&self, ws: NodeId) -> Vec<NodeId> {
        self.tree.children(ws).iter().copied().filter(|&c| self.tree.window(c).is_some()).collect()
    }

    /// Windows that make a workspace non-empty; popups don't count.
    pub fn workspace_windows(&self, ws: NodeId) -> Vec<NodeId> {
        self.tree
            .leaf_windows(ws)
            .into_iter()
            .filter(|&w| self.tree.parent_kind(w) != Some(ParentKind::Special(SpecialKind::Popup)))
            .collect()
    }

    pub fn is_effectively_empty(&self, ws: NodeId) -> bool { self.workspace_windows(ws).is_empty() }

    pub fn is_visible(&self, ws: NodeId) -> bool {
        self.monitors.iter().any(|m| m.active_workspace == ws)
    }

    // Monitors.

    pub fn monitors(&self) -> &[Monitor] { &self.monitors }

    pub fn main_monitor(&self) -> Option<&Monitor> { self.monitors.first() }

    /// The monitor `ws` is shown on, or would be shown on when activated.
    pub fn monitor_of(&self, ws: NodeId) -> &Monitor {
        let assigned = self.tree.workspace(ws).and_then(|w| w.assigned_monitor);
        self.monitors
            .iter()
            .find(|m| m.active_workspace == ws)
            .or_else(|| self.monitors.iter().find(|m| Some(m.key()) == assigned))
            .or(self.monitors.first())
            .unwrap_or(&FALLBACK_MONITOR)
    }

    /// The monitor containing `point`, or the closest one.
    pub fn monitor_approximation(&self, point: Point) -> Option<&Monitor> {
        self.monitors.iter().find(|m| m.frame.contains(point)).or_else(|| {
            self.monitors.iter().min_by(|a, b| {
                let da = a.frame.center().distance_to(point);
                let db = b.frame.center().distance_to(point);
                da.total_cmp(&db)
            })
        })
    }

    /// Reconciles monitors with what the window server reports.
    ///
    /// Monitors that survive keep their active workspace. New monitors get a
    /// workspace that was last shown there, else the first free configured
    /// name, else the next free number. Workspaces whose monitor vanished fall
    /// back to the main monitor.
    pub fn refresh_monitors(&mut self, infos: &[MonitorInfo]) {
        if infos.is_empty() {
            return;
        }
        let old = std::mem::take(&mut self.monitors);
        let mut used = HashSet::default();
        for info in infos {
            let key = info.frame.top_left();
            let kept = old
                .iter()
                .find(|m| m.key() == key)
                .map(|m| m.active_workspace)
                .filter(|ws| self.tree.workspace(*ws).is_some() && !used.contains(ws));
            let active = match kept {
                Some(ws) => ws,
                None => self.stub_workspace(key, info.visible_frame, &used),
            };
            used.insert(active);
            if let Some(ws) = self.tree.workspace_mut(active) {
                ws.assigned_monitor = Some(key);
            }
            self.monitors.push(Monitor {
                frame: info.frame,
                visible_frame: info.visible_frame,
                active_workspace: active,
            });
        }

        let keys: Vec<Point> = self.monitors.iter().map(|m| m.key()).collect();
        for ws in self.workspaces.values().copied().collect::<Vec<_>>() {
            if let Some(w) = self.tree.workspace_mut(ws) {
                if w.assigned_monitor.is_some_and(|k| !keys.contains(&k)) {
                    w.assigned_monitor = None;
                }
            }
        }
        if old.len() != self.monitors.len() {
            debug!(count = self.monitors.len(), "monitor topology changed");
        }
        self.fix_focus();
    }

    fn stub_workspace(&mut self, key: Point, frame: Rect, used: &HashSet<NodeId>) -> NodeId {
        let free = |world: &World, ws: NodeId| !used.contains(&ws) && !world.is_visible(ws);
        let assigned_here = self.workspaces.values().copied().find(|&ws| {
            free(self, ws) && self.tree.workspace(ws).and_then(|w| w.assigned_monitor) == Some(key)
        });
        if let Some(ws) = assigned_here {
            return ws;
        }

        let usable = |world: &World, name: &str| match world.workspace_named(name) {
            None => true,
            Some(ws) => free(world, ws) && world.is_effectively_empty(ws),
        };
        let name = self
            .workspace_settings
            .names
            .iter()
            .find(|name| usable(self, name.as_str()))
            .cloned()
            .or_else(|| (1..).map(|n: u32| n.to_string()).find(|name| usable(self, name.as_str())))
            .unwrap_or_default();
        self.ensure_workspace_on(&name, frame)
    }

    /// Makes `ws` the active workspace of the monitor it belongs to.
    pub fn activate_workspace(&mut self, ws: NodeId) {
        if self.is_visible(ws) || self.tree.workspace(ws).is_none() {
            return;
        }
        let key = self.monitor_of(ws).key();
        trace!(name = self.workspace_name(ws), "activating workspace");
        if let Some(monitor) = self.monitors.iter_mut().find(|m| m.key() == key) {
            monitor.active_workspace = ws;
        }
        if let Some(w) = self.tree.workspace_mut(ws) {
            w.assigned_monitor = Some(key);
        }
    }

    // Focus and most-recently-used order.

    pub fn focus(&self) -> Focus { self.focus }

    pub fn prev_focused_workspace(&self) -> Option<(NodeId, Instant)> { self.prev_focused_workspace }

    fn set_focus_workspace(&mut self, ws: NodeId) {
        if ws != self.focus.workspace && self.tree.workspace(self.focus.workspace).is_some() {
            self.prev_focused_workspace = Some((self.focus.workspace, Instant::now()));
        }
        self.focus.workspace = ws;
        self.activate_workspace(ws);
    }

    /// Focuses `id` and marks it most recently used. Returns false when the
    /// window is unknown or not in any workspace.
    pub fn focus_window(&mut self, id: WindowId) -> bool {
        let Some(node) = self.window_node(id) else { return false };
        let Some(ws) = self.tree.workspace_of(node) else { return false };
        self.focus_counter += 1;
        let stamp = self.focus_counter;
        if let Some(window) = self.tree.window_mut(node) {
            window.focus_stamp = stamp;
        }
        self.set_focus_workspace(ws);
        self.focus.window = Some(id);
        true
    }

    /// Focuses `ws` and its most recently used window.
    pub fn focus_workspace(&mut self, ws: NodeId) {
        match self.most_recent_window(ws) {
            Some(id) => {
                self.focus_window(id);
            }
            None => {
                self.set_focus_workspace(ws);
                self.focus.window = None;
            }
        }
    }

    /// The most recently focused window under `node`, ignoring popups and
    /// minimized windows. Without any focus history the last window wins.
    pub fn most_recent_window_under(&self, node: NodeId) -> Option<NodeId> {
        self.tree
            .leaf_windows(node)
            .into_iter()
            .enumerate()
            .filter(|&(_, w)| {
                !matches!(
                    self.tree.parent_kind(w),
                    Some(ParentKind::Special(SpecialKind::Popup | SpecialKind::NativeMinimized))
                )
            })
            .max_by_key(|&(order, w)| (self.tree.window(w).map_or(0, |w| w.focus_stamp), order))
            .map(|(_, w)| w)
    }

    pub fn most_recent_window(&self, ws: NodeId) -> Option<WindowId> {
        let node = self.most_recent_window_under(ws)?;
        self.tree.window(node).map(|w| w.id)
    }

    /// Keeps focus pointing at something that exists and is visible.
    pub fn fix_focus(&mut self) {
        if self.tree.workspace(self.focus.workspace).is_none() {
            let Some(ws) = self.main_monitor().map(|m| m.active_workspace) else { return };
            self.focus = Focus { workspace: ws, window: None };
        }
        match self.focus.window.and_then(|id| self.window_node(id)) {
            Some(node) => {
                if let Some(ws) = self.tree.workspace_of(node) {
                    if ws != self.focus.workspace {
                        self.set_focus_workspace(ws);
                    }
                }
            }
            None => self.focus.window = self.most_recent_window(self.focus.workspace),
        }
        self.activate_workspace(self.focus.workspace);
    }

    // Window registry.

    pub fn window_node(&self, id: WindowId) -> Option<NodeId> { self.windows.get(&id).copied() }

    pub fn window(&self, id: WindowId) -> Option<&Window> { self.tree.window(self.window_node(id)?) }

    pub fn window_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        let node = self.window_node(id)?;
        self.tree.window_mut(node)
    }

    pub fn contains_window(&self, id: WindowId) -> bool { self.windows.contains_key(&id) }

    pub fn window_ids(&self) -> Vec<WindowId> {
        let mut ids: Vec<_> = self.windows.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn windows_of(&self, pid: pid_t) -> Vec<WindowId> {
        let mut ids: Vec<_> = self.windows.keys().copied().filter(|id| id.pid == pid).collect();
        ids.sort();
        ids
    }

    pub fn workspace_of_window(&self, id: WindowId) -> Option<NodeId> {
        self.tree.workspace_of(self.window_node(id)?)
    }

    /// Where a new window of `class` goes in `ws`.
    pub fn binding_for(&mut self, ws: NodeId, class: WindowClass) -> (NodeId, Position) {
        match class {
            WindowClass::Popup => (self.special_container(ws, SpecialKind::Popup), Position::Last),
            WindowClass::Dialog => (ws, Position::Last),
            WindowClass::Tiling => self.tiling_binding(ws),
        }
    }

    /// Next to the most recent window when it tiles, else the end of the root.
    pub fn tiling_binding(&mut self, ws: NodeId) -> (NodeId, Position) {
        if let Some(mru) = self.most_recent_window_under(ws) {
            if let (Some(parent), Some(index)) = (self.tree.parent(mru), self.tree.index_in_parent(mru)) {
                if self.tree.tiling(parent).is_some() {
                    return (parent, Position::At(index + 1));
                }
            }
        }
        (self.root_container(ws), Position::Last)
    }

    pub fn add_window(
        &mut self,
        window: Window,
        parent: NodeId,
        weight: Weight,
        position: Position,
    ) -> Result<NodeId, TreeError> {
        let id = window.id;
        let node = self.tree.insert(NodeKind::Window(window));
        if let Err(err) = self.tree.bind(node, parent, weight, position) {
            self.tree.remove(node);
            return Err(err);
        }
        if let Some(old) = self.windows.insert(id, node) {
            self.tree.remove(old);
        }
        Ok(node)
    }

    /// Moves an already registered window.
    pub fn move_window(
        &mut self,
        id: WindowId,
        parent: NodeId,
        weight: Weight,
        position: Position,
    ) -> Result<(), TreeError> {
        let node = self.window_node(id).ok_or(TreeError::Gone)?;
        self.tree.bind(node, parent, weight, position)
    }

    /// Evicts `id` from the registry and the tree.
    pub fn remove_window(&mut self, id: WindowId) -> Option<RemovedWindow> {
        let node = self.windows.remove(&id)?;
        let workspace = self.tree.workspace_of(node);
        let parent_kind = self.tree.parent_kind(node);
        let placement = self.placement_of(node);
        let weight = self.tree.get(node).map_or(1.0, |n| n.weight);
        let window = self.tree.window(node).cloned().unwrap_or_else(|| Window::new(id));
        self.tree.remove(node);
        if self.focus.window == Some(id) {
            self.focus.window = None;
        }
        Some(RemovedWindow { window, workspace, parent_kind, placement, weight })
    }

    fn placement_of(&self, node: NodeId) -> Option<(String, Placement)> {
        let ws = self.tree.workspace_of(node)?;
        let name = self.workspace_name(ws).to_owned();
        let parent = self.tree.parent(node)?;
        let placement = match self.tree.parent_kind(node)? {
            ParentKind::Workspace => Placement::Floating,
            ParentKind::Special(kind) => Placement::Special(kind),
            ParentKind::Tiling => {
                let mut path = Vec::new();
                for container in self.tree.ancestors(parent) {
                    if self.tree.parent(container) == Some(ws) {
                        break;
                    }
                    path.push(self.tree.index_in_parent(container)?);
                }
                path.reverse();
                Placement::Tiling { path, index: self.tree.index_in_parent(node)? }
            }
        };
        Some((name, placement))
    }

    /// Re-registers a window that disappeared moments ago in the slot it was
    /// in, or as close to it as the current tree allows.
    pub fn restore_window(&mut self, mut window: Window, closed: &ClosedWindow) -> Result<NodeId, TreeError> {
        let ws = self.ensure_workspace(&closed.workspace);
        window.layout_reason = closed.layout_reason;
        window.last_floating_size = closed.last_floating_size;
        let (parent, position) = match &closed.placement {
            Placement::Floating => (ws, Position::Last),
            Placement::Special(kind) => (self.special_container(ws, *kind), Position::Last),
            Placement::Tiling { path, index } => {
                let mut parent = self.root_container(ws);
                for &i in path {
                    match self.tree.children(parent).get(i) {
                        Some(&child) if self.tree.tiling(child).is_some() => parent = child,
                        _ => break,
                    }
                }
                (parent, Position::At(*index))
            }
        };
        self.add_window(window, parent, Weight::Exact(closed.weight), position)
    }

    // Normalization.

    pub fn normalize_containers(&mut self) {
        for ws in self.workspaces.values().copied().collect::<Vec<_>>() {
            let root = self.root_container(ws);
            self.tree.normalize_containers(
                root,
                self.layout.normalize_flatten_containers,
                self.layout.normalize_opposite_orientation_for_nested_containers,
            );
        }
    }

    /// Drops workspaces nobody can see or reach.
    pub fn gc_workspaces(&mut self) {
        for name in self.workspace_settings.persistent.clone() {
            self.ensure_workspace(&name);
        }
        let persistent: HashSet<String> = self.workspace_settings.persistent.iter().cloned().collect();
        let unused: Vec<(String, NodeId)> = self
            .workspaces
            .iter()
            .filter(|&(name, &ws)| {
                !persistent.contains(name)
                    && ws != self.focus.workspace
                    && !self.is_visible(ws)
                    && self.is_effectively_empty(ws)
            })
            .map(|(name, &ws)| (name.clone(), ws))
            .collect();

        for (name, ws) in unused {
            if self.workspaces.len() <= 1 {
                break;
            }
            // Popups are not tied to a workspace in any visible way; keep them
            // tracked under the focused one.
            let popups = self.tree.leaf_windows(ws);
            if !popups.is_empty() {
                let target = self.special_container(self.focus.workspace, SpecialKind::Popup);
                for popup in popups {
                    if let Err(err) = self.tree.bind(popup, target, Weight::Auto, Position::Last) {
                        debug!(?err, "could not move popup out of removed workspace");
                    }
                }
            }
            self.workspaces.remove(&name);
            for node in self.tree.leaf_windows(ws) {
                if let Some(w) = self.tree.window(node) {
                    self.windows.remove(&w.id);
                }
            }
            self.tree.remove(ws);
            debug!(name, "removed unused workspace");
        }
    }

    /// Applied once at startup to the focused workspace: small roots tile,
    /// big ones stack.
    pub fn apply_smart_layout(&mut self) {
        let root = self.root_container(self.focus.workspace);
        let count = self.tree.children(root).len();
        let threshold = self.layout.smart_layout_threshold;
        if let Some(tiling) = self.tree.tiling_mut(root) {
            tiling.layout = if count <= threshold { Layout::Tiles } else { Layout::Accordion };
        }
    }

    pub fn draw(&self) -> String {
        self.workspaces.values().map(|&ws| self.tree.draw(ws)).collect::<Vec<_>>().join("")
    }

    /// Checks that the registry and the tree describe the same set of windows.
    #[cfg(test)]
    #[track_caller]
    pub fn assert_consistent(&self) {
        let mut reachable = HashMap::default();
        for ws in self.workspaces() {
            assert!(self.tree.parent(ws).is_none(), "workspace has a parent");
            for node in self.tree.preorder(ws) {
                for &child in self.tree.children(node) {
                    assert_eq!(self.tree.parent(child), Some(node), "parent link mismatch");
                }
                if let Some(w) = self.tree.window(node) {
                    assert!(reachable.insert(w.id, node).is_none(), "window {} reachable twice", w.id);
                }
            }
            assert!(self.find_root(ws).is_some(), "workspace without root container");
        }
        assert_eq!(reachable, self.windows, "registry and tree disagree");
        for monitor in &self.monitors {
            assert!(self.tree.workspace(monitor.active_workspace).is_some());
        }
        let mut seen = HashSet::default();
        assert!(self.monitors.iter().all(|m| seen.insert(m.active_workspace)));
    }
}
