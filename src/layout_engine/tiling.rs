//! Frame calculation for a workspace.
//!
//! Layout is split in two: [`calculate_layout`] reads the tree and produces
//! frames plus the weights the tree should adopt, and [`LayoutResult::apply`]
//! writes those weights back. Nothing here talks to the OS.

use tracing::trace;

use crate::common::config::{GapSettings, OuterGaps};
use crate::model::tree::{Layout, NodeId, NodeKind, Orientation};
use crate::model::world::World;
use crate::sys::ax::WindowId;
use crate::sys::geometry::{Point, Rect, Size};

#[derive(Debug, Default, PartialEq)]
pub struct LayoutResult {
    /// Frames for tiled windows and fullscreen windows, in tree order.
    pub frames: Vec<(WindowId, Rect)>,
    /// Floating windows that keep their own frame.
    pub floating: Vec<WindowId>,
    weights: Vec<(NodeId, f64)>,
    /// Tiled windows whose model fullscreen flag no longer applies.
    cleared_fullscreen: Vec<NodeId>,
}

impl LayoutResult {
    /// Stores rescaled weights and applied frames in the tree.
    pub fn apply(&self, world: &mut World) {
        for &(node, weight) in &self.weights {
            if let Some(n) = world.tree.get(node) {
                if n.weight != weight {
                    world.tree[node].weight = weight;
                }
            }
        }
        for &node in &self.cleared_fullscreen {
            if let Some(window) = world.tree.window_mut(node) {
                window.is_fullscreen = false;
            }
        }
        for &(id, rect) in &self.frames {
            if let Some(window) = world.window_mut(id) {
                window.last_applied_layout = Some(rect);
            }
        }
    }
}

pub fn inset_by_outer_gaps(rect: Rect, gaps: &OuterGaps) -> Rect {
    rect.inset(gaps.top, gaps.left, gaps.bottom, gaps.right)
}

struct Context<'a> {
    world: &'a World,
    gaps: &'a GapSettings,
    accordion_padding: f64,
    /// The window the root container would show in front.
    root_mru: Option<NodeId>,
    fullscreen_rect: Rect,
    fullscreen_rect_without_gaps: Rect,
}

/// Computes frames for every laid-out window of `ws`.
pub fn calculate_layout(world: &World, ws: NodeId, gaps: &GapSettings) -> LayoutResult {
    let mut result = LayoutResult::default();
    let Some(root) = world.find_root(ws) else { return result };
    let visible = world.monitor_of(ws).visible_frame;
    let rect = inset_by_outer_gaps(visible, &gaps.outer);
    let cx = Context {
        world,
        gaps,
        accordion_padding: world.layout_settings().accordion_padding,
        root_mru: world.most_recent_window_under(root),
        fullscreen_rect: rect,
        fullscreen_rect_without_gaps: visible,
    };

    // Some monitor arrangements keep a window from taking the full height of
    // the area; one pixel less avoids that.
    layout_node(&cx, root, rect.origin, rect.width(), rect.height() - 1.0, &mut result);

    for &child in world.tree.children(ws) {
        let Some(window) = world.tree.window(child) else { continue };
        if window.is_fullscreen {
            result.frames.push((window.id, fullscreen_rect(&cx, child)));
        } else {
            result.floating.push(window.id);
        }
    }
    trace!(frames = result.frames.len(), "calculated layout");
    result
}

fn fullscreen_rect(cx: &Context<'_>, node: NodeId) -> Rect {
    let no_gaps = cx.world.tree.window(node).is_some_and(|w| w.no_outer_gaps_in_fullscreen);
    if no_gaps { cx.fullscreen_rect_without_gaps } else { cx.fullscreen_rect }
}

fn offset(point: Point, orientation: Orientation, by: f64) -> Point {
    match orientation {
        Orientation::Horizontal => Point::new(point.x + by, point.y),
        Orientation::Vertical => Point::new(point.x, point.y + by),
    }
}

fn layout_node(
    cx: &Context<'_>,
    node: NodeId,
    point: Point,
    width: f64,
    height: f64,
    result: &mut LayoutResult,
) {
    let tree = &cx.world.tree;
    let Some(n) = tree.get(node) else { return };
    match &n.kind {
        NodeKind::Window(window) => {
            if window.is_fullscreen && cx.root_mru == Some(node) {
                result.frames.push((window.id, fullscreen_rect(cx, node)));
            } else {
                if window.is_fullscreen {
                    result.cleared_fullscreen.push(node);
                }
                let rect = Rect::from_parts(point, Size::new(width.max(0.0), height.max(0.0)));
                result.frames.push((window.id, rect));
            }
        }
        NodeKind::Tiling(container) => match container.layout {
            Layout::Tiles => layout_tiles(cx, node, container.orientation, point, width, height, result),
            Layout::Accordion => {
                layout_accordion(cx, node, container.orientation, point, width, height, result)
            }
        },
        NodeKind::Workspace(_) | NodeKind::Special(_) => {}
    }
}

fn layout_tiles(
    cx: &Context<'_>,
    container: NodeId,
    orientation: Orientation,
    mut point: Point,
    width: f64,
    height: f64,
    result: &mut LayoutResult,
) {
    let tree = &cx.world.tree;
    let children = tree.children(container);
    if children.is_empty() {
        return;
    }
    let extent = match orientation {
        Orientation::Horizontal => width,
        Orientation::Vertical => height,
    };
    let sum: f64 = children.iter().map(|&c| tree[c].weight).sum();
    // Weights are rescaled so they add up to the container's extent.
    let delta = (extent - sum) / children.len() as f64;
    let raw_gap = cx.gaps.inner.along(orientation);
    let last = children.len() - 1;

    for (i, &child) in children.iter().enumerate() {
        let weight = tree[child].weight + delta;
        result.weights.push((child, weight));
        let gap = raw_gap - if i == 0 { raw_gap / 2.0 } else { 0.0 } - if i == last { raw_gap / 2.0 } else { 0.0 };
        let start = if i == 0 { point } else { offset(point, orientation, raw_gap / 2.0) };
        let (w, h) = match orientation {
            Orientation::Horizontal => (weight - gap, height),
            Orientation::Vertical => (width, weight - gap),
        };
        layout_node(cx, child, start, w, h, result);
        point = offset(point, orientation, weight);
    }
}

fn layout_accordion(
    cx: &Context<'_>,
    container: NodeId,
    orientation: Orientation,
    point: Point,
    width: f64,
    height: f64,
    result: &mut LayoutResult,
) {
    let tree = &cx.world.tree;
    let children = tree.children(container);
    let Some(mru) = cx.world.most_recent_window_under(container) else { return };
    let Some(mru_index) = children.iter().position(|&c| tree.ancestors(mru).any(|a| a == c)) else {
        return;
    };
    let padding = cx.accordion_padding;
    let last = children.len() - 1;

    for (index, &child) in children.iter().enumerate() {
        let (before, after) = if children.len() == 1 {
            (0.0, 0.0)
        } else if index == 0 {
            (0.0, padding)
        } else if index == last {
            (padding, 0.0)
        } else if index + 1 == mru_index {
            (0.0, 2.0 * padding)
        } else if index == mru_index + 1 {
            (2.0 * padding, 0.0)
        } else {
            (padding, padding)
        };
        let start = offset(point, orientation, before);
        let (w, h) = match orientation {
            Orientation::Horizontal => (width - before - after, height),
            Orientation::Vertical => (width, height - before - after),
        };
        layout_node(cx, child, start, w, h, result);
    }
}

/// Where a floating window keeps its relative position when its workspace is
/// shown on another monitor.
pub fn relocate_floating(top_left: Point, from: Rect, to: Rect) -> Point {
    let x = (top_left.x - from.min_x()) / from.width();
    let y = (top_left.y - from.min_y()) / from.height();
    Point::new(to.min_x() + x * to.width(), to.min_y() + y * to.height())
}
