use tracing::{instrument, trace};

use super::Session;
use crate::actor::app::Cancelled;
use crate::layout_engine::{
    HideCorner, calculate_layout, hide_position, optimal_hide_corner, relocate_floating,
};
use crate::model::tree::{NodeId, ParentKind, SpecialKind};
use crate::sys::geometry::{Point, Rect, Size};

impl Session {
    /// Lays out visible workspaces and parks the windows of the others in a
    /// corner of their monitor.
    ///
    /// Visible workspaces go first so that a workspace switch shows the new
    /// windows before the old ones leave.
    #[instrument(level = "trace", skip(self))]
    pub(super) async fn layout_workspaces(&mut self) -> Result<(), Cancelled> {
        let monitors = self.world.monitors().to_vec();
        let frames: Vec<Rect> = monitors.iter().map(|m| m.frame).collect();
        let corners: Vec<(Point, HideCorner)> =
            monitors.iter().map(|m| (m.key(), optimal_hide_corner(m.frame, &frames))).collect();

        for monitor in &monitors {
            self.unhide_workspace(monitor.active_workspace);
            self.layout_workspace(monitor.active_workspace).await?;
        }

        let hidden: Vec<NodeId> = self.world.workspaces().filter(|&ws| !self.world.is_visible(ws)).collect();
        for ws in hidden {
            let key = self.world.monitor_of(ws).key();
            let corner = corners
                .iter()
                .find(|(k, _)| *k == key)
                .map_or(HideCorner::BottomRight, |&(_, corner)| corner);
            self.hide_workspace(ws, corner).await?;
        }
        Ok(())
    }

    async fn layout_workspace(&mut self, ws: NodeId) -> Result<(), Cancelled> {
        let layout = calculate_layout(&self.world, ws, &self.config.settings.gaps);
        layout.apply(&mut self.world);
        for &(id, rect) in &layout.frames {
            if let Some(app) = self.apps.get(id.pid) {
                app.set_frame(id, Some(rect.origin), Some(rect.size), &self.token);
            }
        }

        // Floating windows stay where they are unless they sit on a monitor
        // that shows another workspace.
        let target = self.world.monitor_of(ws).visible_frame;
        for &id in &layout.floating {
            let Some(app) = self.apps.get(id.pid) else { continue };
            let Some(rect) = app.rect(id, &self.token).await? else { continue };
            let Some(current) = self.world.monitor_approximation(rect.origin) else { continue };
            if current.active_workspace == ws {
                continue;
            }
            let origin = relocate_floating(rect.origin, current.visible_frame, target);
            trace!(%id, ?origin, "moving floating window to its workspace monitor");
            app.set_top_left(id, origin, &self.token);
        }
        Ok(())
    }

    fn unhide_workspace(&mut self, ws: NodeId) {
        let origin = self.world.monitor_of(ws).frame.top_left();
        for node in self.world.tree.leaf_windows(ws) {
            let floating = self.world.tree.parent_kind(node) == Some(ParentKind::Workspace);
            let Some(window) = self.world.tree.window_mut(node) else { continue };
            let Some(relative) = window.prev_unhidden_position.take() else { continue };
            // Tiled windows are placed by the layout anyway.
            if floating {
                let id = window.id;
                if let Some(app) = self.apps.get(id.pid) {
                    app.set_top_left(id, origin + relative, &self.token);
                }
            }
        }
    }

    async fn hide_workspace(&mut self, ws: NodeId, corner: HideCorner) -> Result<(), Cancelled> {
        let monitor = self.world.monitor_of(ws);
        let (origin, visible) = (monitor.frame.top_left(), monitor.visible_frame);
        for node in self.world.tree.leaf_windows(ws) {
            if matches!(
                self.world.tree.parent_kind(node),
                Some(ParentKind::Special(SpecialKind::Popup | SpecialKind::NativeMinimized))
            ) {
                continue;
            }
            let Some(window) = self.world.tree.window(node) else { continue };
            let id = window.id;
            let Some(app) = self.apps.get(id.pid) else { continue };
            if !window.is_hidden_in_corner() {
                let Some(top_left) = app.top_left(id, &self.token).await? else { continue };
                if let Some(window) = self.world.tree.window_mut(node) {
                    window.prev_unhidden_position = Some(top_left - origin);
                }
            }
            // The bottom-right corner doesn't depend on the size.
            let (corner, size) = match app.size(id, &self.token).await? {
                Some(size) => (corner, size),
                None => (HideCorner::BottomRight, Size::default()),
            };
            let position = hide_position(corner, visible, size, app.info().bundle_id.as_deref());
            app.set_top_left(id, position, &self.token);
        }
        Ok(())
    }
}
