//! Windows the OS takes out of tiling: native fullscreen, minimized, and
//! windows of hidden apps.

use tracing::{debug, instrument};

use super::Session;
use crate::actor::app::{Cancelled, NativeState};
use crate::common::collections::{BTreeMap, HashSet};
use crate::model::classify::{WindowClass, classify};
use crate::model::tree::{LayoutReason, NodeId, ParentKind, Position, SpecialKind, Weight};
use crate::sys::ax::{WindowId, pid_t};

impl Session {
    /// Moves windows into the native container matching their OS state, and
    /// back to where they came from once the OS lets go of them.
    #[instrument(level = "trace", skip(self))]
    pub(super) async fn normalize_layout_reason(&mut self) -> Result<(), Cancelled> {
        let mut states = BTreeMap::new();
        for app in self.apps.iter() {
            if let Some(app_states) = app.native_states(&self.token).await? {
                states.extend(app_states);
            }
        }
        let hidden_apps: HashSet<pid_t> = if self.config.settings.automatically_unhide_hidden_apps {
            HashSet::default()
        } else {
            self.apps.pids().into_iter().filter(|&pid| self.server.is_hidden(pid)).collect()
        };

        for id in self.world.window_ids() {
            // Unknown state is left alone until the next refresh.
            let Some(&state) = states.get(&id) else { continue };
            self.normalize_window(id, state, hidden_apps.contains(&id.pid)).await?;
        }
        Ok(())
    }

    async fn normalize_window(&mut self, id: WindowId, state: NativeState, app_hidden: bool) -> Result<(), Cancelled> {
        let Some(node) = self.world.window_node(id) else { return Ok(()) };
        let Some(ws) = self.world.tree.workspace_of(node) else { return Ok(()) };
        let Some(parent_kind) = self.world.tree.parent_kind(node) else { return Ok(()) };
        if parent_kind == ParentKind::Special(SpecialKind::Popup) {
            return Ok(());
        }
        let Some(reason) = self.world.window(id).map(|w| w.layout_reason) else { return Ok(()) };

        let native = if state.fullscreen {
            Some(SpecialKind::NativeFullscreen)
        } else if state.minimized {
            Some(SpecialKind::NativeMinimized)
        } else if app_hidden {
            Some(SpecialKind::NativeHidden)
        } else {
            None
        };
        match (native, reason) {
            (Some(kind), LayoutReason::Standard) => {
                if parent_kind == ParentKind::Special(kind) {
                    return Ok(());
                }
                let container = self.world.special_container(ws, kind);
                if let Err(err) = self.world.move_window(id, container, Weight::Auto, Position::Last) {
                    debug!(%id, %err, "could not move window into native container");
                    return Ok(());
                }
                if let Some(window) = self.world.window_mut(id) {
                    window.layout_reason = LayoutReason::Macos { prev_parent: parent_kind };
                }
                debug!(%id, ?kind, "window entered native state");
            }
            (None, LayoutReason::Macos { prev_parent }) => self.exit_native_state(id, ws, prev_parent).await?,
            _ => {}
        }
        Ok(())
    }

    async fn exit_native_state(&mut self, id: WindowId, ws: NodeId, prev_parent: ParentKind) -> Result<(), Cancelled> {
        let (parent, position) = match prev_parent {
            ParentKind::Tiling => self.world.tiling_binding(ws),
            ParentKind::Workspace => (ws, Position::Last),
            // No usable previous parent; place it like a new window.
            ParentKind::Special(_) => {
                let Some(class) = self.window_class(id).await? else { return Ok(()) };
                self.world.binding_for(ws, class)
            }
        };
        if let Some(window) = self.world.window_mut(id) {
            window.layout_reason = LayoutReason::Standard;
        }
        if let Err(err) = self.world.move_window(id, parent, Weight::Auto, position) {
            debug!(%id, %err, "could not move window out of native container");
            return Ok(());
        }
        debug!(%id, "window left native state");
        Ok(())
    }

    async fn window_class(&self, id: WindowId) -> Result<Option<WindowClass>, Cancelled> {
        let Some(app) = self.apps.get(id.pid) else { return Ok(None) };
        let Some((attributes, focused)) = app.window_attributes(id, &self.token).await? else {
            return Ok(None);
        };
        Ok(Some(classify(&attributes, app.info(), focused)))
    }
}
