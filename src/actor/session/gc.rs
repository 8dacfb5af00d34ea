use std::time::{Duration, Instant};

use tracing::{debug, instrument, trace};

use super::Session;
use crate::actor::app::Cancelled;
use crate::common::collections::HashSet;
use crate::model::closed_windows::ClosedWindow;
use crate::model::tree::{ParentKind, SpecialKind};
use crate::sys::ax::{LOGIN_WINDOW_BUNDLE_ID, WindowId};

/// How long a workspace that lost focus still counts as focused when one of
/// its windows dies.
const RECENT_FOCUS: Duration = Duration::from_secs(1);

impl Session {
    pub(super) async fn gc(&mut self) -> Result<(), Cancelled> {
        self.gc_terminated_apps();
        self.gc_windows().await?;
        self.world.gc_workspaces();
        Ok(())
    }

    fn gc_terminated_apps(&mut self) {
        for pid in self.apps.pids() {
            if !self.server.is_terminated(pid) {
                continue;
            }
            debug!(pid, "app terminated");
            for id in self.world.windows_of(pid) {
                self.garbage_collect_window(id, true);
            }
            self.apps.terminate(pid);
        }
    }

    /// Evicts windows whose OS object is gone.
    ///
    /// While the screen is locked most windows stop resolving, so nothing is
    /// collected when the login window is frontmost or when no window at all
    /// resolves.
    #[instrument(level = "trace", skip(self))]
    async fn gc_windows(&mut self) -> Result<(), Cancelled> {
        if self.server.frontmost_app().is_some_and(|(_, info)| info.is_bundle(LOGIN_WINDOW_BUNDLE_ID)) {
            trace!("login window is frontmost");
            return Ok(());
        }
        let registered = self.world.window_ids();
        if registered.is_empty() {
            return Ok(());
        }
        let mut alive = HashSet::default();
        for app in self.apps.iter() {
            match app.resolvable_windows(&self.token).await? {
                Some(ids) => alive.extend(ids),
                // The actor is gone; its windows go with the app.
                None => alive.extend(self.world.windows_of(app.pid())),
            }
        }
        let dead: Vec<WindowId> = registered.iter().copied().filter(|id| !alive.contains(id)).collect();
        if dead.len() == registered.len() {
            debug!(count = dead.len(), "no window resolves; assuming the screen is locked");
            return Ok(());
        }
        for id in dead {
            self.garbage_collect_window(id, false);
        }
        Ok(())
    }

    /// Removes a window from the model and its actor. Unless `skip_cache` is
    /// set, the window's slot is remembered in the closed-window cache.
    pub(super) fn garbage_collect_window(&mut self, id: WindowId, skip_cache: bool) {
        let focus = self.world.focus();
        let focused_pid = focus.window.map(|w| w.pid);
        let Some(removed) = self.world.remove_window(id) else { return };
        if let Some(app) = self.apps.get(id.pid) {
            app.forget_window(id);
        }
        if self.last_known_native_focus == Some(id) {
            self.last_known_native_focus = None;
        }
        debug!(%id, "window is gone");

        if !skip_cache {
            if let Some((workspace, placement)) = removed.placement {
                self.closed_windows.insert(id, ClosedWindow {
                    closed_at: Instant::now(),
                    workspace,
                    placement,
                    weight: removed.weight,
                    layout_reason: removed.window.layout_reason,
                    last_floating_size: removed.window.last_floating_size,
                });
            }
        }

        let Some(ws) = removed.workspace else { return };
        let recently_focused = self
            .world
            .prev_focused_workspace()
            .is_some_and(|(prev, at)| prev == ws && at.elapsed() < RECENT_FOCUS);
        if ws != focus.workspace && !recently_focused {
            return;
        }
        match removed.parent_kind {
            Some(
                ParentKind::Tiling
                | ParentKind::Workspace
                | ParentKind::Special(SpecialKind::NativeHidden | SpecialKind::NativeFullscreen),
            ) => {
                self.world.focus_workspace(ws);
                // An app left without a focused window keeps the keyboard
                // focus; move it explicitly.
                if focused_pid != Some(id.pid) {
                    if let Some(next) = self.world.focus().window {
                        self.native_focus(next);
                    }
                }
            }
            // Closing a popup or a minimized window doesn't move focus.
            Some(ParentKind::Special(SpecialKind::Popup | SpecialKind::NativeMinimized)) | None => {}
        }
    }
}
