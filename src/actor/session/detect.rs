use std::time::Instant;

use tracing::{debug, instrument, trace};

use super::Session;
use crate::actor::app::{Cancelled, NewWindow};
use crate::common::config::DetectedWindow;
use crate::model::classify::{WindowClass, classify};
use crate::model::tree::{Weight, Window};
use crate::sys::ax::{AppInfo, WindowId};

impl Session {
    /// Starts actors for new apps and registers windows no actor has seen
    /// yet.
    #[instrument(level = "trace", skip(self))]
    pub(super) async fn detect_new_apps_and_windows(&mut self, startup: bool) -> Result<(), Cancelled> {
        for (pid, info) in self.server.running_apps() {
            if self.apps.contains(pid) || self.apps.is_refused(pid) {
                continue;
            }
            _ = self.apps.get_or_start(pid, &info).await;
        }

        // A tab being dragged out of its window shows up as a new window
        // that is about to merge back.
        if self.server.is_left_mouse_down() {
            trace!("left mouse button is down; delaying window detection");
            return Ok(());
        }

        for pid in self.apps.pids() {
            let Some(app) = self.apps.get(pid) else { continue };
            let info = app.info().clone();
            let Some(windows) = app.detect_new_windows(&self.token).await? else { continue };
            for window in windows {
                self.register_window(&info, window, startup);
            }
        }
        Ok(())
    }

    fn register_window(&mut self, info: &AppInfo, new: NewWindow, startup: bool) {
        let id = new.id;
        if self.world.contains_window(id) {
            return;
        }
        let class = classify(&new.attributes, info, new.is_app_focused_window);
        let mut window = Window::new(id);
        if class == WindowClass::Dialog {
            window.last_floating_size = new.rect.map(|r| r.size);
        }

        if let Some(closed) = self.closed_windows.take(id, Instant::now()) {
            match self.world.restore_window(window.clone(), &closed) {
                Ok(_) => {
                    debug!(%id, workspace = %closed.workspace, "restored window from closed cache");
                    return;
                }
                Err(err) => debug!(%id, %err, "could not restore window"),
            }
        }

        // Startup puts windows on the monitor they are already on.
        let on_monitor = if startup {
            new.rect.and_then(|r| self.world.monitor_approximation(r.center())).map(|m| m.active_workspace)
        } else {
            None
        };
        let ws = on_monitor.unwrap_or(self.world.focus().workspace);
        let (parent, position) = self.world.binding_for(ws, class);
        if let Err(err) = self.world.add_window(window, parent, Weight::Auto, position) {
            debug!(%id, %err, "could not add window");
            return;
        }
        debug!(%id, ?class, app = info.display_name(), "new window");

        if class != WindowClass::Popup {
            self.run_window_detected_callbacks(info, &new, startup);
        }
    }

    fn run_window_detected_callbacks(&mut self, info: &AppInfo, new: &NewWindow, startup: bool) {
        if self.config.on_window_detected.is_empty() {
            return;
        }
        let callbacks = self.config.on_window_detected.clone();
        for callback in &callbacks {
            let workspace = self.workspace_name_of(new.id);
            let detected = DetectedWindow {
                title: new.title.as_deref(),
                app_id: info.bundle_id.as_deref(),
                app_name: info.localized_name.as_deref(),
                workspace: &workspace,
                startup,
            };
            if !callback.matcher.matches(&detected) {
                continue;
            }
            trace!(id = %new.id, "running window detected callback");
            for command in &callback.run {
                command.apply(self, new.id);
            }
            if !callback.check_further_callbacks {
                break;
            }
        }
    }

    fn workspace_name_of(&self, id: WindowId) -> String {
        self.world
            .workspace_of_window(id)
            .map(|ws| self.world.workspace_name(ws).to_owned())
            .unwrap_or_default()
    }
}
