//! The refresh cycle.
//!
//! Every OS notification and every command runs inside
//! [`Session::refresh_session`], which reconciles the model with what the OS
//! reports, runs the caller's body, reconciles again and then lays out all
//! monitors. Running it twice in a row without outside changes does nothing
//! the second time.

mod detect;
mod gc;
mod layout;
mod native;
#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Instant;

use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, trace};

use super::app::{AppRegistry, Cancelled};
use crate::actor;
use crate::common::config::Config;
use crate::model::closed_windows::ClosedWindowsCache;
use crate::model::tree::{ParentKind, SpecialKind};
use crate::model::world::World;
use crate::sys::ax::{AxConnector, AxEvent, AxEventSender, AxNotification, WindowId, WindowServer, pid_t};

/// What started a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    Startup,
    Ax(AxNotification),
    AppLaunched(pid_t),
    AppTerminated(pid_t),
    ActiveAppChanged,
    ScreenParametersChanged,
    /// The screen was unlocked; windows reported from now on are real.
    SessionUnlocked,
    Command(&'static str),
}

pub struct Session {
    pub(crate) config: Config,
    pub(crate) server: Box<dyn WindowServer>,
    pub(crate) apps: AppRegistry,
    pub(crate) world: World,
    pub(crate) closed_windows: ClosedWindowsCache,
    pub(crate) token: CancellationToken,
    last_known_native_focus: Option<WindowId>,
}

impl Session {
    pub fn new(
        config: Config,
        server: Box<dyn WindowServer>,
        connector: Arc<dyn AxConnector>,
        events: AxEventSender,
    ) -> Session {
        let world = World::new(
            config.settings.layout.clone(),
            config.workspaces.clone(),
            &server.monitors(),
        );
        Session {
            closed_windows: ClosedWindowsCache::new(config.settings.closed_windows_cache_ttl),
            apps: AppRegistry::new(connector, events),
            config,
            server,
            world,
            token: CancellationToken::new(),
            last_known_native_focus: None,
        }
    }

    pub fn world(&self) -> &World { &self.world }

    pub fn config(&self) -> &Config { &self.config }

    /// Cancels every pending actor call and stops [`Session::run`].
    pub fn token(&self) -> &CancellationToken { &self.token }

    /// Reconciles the model, runs `body`, and lays everything out.
    pub async fn refresh_session<T>(
        &mut self,
        event: RefreshEvent,
        body: impl AsyncFnOnce(&mut Session) -> T,
    ) -> Result<T, Cancelled> {
        let span = debug_span!("refresh", ?event);
        let startup = event == RefreshEvent::Startup;
        async move {
            if let RefreshEvent::AppLaunched(pid) | RefreshEvent::AppTerminated(pid) = event {
                self.apps.retry(pid);
            }
            if event == RefreshEvent::SessionUnlocked {
                self.closed_windows.clear();
            } else {
                self.closed_windows.prune(Instant::now());
            }
            self.gc().await?;
            self.world.refresh_monitors(&self.server.monitors());

            self.detect_new_apps_and_windows(startup).await?;

            let native_focus = self.native_focused_window().await?;
            self.update_focus_cache(native_focus);
            let focus_before = self.world.focus().window;

            self.refresh_model().await?;
            let result = body(self).await;
            self.refresh_model().await?;

            let focus_after = self.world.focus().window;
            if startup {
                self.world.apply_smart_layout();
            }

            if self.config.settings.enabled {
                if focus_before != focus_after {
                    if let Some(id) = focus_after {
                        self.native_focus(id);
                    }
                }
                self.normalize_layout_reason().await?;
                self.layout_workspaces().await?;
            }
            trace!(tree = %self.world.draw(), "refresh done");
            Ok(result)
        }
        .instrument(span)
        .await
    }

    pub async fn refresh(&mut self, event: RefreshEvent) -> Result<(), Cancelled> {
        self.refresh_session(event, async |_: &mut Session| {}).await
    }

    async fn refresh_model(&mut self) -> Result<(), Cancelled> {
        self.gc().await?;
        self.world.normalize_containers();
        self.world.fix_focus();
        Ok(())
    }

    async fn native_focused_window(&self) -> Result<Option<WindowId>, Cancelled> {
        let Some((pid, _)) = self.server.frontmost_app() else { return Ok(None) };
        let Some(app) = self.apps.get(pid) else { return Ok(None) };
        app.focused_window(&self.token).await
    }

    /// Follows focus changes made outside the window manager.
    fn update_focus_cache(&mut self, native_focus: Option<WindowId>) {
        let Some(id) = native_focus else { return };
        if self.last_known_native_focus == Some(id) {
            return;
        }
        let Some(node) = self.world.window_node(id) else { return };
        if self.world.tree.parent_kind(node) == Some(ParentKind::Special(SpecialKind::Popup)) {
            return;
        }
        debug!(%id, "native focus changed");
        self.world.focus_window(id);
        self.last_known_native_focus = Some(id);
    }

    fn native_focus(&mut self, id: WindowId) {
        let Some(app) = self.apps.get(id.pid) else { return };
        trace!(%id, "focusing natively");
        app.focus_window(id, &self.token);
        self.last_known_native_focus = Some(id);
    }

    /// Drops a window the caller knows is gone without caching it.
    pub(crate) fn forget_window(&mut self, id: WindowId) {
        self.world.remove_window(id);
        if let Some(app) = self.apps.get(id.pid) {
            app.forget_window(id);
        }
        if self.last_known_native_focus == Some(id) {
            self.last_known_native_focus = None;
        }
    }

    /// Runs one refresh per event until cancelled.
    ///
    /// Accessibility notifications that queue up while a refresh is running
    /// are folded into the next one.
    pub async fn run(
        mut self,
        mut ax_events: actor::Receiver<AxEvent>,
        mut events: actor::Receiver<RefreshEvent>,
    ) {
        if self.refresh(RefreshEvent::Startup).await.is_err() {
            return;
        }
        loop {
            let token = self.token.clone();
            let (span, event) = select! {
                biased;
                _ = token.cancelled() => break,
                Some((span, event)) = events.recv() => (span, event),
                Some((span, event)) = ax_events.recv() => (span, RefreshEvent::Ax(event.notification)),
                else => break,
            };
            while ax_events.try_recv().is_ok() {}
            let result = self.refresh(event).instrument(span).await;
            if result.is_err() {
                trace!("refresh cancelled");
                break;
            }
        }
        debug!("session stopped");
        self.apps.terminate_all();
    }
}
