use std::sync::Arc;

use super::{RefreshEvent, Session};
use crate::actor;
use crate::common::config::Config;
use crate::model::tree::ParentKind;
use crate::sys::ax::{AxNotification, WindowId, pid_t};
use crate::sys::fake::FakeOs;
use crate::sys::geometry::Rect;

pub const SCREEN: Rect = Rect::new(0.0, 0.0, 1000.0, 1000.0);
pub const NOTES: pid_t = 1;
pub const NOTES_BUNDLE: &str = "com.example.Notes";
pub const MAIL: pid_t = 2;
pub const MAIL_BUNDLE: &str = "com.example.Mail";

pub const CHANGED: RefreshEvent = RefreshEvent::Ax(AxNotification::WindowCreated);

pub fn initial_frame(idx: u32) -> Rect {
    let offset = 10.0 * idx as f64;
    Rect::new(100.0 + offset, 100.0 + offset, 400.0, 300.0)
}

/// One monitor and the Notes app with `count` standard windows.
pub fn notes_with_windows(count: u32) -> (FakeOs, Vec<WindowId>) {
    let os = FakeOs::new(&[SCREEN]);
    os.add_app(NOTES, NOTES_BUNDLE);
    let ids = (1..=count).map(|idx| os.add_window(WindowId::new(NOTES, idx), initial_frame(idx))).collect();
    (os, ids)
}

pub fn new_session(os: &FakeOs, config: Config) -> Session {
    let (events, _) = actor::channel();
    Session::new(config, Box::new(os.clone()), Arc::new(os.clone()), events)
}

pub async fn started(os: &FakeOs) -> Session { started_with(os, Config::default()).await }

pub async fn started_with(os: &FakeOs, config: Config) -> Session {
    let mut session = new_session(os, config);
    session.refresh_and_settle(RefreshEvent::Startup).await;
    session
}

impl Session {
    /// Waits until every actor has run the jobs queued so far.
    pub async fn settle(&self) {
        for app in self.apps.iter() {
            _ = app.call(&self.token, |_, _| ()).await;
        }
    }

    pub async fn refresh_and_settle(&mut self, event: RefreshEvent) {
        self.refresh(event).await.expect("refresh was cancelled");
        self.settle().await;
        self.world.assert_consistent();
    }

    /// Tiled windows of the named workspace, in tree order.
    pub fn tiled_windows(&self, workspace: &str) -> Vec<WindowId> {
        let Some(ws) = self.world.workspace_named(workspace) else { return Vec::new() };
        let Some(root) = self.world.find_root(ws) else { return Vec::new() };
        self.world
            .tree
            .leaf_windows(root)
            .into_iter()
            .filter_map(|node| self.world.tree.window(node).map(|w| w.id))
            .collect()
    }

    pub fn parent_kind_of(&self, id: WindowId) -> Option<ParentKind> {
        self.world.tree.parent_kind(self.world.window_node(id)?)
    }

    pub fn workspace_name_of_window(&self, id: WindowId) -> Option<String> {
        let ws = self.world.workspace_of_window(id)?;
        Some(self.world.workspace_name(ws).to_owned())
    }
}
