//! A scriptable in-memory window server for tests.
//!
//! [`FakeOs`] implements both [`WindowServer`] and [`AxConnector`] over one
//! shared state, so a test can move windows around "in the OS" and then check
//! what the window manager did about it.

use std::sync::Arc;

use parking_lot::Mutex;

use super::ax::{
    AX_STANDARD_WINDOW_SUBROLE, AppInfo, AxApp, AxConnector, AxError, AxEvent, AxEventSender,
    AxNotification, AxWindow, LOGIN_WINDOW_BUNDLE_ID, MonitorInfo, Result, WindowAttributes,
    WindowButtons, WindowId, WindowServer, pid_t,
};
use super::geometry::{Point, Rect, Size};
use crate::common::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub id: WindowId,
    pub attributes: WindowAttributes,
    pub title: String,
    pub frame: Rect,
    pub fullscreen: bool,
    pub minimized: bool,
    /// Whether the accessibility element still resolves to a window id.
    pub resolvable: bool,
    pub closable: bool,
    pub fail_subscribe: bool,
}

impl FakeWindow {
    pub fn new(id: WindowId, frame: Rect) -> FakeWindow {
        FakeWindow {
            id,
            attributes: WindowAttributes {
                subrole: Some(AX_STANDARD_WINDOW_SUBROLE.into()),
                identifier: None,
                buttons: WindowButtons::all(),
                enabled_buttons: WindowButtons::all(),
                is_focused: false,
                is_main: false,
            },
            title: format!("window {id}"),
            frame,
            fullscreen: false,
            minimized: false,
            resolvable: true,
            closable: true,
            fail_subscribe: false,
        }
    }

    /// A window without buttons or a standard subrole.
    pub fn popup(id: WindowId, frame: Rect) -> FakeWindow {
        let mut window = FakeWindow::new(id, frame);
        window.attributes = WindowAttributes {
            subrole: Some("AXUnknown".into()),
            ..WindowAttributes::default()
        };
        window
    }

    /// A standard window that can't go fullscreen.
    pub fn dialog(id: WindowId, frame: Rect) -> FakeWindow {
        let mut window = FakeWindow::new(id, frame);
        window.attributes.enabled_buttons.remove(WindowButtons::FULLSCREEN);
        window
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeApp {
    pub info: AppInfo,
    pub windows: Vec<FakeWindow>,
    pub focused: Option<WindowId>,
    pub terminated: bool,
    pub hidden: bool,
    pub enhanced_ui: bool,
    pub fail_connect: bool,
    pub refuse_terminate: bool,
    pub activations: usize,
    events: Option<AxEventSender>,
}

#[derive(Debug, Default)]
pub struct State {
    pub apps: BTreeMap<pid_t, FakeApp>,
    pub monitors: Vec<MonitorInfo>,
    pub frontmost: Option<pid_t>,
    pub login_window_frontmost: bool,
    pub left_mouse_down: bool,
    pub subscriptions: HashSet<WindowId>,
    /// Every frame change, in order.
    pub frame_log: Vec<(WindowId, Rect)>,
    /// Frame changes made while the app had enhanced UI on.
    pub frames_set_with_enhanced_ui: usize,
    pub connects: usize,
}

impl State {
    pub fn app(&self, pid: pid_t) -> Option<&FakeApp> { self.apps.get(&pid) }

    pub fn window(&self, id: WindowId) -> Option<&FakeWindow> {
        self.apps.get(&id.pid)?.windows.iter().find(|w| w.id == id)
    }

    pub fn window_mut(&mut self, id: WindowId) -> Option<&mut FakeWindow> {
        self.apps.get_mut(&id.pid)?.windows.iter_mut().find(|w| w.id == id)
    }

    fn notify(&self, pid: pid_t, window: Option<WindowId>, notification: AxNotification) {
        if let Some(events) = self.apps.get(&pid).and_then(|a| a.events.as_ref()) {
            events.send(AxEvent { pid, window, notification });
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeOs {
    state: Arc<Mutex<State>>,
}

impl FakeOs {
    pub fn new(monitors: &[Rect]) -> FakeOs {
        let os = FakeOs::default();
        os.set_monitors(monitors);
        os
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R { f(&mut self.state.lock()) }

    pub fn set_monitors(&self, monitors: &[Rect]) {
        self.with(|s| {
            s.monitors = monitors.iter().map(|&frame| MonitorInfo { frame, visible_frame: frame }).collect();
        });
    }

    pub fn add_app(&self, pid: pid_t, bundle_id: &str) {
        self.with(|s| {
            s.apps.insert(pid, FakeApp {
                info: AppInfo::new(bundle_id, bundle_id.rsplit('.').next().unwrap_or(bundle_id)),
                ..FakeApp::default()
            });
            s.frontmost.get_or_insert(pid);
        });
    }

    pub fn add_window(&self, id: WindowId, frame: Rect) -> WindowId {
        self.add_fake_window(FakeWindow::new(id, frame))
    }

    pub fn add_fake_window(&self, window: FakeWindow) -> WindowId {
        let id = window.id;
        self.with(|s| {
            if let Some(app) = s.apps.get_mut(&id.pid) {
                app.windows.push(window);
            }
            s.notify(id.pid, Some(id), AxNotification::WindowCreated);
        });
        id
    }

    /// Removes the window as if it was closed by the user.
    pub fn destroy_window(&self, id: WindowId) {
        self.with(|s| {
            if let Some(app) = s.apps.get_mut(&id.pid) {
                app.windows.retain(|w| w.id != id);
                if app.focused == Some(id) {
                    app.focused = None;
                }
            }
            if s.subscriptions.remove(&id) {
                s.notify(id.pid, Some(id), AxNotification::Destroyed);
            }
        });
    }

    pub fn terminate_app(&self, pid: pid_t) {
        self.with(|s| {
            if let Some(app) = s.apps.get_mut(&pid) {
                app.terminated = true;
                app.windows.clear();
            }
            if s.frontmost == Some(pid) {
                s.frontmost = None;
            }
        });
    }

    /// Makes `id` the focused window of the frontmost app.
    pub fn focus(&self, id: WindowId) {
        self.with(|s| {
            if let Some(app) = s.apps.get_mut(&id.pid) {
                app.focused = Some(id);
            }
            s.frontmost = Some(id.pid);
            s.notify(id.pid, Some(id), AxNotification::FocusedWindowChanged);
        });
    }

    pub fn frame(&self, id: WindowId) -> Option<Rect> { self.with(|s| s.window(id).map(|w| w.frame)) }

    pub fn focused_window(&self) -> Option<WindowId> {
        self.with(|s| s.apps.get(&s.frontmost?)?.focused)
    }

    pub fn is_subscribed(&self, id: WindowId) -> bool { self.with(|s| s.subscriptions.contains(&id)) }

    pub fn take_frame_log(&self) -> Vec<(WindowId, Rect)> { self.with(|s| std::mem::take(&mut s.frame_log)) }
}

impl WindowServer for FakeOs {
    fn running_apps(&self) -> Vec<(pid_t, AppInfo)> {
        self.with(|s| {
            s.apps
                .iter()
                .filter(|(_, app)| !app.terminated)
                .map(|(&pid, app)| (pid, app.info.clone()))
                .collect()
        })
    }

    fn is_terminated(&self, pid: pid_t) -> bool {
        self.with(|s| s.apps.get(&pid).is_none_or(|app| app.terminated))
    }

    fn is_hidden(&self, pid: pid_t) -> bool { self.with(|s| s.apps.get(&pid).is_some_and(|app| app.hidden)) }

    fn frontmost_app(&self) -> Option<(pid_t, AppInfo)> {
        self.with(|s| {
            if s.login_window_frontmost {
                return Some((0, AppInfo::new(LOGIN_WINDOW_BUNDLE_ID, "loginwindow")));
            }
            let pid = s.frontmost?;
            Some((pid, s.apps.get(&pid)?.info.clone()))
        })
    }

    fn monitors(&self) -> Vec<MonitorInfo> { self.with(|s| s.monitors.clone()) }

    fn is_left_mouse_down(&self) -> bool { self.with(|s| s.left_mouse_down) }

    fn terminate(&self, pid: pid_t) -> bool {
        let refused = self.with(|s| s.apps.get(&pid).is_none_or(|app| app.refuse_terminate));
        if !refused {
            self.terminate_app(pid);
        }
        !refused
    }
}

impl AxConnector for FakeOs {
    fn connect(&self, pid: pid_t, _info: &AppInfo, events: AxEventSender) -> Result<Box<dyn AxApp>> {
        self.with(|s| {
            s.connects += 1;
            match s.apps.get_mut(&pid) {
                Some(app) if !app.fail_connect && !app.terminated => {
                    app.events = Some(events);
                    Ok(())
                }
                _ => Err(AxError::CannotComplete),
            }
        })?;
        Ok(Box::new(FakeAxApp { pid, os: self.clone() }))
    }
}

struct FakeAxApp {
    pid: pid_t,
    os: FakeOs,
}

impl AxApp for FakeAxApp {
    fn windows(&self) -> Result<Vec<Box<dyn AxWindow>>> {
        self.os.with(|s| {
            let app = s.apps.get(&self.pid).ok_or(AxError::InvalidElement)?;
            Ok(app
                .windows
                .iter()
                .map(|w| Box::new(FakeAxWindow { id: w.id, os: self.os.clone() }) as Box<dyn AxWindow>)
                .collect())
        })
    }

    fn focused_window(&self) -> Option<WindowId> { self.os.with(|s| s.apps.get(&self.pid)?.focused) }

    fn enhanced_user_interface(&self) -> Result<bool> {
        self.os.with(|s| s.apps.get(&self.pid).map(|a| a.enhanced_ui).ok_or(AxError::InvalidElement))
    }

    fn set_enhanced_user_interface(&self, enabled: bool) -> Result<()> {
        self.os.with(|s| {
            let app = s.apps.get_mut(&self.pid).ok_or(AxError::InvalidElement)?;
            app.enhanced_ui = enabled;
            Ok(())
        })
    }

    fn subscribe(&mut self, window: &dyn AxWindow, _notifications: &[AxNotification]) -> Result<()> {
        let id = window.window_id().ok_or(AxError::InvalidElement)?;
        self.os.with(|s| {
            if s.window(id).is_none_or(|w| w.fail_subscribe) {
                return Err(AxError::CannotComplete);
            }
            s.subscriptions.insert(id);
            Ok(())
        })
    }

    fn unsubscribe(&mut self, window: WindowId) { self.os.with(|s| s.subscriptions.remove(&window)); }

    fn unsubscribe_all(&mut self) {
        let pid = self.pid;
        self.os.with(|s| s.subscriptions.retain(|id| id.pid != pid));
    }

    fn activate(&self) -> Result<()> {
        self.os.with(|s| {
            let app = s.apps.get_mut(&self.pid).ok_or(AxError::InvalidElement)?;
            app.activations += 1;
            s.frontmost = Some(self.pid);
            Ok(())
        })
    }
}

struct FakeAxWindow {
    id: WindowId,
    os: FakeOs,
}

impl FakeAxWindow {
    fn read<R>(&self, f: impl FnOnce(&FakeWindow) -> R) -> Result<R> {
        self.os.with(|s| s.window(self.id).map(f).ok_or(AxError::InvalidElement))
    }

    fn set_frame(&self, f: impl FnOnce(&mut Rect)) -> Result<()> {
        self.os.with(|s| {
            let enhanced_ui = s.app(self.id.pid).is_some_and(|a| a.enhanced_ui);
            let window = s.window_mut(self.id).ok_or(AxError::InvalidElement)?;
            f(&mut window.frame);
            let frame = window.frame;
            s.frame_log.push((self.id, frame));
            if enhanced_ui {
                s.frames_set_with_enhanced_ui += 1;
            }
            Ok(())
        })
    }
}

impl AxWindow for FakeAxWindow {
    fn window_id(&self) -> Option<WindowId> {
        self.read(|w| w.resolvable.then_some(w.id)).ok().flatten()
    }

    fn attributes(&self) -> WindowAttributes { self.read(|w| w.attributes.clone()).unwrap_or_default() }

    fn title(&self) -> Result<String> { self.read(|w| w.title.clone()) }

    fn position(&self) -> Result<Point> { self.read(|w| w.frame.origin) }

    fn size(&self) -> Result<Size> { self.read(|w| w.frame.size) }

    fn set_position(&self, position: Point) -> Result<()> { self.set_frame(|f| f.origin = position) }

    fn set_size(&self, size: Size) -> Result<()> { self.set_frame(|f| f.size = size) }

    fn is_fullscreen(&self) -> Result<bool> { self.read(|w| w.fullscreen) }

    fn set_fullscreen(&self, fullscreen: bool) -> Result<()> {
        self.os.with(|s| {
            s.window_mut(self.id).ok_or(AxError::InvalidElement)?.fullscreen = fullscreen;
            Ok(())
        })
    }

    fn is_minimized(&self) -> Result<bool> { self.read(|w| w.minimized) }

    fn set_minimized(&self, minimized: bool) -> Result<()> {
        self.os.with(|s| {
            s.window_mut(self.id).ok_or(AxError::InvalidElement)?.minimized = minimized;
            Ok(())
        })
    }

    fn close(&self) -> Result<()> {
        if !self.read(|w| w.closable)? {
            return Err(AxError::NotSupported);
        }
        self.os.destroy_window(self.id);
        Ok(())
    }

    fn raise(&self) -> Result<()> {
        self.os.with(|s| {
            let app = s.apps.get_mut(&self.id.pid).ok_or(AxError::InvalidElement)?;
            app.focused = Some(self.id);
            s.frontmost = Some(self.id.pid);
            Ok(())
        })
    }
}
