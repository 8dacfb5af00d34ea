//! The accessibility boundary.
//!
//! [`AxConnector`] opens an [`AxApp`] for a process on that process's actor
//! thread. App and window handles are not `Send`; they never leave the thread
//! that created them. [`WindowServer`] answers process- and display-level
//! questions from the coordination context.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::geometry::{Point, Rect, Size};
use crate::actor;

#[allow(non_camel_case_types)]
pub type pid_t = i32;

/// Identifies one OS window for its whole lifetime.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId {
    pub pid: pid_t,
    pub idx: u32,
}

impl WindowId {
    pub const fn new(pid: pid_t, idx: u32) -> WindowId { WindowId { pid, idx } }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pid, self.idx)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct AppInfo {
    pub bundle_id: Option<String>,
    pub localized_name: Option<String>,
}

impl AppInfo {
    pub fn new(bundle_id: &str, localized_name: &str) -> AppInfo {
        AppInfo {
            bundle_id: Some(bundle_id.to_owned()),
            localized_name: Some(localized_name.to_owned()),
        }
    }

    pub fn display_name(&self) -> &str {
        self.localized_name.as_deref().or(self.bundle_id.as_deref()).unwrap_or("<unknown>")
    }

    pub fn is_bundle(&self, bundle_id: &str) -> bool { self.bundle_id.as_deref() == Some(bundle_id) }
}

/// A display as reported by the window server. The main display comes first.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct MonitorInfo {
    pub frame: Rect,
    /// The frame minus the menu bar and the dock.
    pub visible_frame: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::IntoStaticStr)]
pub enum AxNotification {
    #[strum(serialize = "AXUIElementDestroyed")]
    Destroyed,
    #[strum(serialize = "AXWindowMiniaturized")]
    Miniaturized,
    #[strum(serialize = "AXWindowDeminiaturized")]
    Deminiaturized,
    #[strum(serialize = "AXWindowMoved")]
    Moved,
    #[strum(serialize = "AXWindowResized")]
    Resized,
    #[strum(serialize = "AXFocusedWindowChanged")]
    FocusedWindowChanged,
    #[strum(serialize = "AXWindowCreated")]
    WindowCreated,
}

impl AxNotification {
    pub fn name(self) -> &'static str { self.into() }
}

pub const WINDOW_NOTIFICATIONS: &[AxNotification] = &[
    AxNotification::Destroyed,
    AxNotification::Miniaturized,
    AxNotification::Deminiaturized,
    AxNotification::Moved,
    AxNotification::Resized,
];

pub const APP_NOTIFICATIONS: &[AxNotification] =
    &[AxNotification::FocusedWindowChanged, AxNotification::WindowCreated];

/// A notification delivered by an accessibility observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxEvent {
    pub pid: pid_t,
    pub window: Option<WindowId>,
    pub notification: AxNotification,
}

pub type AxEventSender = actor::Sender<AxEvent>;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WindowButtons: u8 {
        const CLOSE = 1 << 0;
        const FULLSCREEN = 1 << 1;
        const ZOOM = 1 << 2;
        const MINIMIZE = 1 << 3;
    }
}

pub const AX_STANDARD_WINDOW_SUBROLE: &str = "AXStandardWindow";

/// Frontmost while the screen is locked.
pub const LOGIN_WINDOW_BUNDLE_ID: &str = "com.apple.loginwindow";

/// Attributes read once from a window when it is first seen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WindowAttributes {
    pub subrole: Option<String>,
    pub identifier: Option<String>,
    /// Buttons the window has.
    pub buttons: WindowButtons,
    /// Buttons the window has that are currently enabled.
    pub enabled_buttons: WindowButtons,
    pub is_focused: bool,
    pub is_main: bool,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AxError {
    #[error("attribute has no value")]
    NoValue,
    #[error("element is no longer valid")]
    InvalidElement,
    #[error("the application did not respond")]
    CannotComplete,
    #[error("operation not supported by the element")]
    NotSupported,
    #[error("accessibility error {0}")]
    Other(i32),
}

pub type Result<T> = std::result::Result<T, AxError>;

pub trait AxConnector: Send + Sync {
    /// Opens the application element for `pid`.
    ///
    /// Called on the actor thread. Observer notifications for the app and its
    /// windows are sent to `events`.
    fn connect(&self, pid: pid_t, info: &AppInfo, events: AxEventSender) -> Result<Box<dyn AxApp>>;
}

pub trait AxApp {
    fn windows(&self) -> Result<Vec<Box<dyn AxWindow>>>;
    fn focused_window(&self) -> Option<WindowId>;
    fn enhanced_user_interface(&self) -> Result<bool>;
    fn set_enhanced_user_interface(&self, enabled: bool) -> Result<()>;
    fn subscribe(&mut self, window: &dyn AxWindow, notifications: &[AxNotification]) -> Result<()>;
    fn unsubscribe(&mut self, window: WindowId);
    fn unsubscribe_all(&mut self);
    fn activate(&self) -> Result<()>;
}

pub trait AxWindow {
    /// `None` once the OS object is gone.
    fn window_id(&self) -> Option<WindowId>;
    fn attributes(&self) -> WindowAttributes;
    fn title(&self) -> Result<String>;
    fn position(&self) -> Result<Point>;
    fn size(&self) -> Result<Size>;
    fn set_position(&self, position: Point) -> Result<()>;
    fn set_size(&self, size: Size) -> Result<()>;
    fn is_fullscreen(&self) -> Result<bool>;
    fn set_fullscreen(&self, fullscreen: bool) -> Result<()>;
    fn is_minimized(&self) -> Result<bool>;
    fn set_minimized(&self, minimized: bool) -> Result<()>;
    /// Presses the close button. Fails with [`AxError::NotSupported`] when
    /// there is none.
    fn close(&self) -> Result<()>;
    fn raise(&self) -> Result<()>;
}

/// Process and display state that does not need an accessibility handle.
pub trait WindowServer {
    /// Running applications with the regular activation policy.
    fn running_apps(&self) -> Vec<(pid_t, AppInfo)>;
    fn is_terminated(&self, pid: pid_t) -> bool;
    fn is_hidden(&self, pid: pid_t) -> bool;
    fn frontmost_app(&self) -> Option<(pid_t, AppInfo)>;
    fn monitors(&self) -> Vec<MonitorInfo>;
    fn is_left_mouse_down(&self) -> bool;
    /// Asks the application to quit. Returns whether the request was accepted.
    fn terminate(&self, pid: pid_t) -> bool;
}
