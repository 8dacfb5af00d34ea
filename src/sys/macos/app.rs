//! Accessibility handles for one application.

use std::cell::RefCell;

use objc2_app_kit::{NSApplicationActivationOptions, NSRunningApplication};
use tracing::{debug, trace};

use super::axuielement::AXUIElement;
use super::observer::Observer;
use crate::common::collections::HashMap;
use crate::sys::ax::{
    self, APP_NOTIFICATIONS, AppInfo, AxApp, AxConnector, AxError, AxEvent, AxEventSender,
    AxNotification, AxWindow, WINDOW_NOTIFICATIONS, WindowAttributes, WindowId, pid_t,
};
use crate::sys::geometry::{Point, Size};

/// Opens accessibility connections to running applications.
pub struct MacConnector;

impl AxConnector for MacConnector {
    fn connect(&self, pid: pid_t, info: &AppInfo, events: AxEventSender) -> ax::Result<Box<dyn AxApp>> {
        let element = AXUIElement::application(pid);
        let observer = Observer::new(pid)?.install(move |elem: AXUIElement, name: &str| {
            let Some(notification) = parse_notification(name) else { return };
            let window = elem.window_server_id().ok().map(|idx| WindowId::new(pid, idx));
            trace!(pid, ?window, ?notification, "accessibility notification");
            events.send(AxEvent { pid, window, notification });
        });
        for notification in APP_NOTIFICATIONS {
            observer.add_notification(&element, notification.name())?;
        }
        debug!(pid, app = info.display_name(), "connected to application");
        Ok(Box::new(MacApp {
            pid,
            element,
            observer,
            windows: RefCell::default(),
        }))
    }
}

fn parse_notification(name: &str) -> Option<AxNotification> {
    WINDOW_NOTIFICATIONS.iter().chain(APP_NOTIFICATIONS).copied().find(|n| n.name() == name)
}

struct MacApp {
    pid: pid_t,
    element: AXUIElement,
    observer: Observer,
    /// Elements of windows seen so far, for subscribing by id.
    windows: RefCell<HashMap<WindowId, AXUIElement>>,
}

impl AxApp for MacApp {
    fn windows(&self) -> ax::Result<Vec<Box<dyn AxWindow>>> {
        let elements = self.element.windows()?;
        let mut known = self.windows.borrow_mut();
        Ok(elements
            .into_iter()
            .map(|element| {
                let window = MacWindow { pid: self.pid, element };
                if let Some(id) = window.window_id() {
                    known.insert(id, window.element.clone());
                }
                Box::new(window) as Box<dyn AxWindow>
            })
            .collect())
    }

    fn focused_window(&self) -> Option<WindowId> {
        let element = self.element.element_attribute("AXFocusedWindow").ok()?;
        let idx = element.window_server_id().ok()?;
        Some(WindowId::new(self.pid, idx))
    }

    fn enhanced_user_interface(&self) -> ax::Result<bool> {
        self.element.bool_attribute("AXEnhancedUserInterface")
    }

    fn set_enhanced_user_interface(&self, enabled: bool) -> ax::Result<()> {
        self.element.set_bool_attribute("AXEnhancedUserInterface", enabled)
    }

    fn subscribe(&mut self, window: &dyn AxWindow, notifications: &[AxNotification]) -> ax::Result<()> {
        let id = window.window_id().ok_or(AxError::InvalidElement)?;
        let windows = self.windows.borrow();
        let element = windows.get(&id).ok_or(AxError::InvalidElement)?;
        for notification in notifications {
            self.observer.add_notification(element, notification.name())?;
        }
        Ok(())
    }

    fn unsubscribe(&mut self, window: WindowId) {
        let Some(element) = self.windows.get_mut().remove(&window) else { return };
        for notification in WINDOW_NOTIFICATIONS {
            _ = self.observer.remove_notification(&element, notification.name());
        }
    }

    fn unsubscribe_all(&mut self) {
        let ids: Vec<WindowId> = self.windows.get_mut().keys().copied().collect();
        for id in ids {
            self.unsubscribe(id);
        }
        for notification in APP_NOTIFICATIONS {
            _ = self.observer.remove_notification(&self.element, notification.name());
        }
    }

    fn activate(&self) -> ax::Result<()> {
        let app = NSRunningApplication::runningApplicationWithProcessIdentifier(self.pid)
            .ok_or(AxError::InvalidElement)?;
        #[allow(deprecated)]
        let options = NSApplicationActivationOptions::ActivateIgnoringOtherApps;
        if app.activateWithOptions(options) { Ok(()) } else { Err(AxError::CannotComplete) }
    }
}

struct MacWindow {
    pid: pid_t,
    element: AXUIElement,
}

impl AxWindow for MacWindow {
    fn window_id(&self) -> Option<WindowId> {
        let idx = self.element.window_server_id().ok()?;
        Some(WindowId::new(self.pid, idx))
    }

    fn attributes(&self) -> WindowAttributes {
        let (buttons, enabled_buttons) = self.element.buttons();
        WindowAttributes {
            subrole: self.element.string_attribute("AXSubrole").ok(),
            identifier: self.element.string_attribute("AXIdentifier").ok(),
            buttons,
            enabled_buttons,
            is_focused: self.element.bool_attribute("AXFocused").unwrap_or(false),
            is_main: self.element.bool_attribute("AXMain").unwrap_or(false),
        }
    }

    fn title(&self) -> ax::Result<String> { self.element.string_attribute("AXTitle") }

    fn position(&self) -> ax::Result<Point> { self.element.position() }

    fn size(&self) -> ax::Result<Size> { self.element.size() }

    fn set_position(&self, position: Point) -> ax::Result<()> { self.element.set_position(position) }

    fn set_size(&self, size: Size) -> ax::Result<()> { self.element.set_size(size) }

    fn is_fullscreen(&self) -> ax::Result<bool> { self.element.bool_attribute("AXFullScreen") }

    fn set_fullscreen(&self, fullscreen: bool) -> ax::Result<()> {
        self.element.set_bool_attribute("AXFullScreen", fullscreen)
    }

    fn is_minimized(&self) -> ax::Result<bool> { self.element.bool_attribute("AXMinimized") }

    fn set_minimized(&self, minimized: bool) -> ax::Result<()> {
        self.element.set_bool_attribute("AXMinimized", minimized)
    }

    fn close(&self) -> ax::Result<()> {
        let button = self.element.element_attribute("AXCloseButton").map_err(|err| match err {
            AxError::NoValue => AxError::NotSupported,
            err => err,
        })?;
        button.perform_action("AXPress")
    }

    fn raise(&self) -> ax::Result<()> {
        self.element.perform_action("AXRaise")?;
        self.element.set_bool_attribute("AXMain", true)
    }
}
