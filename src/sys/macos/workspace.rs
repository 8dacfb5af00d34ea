use objc2::rc::Retained;
use objc2_app_kit::{NSApplicationActivationPolicy, NSEvent, NSRunningApplication, NSWorkspace};

use super::screen::ScreenCache;
use crate::sys::ax::{AppInfo, LOGIN_WINDOW_BUNDLE_ID, MonitorInfo, WindowServer, pid_t};

fn app_info(app: &NSRunningApplication) -> AppInfo {
    AppInfo {
        bundle_id: app.bundleIdentifier().map(|s| s.to_string()),
        localized_name: app.localizedName().map(|s| s.to_string()),
    }
}

fn running_app(pid: pid_t) -> Option<Retained<NSRunningApplication>> {
    NSRunningApplication::runningApplicationWithProcessIdentifier(pid)
}

/// The window server as seen through `NSWorkspace`.
#[derive(Clone, Default)]
pub struct MacWindowServer {
    screens: ScreenCache,
}

impl MacWindowServer {
    pub fn new(screens: ScreenCache) -> Self { MacWindowServer { screens } }
}

impl WindowServer for MacWindowServer {
    fn running_apps(&self) -> Vec<(pid_t, AppInfo)> {
        NSWorkspace::sharedWorkspace()
            .runningApplications()
            .iter()
            .filter(|app| {
                app.activationPolicy() == NSApplicationActivationPolicy::Regular
                    && app.bundleIdentifier().is_none_or(|b| b.to_string() != LOGIN_WINDOW_BUNDLE_ID)
            })
            .map(|app| (app.processIdentifier(), app_info(&app)))
            .collect()
    }

    fn is_terminated(&self, pid: pid_t) -> bool { running_app(pid).is_none_or(|app| app.isTerminated()) }

    fn is_hidden(&self, pid: pid_t) -> bool { running_app(pid).is_some_and(|app| app.isHidden()) }

    fn frontmost_app(&self) -> Option<(pid_t, AppInfo)> {
        let app = NSWorkspace::sharedWorkspace().frontmostApplication()?;
        Some((app.processIdentifier(), app_info(&app)))
    }

    fn monitors(&self) -> Vec<MonitorInfo> { self.screens.get() }

    fn is_left_mouse_down(&self) -> bool { NSEvent::pressedMouseButtons() & 1 != 0 }

    fn terminate(&self, pid: pid_t) -> bool { running_app(pid).is_some_and(|app| app.terminate()) }
}
