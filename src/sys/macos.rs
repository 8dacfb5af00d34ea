//! The macOS backend.
//!
//! Accessibility observers deliver their notifications through the main run
//! loop, so the main thread runs [`run_main_loop`] for the lifetime of the
//! process. Everything else happens on the coordinator and actor threads.

mod app;
mod axuielement;
mod observer;
mod screen;
mod workspace;

use std::collections::BTreeSet;

use objc2::MainThreadMarker;
use objc2_core_foundation::{CFRunLoop, kCFRunLoopDefaultMode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use self::app::MacConnector;
pub use self::screen::ScreenCache;
pub use self::workspace::MacWindowServer;
use crate::actor;
use crate::actor::session::RefreshEvent;
use crate::sys::ax::{LOGIN_WINDOW_BUNDLE_ID, WindowServer, pid_t};

const POLL_INTERVAL_SECS: f64 = 0.25;

/// Whether the process may use the accessibility API.
pub fn is_accessibility_trusted() -> bool { unsafe { objc2_application_services::AXIsProcessTrusted() } }

/// Seconds to wait for an unresponsive application.
pub fn set_messaging_timeout(seconds: f32) {
    axuielement::AXUIElement::system_wide().set_messaging_timeout(seconds);
}

/// Runs the main run loop until `token` is cancelled.
///
/// Between run loop passes, screens and running applications are compared
/// with the previous pass and changes are reported as refresh events.
pub fn run_main_loop(
    mtm: MainThreadMarker,
    screens: ScreenCache,
    server: MacWindowServer,
    events: actor::Sender<RefreshEvent>,
    token: CancellationToken,
) {
    screens.refresh(mtm);
    let mut running: BTreeSet<pid_t> = server.running_apps().into_iter().map(|(pid, _)| pid).collect();
    let mut frontmost = server.frontmost_app();
    while !token.is_cancelled() {
        CFRunLoop::run_in_mode(unsafe { kCFRunLoopDefaultMode }, POLL_INTERVAL_SECS, false);

        if screens.refresh(mtm) {
            events.send(RefreshEvent::ScreenParametersChanged);
        }

        let now: BTreeSet<pid_t> = server.running_apps().into_iter().map(|(pid, _)| pid).collect();
        for &pid in now.difference(&running) {
            debug!(pid, "application launched");
            events.send(RefreshEvent::AppLaunched(pid));
        }
        for &pid in running.difference(&now) {
            debug!(pid, "application terminated");
            events.send(RefreshEvent::AppTerminated(pid));
        }
        running = now;

        let current = server.frontmost_app();
        if current.as_ref().map(|(pid, _)| *pid) != frontmost.as_ref().map(|(pid, _)| *pid) {
            let was_locked = frontmost.as_ref().is_some_and(|(_, app)| app.is_bundle(LOGIN_WINDOW_BUNDLE_ID));
            frontmost = current;
            if was_locked {
                info!("session unlocked");
                events.send(RefreshEvent::SessionUnlocked);
            } else {
                events.send(RefreshEvent::ActiveAppChanged);
            }
        }
    }
}
