use std::sync::Arc;

use objc2::MainThreadMarker;
use objc2_app_kit::NSScreen;
use objc2_core_foundation::CGRect;
use parking_lot::Mutex;
use tracing::debug;

use crate::sys::ax::MonitorInfo;
use crate::sys::geometry::Rect;

/// Display frames as last read on the main thread.
///
/// `NSScreen` may only be queried from the main thread, while the window
/// server trait is used from the coordinator.
#[derive(Clone, Default)]
pub struct ScreenCache(Arc<Mutex<Vec<MonitorInfo>>>);

impl ScreenCache {
    pub fn get(&self) -> Vec<MonitorInfo> { self.0.lock().clone() }

    /// Re-reads the displays. Returns whether anything changed.
    pub fn refresh(&self, mtm: MainThreadMarker) -> bool {
        let screens = read_screens(mtm);
        let mut cached = self.0.lock();
        if *cached == screens {
            return false;
        }
        debug!(count = screens.len(), "screen parameters changed");
        *cached = screens;
        true
    }
}

fn read_screens(mtm: MainThreadMarker) -> Vec<MonitorInfo> {
    let screens = NSScreen::screens(mtm);
    // Cocoa puts the origin at the bottom left of the main screen.
    let Some(main_height) = screens.iter().next().map(|s| s.frame().size.height) else {
        return Vec::new();
    };
    let flip = |rect: CGRect| {
        Rect::new(
            rect.origin.x,
            main_height - rect.origin.y - rect.size.height,
            rect.size.width,
            rect.size.height,
        )
    };
    screens
        .iter()
        .map(|screen| MonitorInfo {
            frame: flip(screen.frame()),
            visible_frame: flip(screen.visibleFrame()),
        })
        .collect()
}

