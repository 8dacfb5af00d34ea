//! Decides how a newly detected window is managed.
//!
//! These are pure functions over an attribute snapshot, so presenting the same
//! window twice always gives the same answer.

use crate::sys::ax::{AX_STANDARD_WINDOW_SUBROLE, AppInfo, WindowAttributes, WindowButtons};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowClass {
    /// Menus, tooltips and other transient surfaces. Tracked but never laid out.
    Popup,
    /// Floats on its workspace.
    Dialog,
    Tiling,
}

const GHOSTTY: &str = "com.mitchellh.ghostty";
const GHOSTTY_QUICK_TERMINAL: &str = "com.mitchellh.ghostty.quickTerminal";
const FIREFOX: &str = "org.mozilla.firefox";
const PHOTO_BOOTH: &str = "com.apple.PhotoBooth";

/// Apps whose regular windows can't enter native fullscreen but still tile.
const NOT_FULLSCREENABLE_BUT_TILED: &[&str] = &[
    "org.gimp.gimp-2.10",
    "com.apple.ActivityMonitor",
    "org.alacritty",
    "net.kovidgoyal.kitty",
    GHOSTTY,
    "com.github.wez.wezterm",
    "com.googlecode.iterm2",
    "org.gnu.Emacs",
];

pub fn classify(attrs: &WindowAttributes, app: &AppInfo, is_app_focused_window: bool) -> WindowClass {
    if !is_window(attrs, app, is_app_focused_window) {
        WindowClass::Popup
    } else if is_dialog(attrs, app) {
        WindowClass::Dialog
    } else {
        WindowClass::Tiling
    }
}

fn is_standard(attrs: &WindowAttributes) -> bool {
    attrs.subrole.as_deref() == Some(AX_STANDARD_WINDOW_SUBROLE)
}

fn is_window(attrs: &WindowAttributes, app: &AppInfo, is_app_focused_window: bool) -> bool {
    if app.is_bundle(GHOSTTY) && attrs.identifier.as_deref() == Some(GHOSTTY_QUICK_TERMINAL) {
        return false;
    }
    // Popups have none of the title bar buttons, but some real windows hide
    // them too; those still report focus or the standard subrole.
    attrs.buttons.intersects(WindowButtons::all())
        || attrs.is_focused
        || attrs.is_main
        || is_app_focused_window
        || is_standard(attrs)
}

fn is_dialog(attrs: &WindowAttributes, app: &AppInfo) -> bool {
    if !is_standard(attrs) {
        return true;
    }
    if app.is_bundle(FIREFOX) && !attrs.enabled_buttons.contains(WindowButtons::MINIMIZE) {
        // Picture-in-picture and the like.
        return true;
    }
    if app.is_bundle(PHOTO_BOOTH) {
        return true;
    }
    let fullscreenable = attrs.enabled_buttons.contains(WindowButtons::FULLSCREEN);
    let allow_listed = app
        .bundle_id
        .as_deref()
        .is_some_and(|id| NOT_FULLSCREENABLE_BUT_TILED.contains(&id));
    !fullscreenable && !allow_listed
}
