use tracing::warn;

use super::ax::AxApp;

/// Runs `f` with the app's enhanced user interface turned off.
///
/// Apps with `AXEnhancedUserInterface` set animate frame changes and may
/// ignore some of them. The prior state is restored whatever `f` returns.
pub fn with_enhanced_ui_disabled<R>(app: &dyn AxApp, f: impl FnOnce() -> R) -> R {
    let original_state = app.enhanced_user_interface().unwrap_or(false);

    if original_state {
        if let Err(error) = app.set_enhanced_user_interface(false) {
            warn!("Failed to disable Enhanced User Interface: {error:?}");
        }
    }

    let result = f();

    if original_state {
        if let Err(error) = app.set_enhanced_user_interface(true) {
            warn!("Failed to restore Enhanced User Interface: {error:?}");
        }
    }

    result
}
