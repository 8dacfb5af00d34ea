//! Hiding windows of invisible workspaces.
//!
//! There is no public API to hide one window, so windows of workspaces that
//! are not shown are pushed into a corner of their monitor, leaving one pixel
//! on screen. The corner is picked so the window does not spill onto a
//! neighbouring monitor.

use crate::sys::geometry::{Point, Rect, Size};

const ZOOM: &str = "us.zoom.xos";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideCorner {
    BottomLeft,
    BottomRight,
}

/// Picks a corner for the monitor with frame `monitor`, given all monitor
/// frames.
///
/// Three probes sit just outside each bottom corner. The bottom-left corner
/// is used only when something lies beyond the bottom-right corner and
/// nothing lies beyond the bottom-left one.
pub fn optimal_hide_corner(monitor: Rect, all: &[Rect]) -> HideCorner {
    let x_off = monitor.width() * 0.1;
    let y_off = monitor.height() * 0.1;
    let br = monitor.bottom_right();
    let bl = monitor.bottom_left();
    let right_probes = [
        br + Point::new(2.0, -y_off),
        br + Point::new(-x_off, 2.0),
        br + Point::new(2.0, 2.0),
    ];
    let left_probes = [
        bl + Point::new(-2.0, -y_off),
        bl + Point::new(x_off, 2.0),
        bl + Point::new(-2.0, 2.0),
    ];
    let occupied = |probes: &[Point; 3]| all.iter().any(|m| probes.iter().any(|&p| m.contains(p)));
    if occupied(&right_probes) && !occupied(&left_probes) {
        HideCorner::BottomLeft
    } else {
        HideCorner::BottomRight
    }
}

/// The top-left corner that leaves a window of `size` peeking out of
/// `corner` of `visible`.
pub fn hide_position(corner: HideCorner, visible: Rect, size: Size, bundle_id: Option<&str>) -> Point {
    // Zoom jumps back when moved with the one pixel offset.
    let epsilon = if bundle_id == Some(ZOOM) { 0.0 } else { 1.0 };
    match corner {
        HideCorner::BottomLeft => {
            visible.bottom_left() + Point::new(epsilon, -epsilon) + Point::new(-size.width, 0.0)
        }
        HideCorner::BottomRight => visible.bottom_right() - Point::new(epsilon, epsilon),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const A: Rect = Rect::new(0.0, 0.0, 1920.0, 1080.0);
    const B: Rect = Rect::new(1920.0, 0.0, 1920.0, 1080.0);

    #[test]
    fn single_monitor_hides_bottom_right() {
        assert_eq!(optimal_hide_corner(A, &[A]), HideCorner::BottomRight);
    }

    #[test]
    fn side_by_side_monitors_hide_away_from_each_other() {
        assert_eq!(optimal_hide_corner(A, &[A, B]), HideCorner::BottomLeft);
        assert_eq!(optimal_hide_corner(B, &[A, B]), HideCorner::BottomRight);
    }

    #[test]
    fn monitor_with_neighbours_on_both_sides_uses_bottom_right() {
        let c = Rect::new(-1920.0, 0.0, 1920.0, 1080.0);
        assert_eq!(optimal_hide_corner(A, &[c, A, B]), HideCorner::BottomRight);
    }

    #[test]
    fn hide_positions() {
        let size = Size::new(800.0, 600.0);
        assert_eq!(hide_position(HideCorner::BottomRight, B, size, None), Point::new(3839.0, 1079.0));
        assert_eq!(hide_position(HideCorner::BottomLeft, A, size, None), Point::new(-799.0, 1079.0));
        assert_eq!(
            hide_position(HideCorner::BottomRight, B, size, Some("us.zoom.xos")),
            Point::new(3840.0, 1080.0)
        );
    }
}
