//! Short-lived memory of windows that just disappeared.
//!
//! Locking the screen makes the accessibility API report most windows as
//! destroyed, and they come back with the same ids right after unlocking.
//! Remembering where each one was lets it return to the same slot instead of
//! being treated as a brand new window.

use std::time::{Duration, Instant};

use super::tree::{LayoutReason, SpecialKind};
use crate::common::collections::HashMap;
use crate::sys::ax::WindowId;
use crate::sys::geometry::Size;

#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// Child indices leading from the root container to the parent, then the
    /// index within the parent.
    Tiling { path: Vec<usize>, index: usize },
    Floating,
    Special(SpecialKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedWindow {
    pub closed_at: Instant,
    pub workspace: String,
    pub placement: Placement,
    pub weight: f64,
    pub layout_reason: LayoutReason,
    pub last_floating_size: Option<Size>,
}

pub struct ClosedWindowsCache {
    ttl: Duration,
    entries: HashMap<WindowId, ClosedWindow>,
}

impl ClosedWindowsCache {
    pub fn new(ttl: Duration) -> Self {
        ClosedWindowsCache { ttl, entries: HashMap::default() }
    }

    pub fn insert(&mut self, id: WindowId, closed: ClosedWindow) { self.entries.insert(id, closed); }

    /// Removes and returns the entry for `id` if it has not expired at `now`.
    pub fn take(&mut self, id: WindowId, now: Instant) -> Option<ClosedWindow> {
        let closed = self.entries.remove(&id)?;
        (now.saturating_duration_since(closed.closed_at) <= self.ttl).then_some(closed)
    }

    pub fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries.retain(|_, c| now.saturating_duration_since(c.closed_at) <= ttl);
    }

    pub fn clear(&mut self) { self.entries.clear(); }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn closed_at(at: Instant) -> ClosedWindow {
        ClosedWindow {
            closed_at: at,
            workspace: "1".into(),
            placement: Placement::Tiling { path: vec![], index: 1 },
            weight: 1.0,
            layout_reason: LayoutReason::Standard,
            last_floating_size: None,
        }
    }

    #[test]
    fn entries_are_taken_once() {
        let start = Instant::now();
        let mut cache = ClosedWindowsCache::new(Duration::from_millis(1000));
        cache.insert(WindowId::new(1, 1), closed_at(start));
        assert_eq!(cache.take(WindowId::new(1, 1), start), Some(closed_at(start)));
        assert_eq!(cache.take(WindowId::new(1, 1), start), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn entries_expire_by_age() {
        let start = Instant::now();
        let mut cache = ClosedWindowsCache::new(Duration::from_millis(1000));
        cache.insert(WindowId::new(1, 1), closed_at(start));
        cache.insert(WindowId::new(1, 2), closed_at(start + Duration::from_millis(600)));

        let later = start + Duration::from_millis(1200);
        cache.prune(later);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.take(WindowId::new(1, 1), later), None);
        assert!(cache.take(WindowId::new(1, 2), later).is_some());
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let start = Instant::now();
        let mut cache = ClosedWindowsCache::new(Duration::from_millis(10));
        cache.insert(WindowId::new(1, 1), closed_at(start));
        assert_eq!(cache.take(WindowId::new(1, 1), start + Duration::from_millis(11)), None);
        assert!(cache.is_empty());
    }
}
