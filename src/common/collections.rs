//! Hash collections used across the crate.
//!
//! Keys are small integers and slotmap handles, so the Fx hasher is used
//! instead of SipHash.

pub use std::collections::BTreeMap;

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<K> = rustc_hash::FxHashSet<K>;
