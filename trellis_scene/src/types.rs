// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Identity and capability types shared across the crate.

use alloc::string::String;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

/// Identity of a scene object within a graph.
///
/// Keys are plain strings so hosts can assign stable, human-readable
/// identities (`"time-picker"`, `"panel-3"`) for lookup and URL wiring.
/// Objects constructed without an explicit key receive a generated one,
/// unique within the process.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SceneKey(String);

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

impl SceneKey {
    /// Creates a key from an explicit identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh process-unique key.
    ///
    /// Generated keys follow a monotone sequence (`obj-1`, `obj-2`, ...),
    /// which keeps them cheap to produce and stable to log.
    pub fn generate() -> Self {
        let n = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        Self(alloc::format!("obj-{n}"))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SceneKey {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SceneKey {
    fn from(id: String) -> Self {
        Self(id)
    }
}

bitflags! {
    /// Capability markers a concrete object kind may declare.
    ///
    /// Capabilities replace structural "does it happen to have this method"
    /// probing: traversal helpers and hosts test membership explicitly via
    /// [`ObjectKind::capabilities`](crate::object::ObjectKind::capabilities).
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct Capabilities: u8 {
        /// The kind arranges child objects and participates in layout.
        const LAYOUT = 0b0000_0001;
        /// The kind tracks in-flight query activity for its subtree.
        const QUERY_CONTROLLER = 0b0000_0010;
        /// The kind contributes state to URL synchronization.
        const URL_SYNCABLE = 0b0000_0100;
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_unique() {
        let a = SceneKey::generate();
        let b = SceneKey::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("obj-"));
    }

    #[test]
    fn explicit_keys_compare_by_value() {
        let a = SceneKey::new("panel-3");
        let b = SceneKey::from("panel-3");
        assert_eq!(a, b);
        assert_eq!(alloc::format!("{a}"), "panel-3");
    }

    #[test]
    fn capabilities_default_empty() {
        assert_eq!(Capabilities::default(), Capabilities::empty());
        let caps = Capabilities::LAYOUT | Capabilities::URL_SYNCABLE;
        assert!(caps.contains(Capabilities::LAYOUT));
        assert!(!caps.contains(Capabilities::QUERY_CONTROLLER));
    }
}
