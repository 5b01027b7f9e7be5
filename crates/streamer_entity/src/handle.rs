//! Live handle type and allocation utilities.
//!
//! A [`LiveHandle`] is the world engine's reference to a materialized entity.
//! It is a lightweight `u64` with no inherent data; the streamer only stores it
//! against the descriptor it was created from and hands it back on destroy.

use serde::{Deserialize, Serialize};

/// Opaque token identifying a materialized entity in the world engine.
///
/// At most one handle exists per registered descriptor at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LiveHandle(pub u64);

impl LiveHandle {
    /// The null / invalid handle sentinel.
    pub const INVALID: LiveHandle = LiveHandle(0);

    /// Create a handle from a raw `u64` value.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` value.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) handle.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for LiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LiveHandle({})", self.0)
    }
}

/// Hands out monotonically increasing live handles.
///
/// World engine implementations use this to mint handles. Values are never
/// recycled, so a stale handle can never alias a newer entity.
#[derive(Debug)]
pub struct HandleAllocator {
    next_id: u64,
}

impl HandleAllocator {
    /// Creates a new allocator. Handles start at 1 (0 is [`LiveHandle::INVALID`]).
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Allocates a fresh handle.
    pub fn allocate(&mut self) -> LiveHandle {
        let id = self.next_id;
        self.next_id += 1;
        LiveHandle(id)
    }

    /// Returns the number of handles allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id - 1
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_creation() {
        let h = LiveHandle::from_raw(42);
        assert_eq!(h.id(), 42);
        assert!(h.is_valid());
        assert_eq!(h.to_string(), "LiveHandle(42)");
    }

    #[test]
    fn test_handle_invalid() {
        assert!(!LiveHandle::INVALID.is_valid());
        assert_eq!(LiveHandle::INVALID.id(), 0);
    }

    #[test]
    fn test_allocator_never_reuses_handles() {
        let mut alloc = HandleAllocator::new();
        let h1 = alloc.allocate();
        let h2 = alloc.allocate();
        let h3 = alloc.allocate();
        assert_eq!(h1.id(), 1);
        assert_eq!(h2.id(), 2);
        assert_eq!(h3.id(), 3);
        assert_eq!(alloc.count(), 3);
    }
}
