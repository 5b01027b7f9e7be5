//! NATS subject hierarchy.
//!
//! All streamer subjects are prefixed with `streamer.` to namespace within a
//! shared NATS cluster.

/// Root prefix for all streamer NATS subjects.
pub const PREFIX: &str = "streamer";

/// Wildcard matching every streamer subject.
pub const ALL: &str = "streamer.>";

// ── Observers ───────────────────────────────────────────────────────────────

/// A participant connected or moved. Game server → Streamer.
pub const OBSERVER_UPDATE: &str = "streamer.observer.update";

/// A participant disconnected. Game server → Streamer.
pub const OBSERVER_LEAVE: &str = "streamer.observer.leave";

// ── Entity lifecycle ────────────────────────────────────────────────────────

/// Something happened to a live entity. World → Streamer.
pub const LIFECYCLE: &str = "streamer.lifecycle";

/// Strip [`PREFIX`] from a subject, e.g. `streamer.observer.leave` →
/// `observer.leave`.
#[must_use]
pub fn operation(subject: &str) -> Option<&str> {
    subject.strip_prefix(PREFIX)?.strip_prefix('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects_share_prefix() {
        for subject in [OBSERVER_UPDATE, OBSERVER_LEAVE, LIFECYCLE] {
            assert!(subject.starts_with(PREFIX));
        }
    }

    #[test]
    fn test_operation() {
        assert_eq!(operation(OBSERVER_LEAVE), Some("observer.leave"));
        assert_eq!(operation(LIFECYCLE), Some("lifecycle"));
        assert_eq!(operation("streamerx.lifecycle"), None);
        assert_eq!(operation("engine.coord.tick"), None);
    }
}
