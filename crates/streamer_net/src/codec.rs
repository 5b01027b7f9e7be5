//! MessagePack codec helpers.
//!
//! Thin wrappers around `rmp-serde`. All ingress payloads are MessagePack;
//! structs are encoded as maps so fields can be added without breaking
//! older publishers.

use serde::{Deserialize, Serialize};

use crate::error::NetError;

/// Encode a value to MessagePack bytes, with named fields.
///
/// # Errors
///
/// Returns [`NetError::Encode`] if serialisation fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, NetError> {
    rmp_serde::to_vec_named(value).map_err(NetError::Encode)
}

/// Decode a value from MessagePack bytes.
///
/// # Errors
///
/// Returns [`NetError::Decode`] if deserialisation fails.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, NetError> {
    rmp_serde::from_slice(bytes).map_err(NetError::Decode)
}

#[cfg(test)]
mod tests {
    use streamer_entity::{LifecycleEvent, LiveHandle};
    use streamer_math::Vec3;

    use super::*;
    use crate::messages::{LifecycleNotice, ObserverUpdate};

    #[test]
    fn test_observer_update_roundtrip() {
        let msg = ObserverUpdate {
            observer: 42,
            position: Vec3::new(1.0, -2.5, 30.0),
        };
        let bytes = encode(&msg).unwrap();
        let restored: ObserverUpdate = decode(&bytes).unwrap();
        assert_eq!(msg, restored);
    }

    #[test]
    fn test_lifecycle_notice_roundtrip() {
        let msg = LifecycleNotice {
            event: LifecycleEvent::LastOccupantLeft {
                handle: LiveHandle::from_raw(9),
            },
        };
        let restored: LifecycleNotice = decode(&encode(&msg).unwrap()).unwrap();
        assert_eq!(msg, restored);
    }

    #[test]
    fn test_decode_invalid_bytes() {
        let result: Result<ObserverUpdate, _> = decode(&[0xFF, 0xFF]);
        assert!(matches!(result, Err(NetError::Decode(_))));
    }
}
