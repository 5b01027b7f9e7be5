//! Entity descriptors.
//!
//! An [`EntityDescriptor`] is the immutable description of something that may
//! be placed in the world. It exists independently of whether the entity is
//! currently materialized: the streamer decides that every tick.
//!
//! Descriptors are validated once, at construction, and shared afterwards as
//! `Arc<EntityDescriptor>`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use streamer_math::Placement;
use uuid::Uuid;

use crate::attributes::Attributes;
use crate::error::DescriptorError;
use crate::kind::EntityKind;

/// Identity of a descriptor.
///
/// Minted fresh for every constructed descriptor, so two descriptors with
/// identical fields are still distinct entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DescriptorId(pub Uuid);

impl DescriptorId {
    /// Mint a new random identity.
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The caller-supplied fields of a descriptor, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorSpec {
    pub kind: EntityKind,
    pub placement: Placement,
    #[serde(default)]
    pub attributes: Attributes,
    /// Absent for ephemeral entities. Present for persistent entities, which
    /// may be pinned and are force-respawned after standing vacant this long.
    #[serde(default, with = "optional_secs")]
    pub respawn_delay: Option<Duration>,
}

impl DescriptorSpec {
    /// Spec for an ephemeral entity with no attributes.
    #[must_use]
    pub fn new(kind: EntityKind, placement: Placement) -> Self {
        Self {
            kind,
            placement,
            attributes: Attributes::default(),
            respawn_delay: None,
        }
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    #[must_use]
    pub fn with_respawn_delay(mut self, delay: Duration) -> Self {
        self.respawn_delay = Some(delay);
        self
    }
}

/// Immutable description of a placeable entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    id: DescriptorId,
    kind: EntityKind,
    placement: Placement,
    attributes: Attributes,
    respawn_delay: Option<Duration>,
}

impl EntityDescriptor {
    /// Validate a spec and mint a descriptor with a fresh identity.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] if the kind, position, orientation or
    /// respawn delay is malformed.
    pub fn new(spec: DescriptorSpec) -> Result<Self, DescriptorError> {
        spec.kind.validate()?;

        let position = spec.placement.position;
        if !spec.placement.has_finite_position() {
            return Err(DescriptorError::InvalidPosition {
                x: position.x,
                y: position.y,
                z: position.z,
            });
        }
        if !spec.placement.has_valid_rotation() {
            return Err(DescriptorError::InvalidOrientation);
        }
        if spec.respawn_delay.is_some_and(|d| d.is_zero()) {
            return Err(DescriptorError::InvalidRespawnDelay);
        }

        Ok(Self {
            id: DescriptorId::new_v4(),
            kind: spec.kind,
            placement: spec.placement,
            attributes: spec.attributes,
            respawn_delay: spec.respawn_delay,
        })
    }

    #[must_use]
    pub fn id(&self) -> DescriptorId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// Allocator class, shorthand for `kind().class()`.
    #[must_use]
    pub fn class(&self) -> &'static str {
        self.kind.class()
    }

    #[must_use]
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub fn respawn_delay(&self) -> Option<Duration> {
        self.respawn_delay
    }

    /// Persistent descriptors carry a respawn delay and may be pinned.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.respawn_delay.is_some()
    }
}

/// Serialize `Option<Duration>` as fractional seconds, which is how
/// configuration files spell it.
mod optional_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        match secs {
            Some(s) if !s.is_finite() || s < 0.0 => Err(serde::de::Error::custom(format!(
                "respawn delay must be a non-negative number of seconds, got {s}"
            ))),
            Some(s) => Duration::try_from_secs_f64(s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use streamer_math::{Quat, Vec3};

    use super::*;

    fn vehicle_at(x: f32, y: f32) -> DescriptorSpec {
        DescriptorSpec::new(
            EntityKind::Vehicle { model: 411 },
            Placement::from_heading(Vec3::new(x, y, 3.0), 180.0),
        )
    }

    #[test]
    fn test_identical_specs_have_distinct_identity() {
        let a = EntityDescriptor::new(vehicle_at(1.0, 2.0)).unwrap();
        let b = EntityDescriptor::new(vehicle_at(1.0, 2.0)).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.class(), "vehicle");
    }

    #[test]
    fn test_persistence_follows_respawn_delay() {
        let ephemeral = EntityDescriptor::new(vehicle_at(0.0, 0.0)).unwrap();
        assert!(!ephemeral.is_persistent());

        let persistent = EntityDescriptor::new(
            vehicle_at(0.0, 0.0).with_respawn_delay(Duration::from_secs(120)),
        )
        .unwrap();
        assert!(persistent.is_persistent());
        assert_eq!(persistent.respawn_delay(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_rejects_bad_position() {
        let spec = vehicle_at(f32::NAN, 0.0);
        assert!(matches!(
            EntityDescriptor::new(spec),
            Err(DescriptorError::InvalidPosition { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_orientation() {
        let mut spec = vehicle_at(0.0, 0.0);
        spec.placement.rotation = Quat::from_xyzw(1.0, 1.0, 0.0, 0.0);
        assert_eq!(
            EntityDescriptor::new(spec),
            Err(DescriptorError::InvalidOrientation)
        );
    }

    #[test]
    fn test_rejects_bad_kind_and_zero_delay() {
        let spec = DescriptorSpec::new(EntityKind::Vehicle { model: 12 }, Placement::ORIGIN);
        assert!(matches!(
            EntityDescriptor::new(spec),
            Err(DescriptorError::InvalidKind { .. })
        ));

        let spec = vehicle_at(0.0, 0.0).with_respawn_delay(Duration::ZERO);
        assert_eq!(
            EntityDescriptor::new(spec),
            Err(DescriptorError::InvalidRespawnDelay)
        );
    }

    #[test]
    fn test_spec_from_json() {
        let json = r#"{
            "kind": { "class": "vehicle", "model": 560 },
            "placement": { "position": [10.0, 20.0, 3.0], "rotation": [0.0, 0.0, 0.0, 1.0] },
            "attributes": { "primary_colour": 1, "siren": false },
            "respawn_delay": 90.5
        }"#;
        let spec: DescriptorSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.kind, EntityKind::Vehicle { model: 560 });
        assert_eq!(spec.respawn_delay, Some(Duration::from_secs_f64(90.5)));
        assert_eq!(spec.attributes.int("primary_colour"), Some(1));
        assert!(EntityDescriptor::new(spec).is_ok());
    }

    #[test]
    fn test_spec_rejects_out_of_range_delay() {
        for delay in ["1e30", "-5", "1.8446744073709552e19"] {
            let json = format!(
                r#"{{
                    "kind": {{ "class": "vehicle", "model": 560 }},
                    "placement": {{ "position": [0.0, 0.0, 0.0] }},
                    "respawn_delay": {delay}
                }}"#
            );
            assert!(
                serde_json::from_str::<DescriptorSpec>(&json).is_err(),
                "{delay} accepted"
            );
        }
    }
}
