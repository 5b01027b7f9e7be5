//! Entity kinds.
//!
//! The kind decides which world engine call materializes a descriptor and
//! which allocator class it is streamed by.

use serde::{Deserialize, Serialize};

use crate::error::DescriptorError;

/// Lowest valid vehicle model id.
pub const MIN_VEHICLE_MODEL: u16 = 400;

/// Highest valid vehicle model id.
pub const MAX_VEHICLE_MODEL: u16 = 611;

/// Maximum label text length in bytes.
pub const MAX_LABEL_LEN: usize = 1024;

/// What a descriptor materializes as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum EntityKind {
    /// A drivable vehicle.
    Vehicle { model: u16 },
    /// A static world prop.
    Prop { model: u32 },
    /// A collectable pickup.
    Pickup { model: u32, pickup_type: u8 },
    /// A floating 3D text label.
    Label { text: String, draw_distance: f32 },
}

impl EntityKind {
    /// The allocator class this kind belongs to.
    #[must_use]
    pub fn class(&self) -> &'static str {
        match self {
            Self::Vehicle { .. } => "vehicle",
            Self::Prop { .. } => "prop",
            Self::Pickup { .. } => "pickup",
            Self::Label { .. } => "label",
        }
    }

    /// Check the kind's payload.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::InvalidKind`] when a model id is out of
    /// range or a label is empty, oversized, or has a bad draw distance.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let invalid = |reason: String| DescriptorError::InvalidKind {
            class: self.class(),
            reason,
        };

        match self {
            Self::Vehicle { model } => {
                if !(MIN_VEHICLE_MODEL..=MAX_VEHICLE_MODEL).contains(model) {
                    return Err(invalid(format!(
                        "model {model} outside {MIN_VEHICLE_MODEL}..={MAX_VEHICLE_MODEL}"
                    )));
                }
            }
            Self::Prop { model } | Self::Pickup { model, .. } => {
                if *model == 0 {
                    return Err(invalid("model id 0 is reserved".to_string()));
                }
            }
            Self::Label {
                text,
                draw_distance,
            } => {
                if text.is_empty() {
                    return Err(invalid("text is empty".to_string()));
                }
                if text.len() > MAX_LABEL_LEN {
                    return Err(invalid(format!(
                        "text is {} bytes, limit is {MAX_LABEL_LEN}",
                        text.len()
                    )));
                }
                if !draw_distance.is_finite() || *draw_distance <= 0.0 {
                    return Err(invalid(format!("draw distance {draw_distance}")));
                }
            }
        }
        Ok(())
    }
}
