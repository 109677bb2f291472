//! EXIF orientation codes mapped to rotate/flip plans.
//!
//! Cameras record how the sensor was held as a code from 1 to 8. Each code is
//! undone by a counter-clockwise quarter-turn rotation followed by an optional
//! horizontal flip:
//!
//! | code | rotation (ccw) | flip | swaps width/height |
//! |---|---|---|---|
//! | 1 | 0 | no | no |
//! | 2 | 0 | yes | no |
//! | 3 | 180 | no | no |
//! | 4 | 180 | yes | no |
//! | 5 | 270 | yes | yes |
//! | 6 | 270 | no | yes |
//! | 7 | 90 | yes | yes |
//! | 8 | 90 | no | yes |
//!
//! Code 0 is treated like 1: some writers store it for "unknown".

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Unknown orientation {0}, expected a value between 0 and 8")]
pub struct UnsupportedOrientation(pub u32);

/// Counter-clockwise rotation in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Ccw90,
    Ccw180,
    Ccw270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Ccw90 => 90,
            Rotation::Ccw180 => 180,
            Rotation::Ccw270 => 270,
        }
    }
}

/// What to do to a buffer to display it upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformPlan {
    pub rotation: Rotation,
    /// Applied after the rotation.
    pub flip_horizontal: bool,
    pub swaps_dimensions: bool,
}

impl TransformPlan {
    pub fn for_orientation(code: u32) -> Result<Self, UnsupportedOrientation> {
        let (rotation, flip_horizontal) = match code {
            0 | 1 => (Rotation::None, false),
            2 => (Rotation::None, true),
            3 => (Rotation::Ccw180, false),
            4 => (Rotation::Ccw180, true),
            5 => (Rotation::Ccw270, true),
            6 => (Rotation::Ccw270, false),
            7 => (Rotation::Ccw90, true),
            8 => (Rotation::Ccw90, false),
            other => return Err(UnsupportedOrientation(other)),
        };
        Ok(Self {
            rotation,
            flip_horizontal,
            swaps_dimensions: matches!(rotation, Rotation::Ccw90 | Rotation::Ccw270),
        })
    }

    /// True when the plan leaves the image untouched.
    pub fn is_identity(&self) -> bool {
        self.rotation == Rotation::None && !self.flip_horizontal
    }
}
