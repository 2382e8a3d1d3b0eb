//! Volume geometry: axes, volume metadata, annotations and the coordinate mapper.
//!
//! A volume is addressed by integer coordinates `(x, y, z)`. The slice service
//! renders one 2-D cross-section at a time, holding one coordinate fixed:
//!
//! ```text
//!   sagittal  ->  x fixed, raster shows (y, z)
//!   coronal   ->  y fixed, raster shows (x, z)
//!   axial     ->  z fixed, raster shows (x, y)
//! ```
//!
//! Raster row 0 is the top of the displayed image while volume coordinate 0 is
//! the bottom, so the vertical raster axis is flipped in both directions. All of
//! that lives in [`mapper`]; everything else in the crate goes through it.

pub mod mapper;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use mapper::{
    display_to_raw, is_visible, pixel_to_volume, raster_dimensions, raw_to_display,
    visible_slice, volume_to_pixel, PixelPoint, VolumeCoord,
};

// =============================================================================
// Axis
// =============================================================================

/// One of the three orthogonal viewing planes through the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Sagittal,
    Coronal,
    Axial,
}

impl Axis {
    /// All axes in display order.
    pub const ALL: [Axis; 3] = [Axis::Sagittal, Axis::Coronal, Axis::Axial];

    /// Wire name used by the slice service.
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Sagittal => "sagittal",
            Axis::Coronal => "coronal",
            Axis::Axial => "axial",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sagittal" => Ok(Axis::Sagittal),
            "coronal" => Ok(Axis::Coronal),
            "axial" => Ok(Axis::Axial),
            other => Err(format!(
                "unknown axis '{}' (expected sagittal, coronal or axial)",
                other
            )),
        }
    }
}

// =============================================================================
// Volume Info
// =============================================================================

/// Per-axis extents of one image file.
///
/// Each range is an exclusive upper bound on that axis's slice index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    /// Full array shape as reported by the backend (may include a 4th dim)
    #[serde(default)]
    pub shape: Vec<u32>,

    /// Extent along x (number of sagittal slices)
    pub sagittal_range: u32,

    /// Extent along y (number of coronal slices)
    pub coronal_range: u32,

    /// Extent along z (number of axial slices)
    pub axial_range: u32,
}

impl VolumeInfo {
    pub fn new(sagittal_range: u32, coronal_range: u32, axial_range: u32) -> Self {
        Self {
            shape: vec![sagittal_range, coronal_range, axial_range],
            sagittal_range,
            coronal_range,
            axial_range,
        }
    }

    /// Number of slices along `axis`.
    pub fn range(&self, axis: Axis) -> u32 {
        match axis {
            Axis::Sagittal => self.sagittal_range,
            Axis::Coronal => self.coronal_range,
            Axis::Axial => self.axial_range,
        }
    }

    /// The slice the backend shows when no index is given.
    pub fn middle_slice(&self, axis: Axis) -> u32 {
        self.range(axis) / 2
    }

    /// Clamp a requested slice index into `[0, range)`.
    pub fn clamp_slice(&self, axis: Axis, index: i64) -> u32 {
        let max = i64::from(self.range(axis).saturating_sub(1));
        index.clamp(0, max) as u32
    }
}

// =============================================================================
// Annotation
// =============================================================================

/// A labeled point in volume space.
///
/// Within one file the label is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    pub label: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Annotation {
    pub fn new(label: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            label: label.into(),
            x,
            y,
            z,
        }
    }

    /// Build an annotation at a mapped volume position.
    pub fn at(label: impl Into<String>, coord: VolumeCoord) -> Self {
        Self::new(label, coord.x, coord.y, coord.z)
    }

    pub fn coord(&self) -> VolumeCoord {
        VolumeCoord {
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }
}
