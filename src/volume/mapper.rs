//! Pixel <-> volume coordinate mapping.
//!
//! Pixel coordinates are measured top-down on the *unscaled* raster the slice
//! service returns; `image_height` is that raster's height for the current
//! axis. Anything in display (scaled) space must go through
//! [`display_to_raw`] first.
//!
//! | axis     | fixed | pixel -> volume                  | volume -> pixel        |
//! |----------|-------|----------------------------------|------------------------|
//! | sagittal | x     | x=slice, y=px, z=h-1-py          | px=y, py=h-1-z         |
//! | coronal  | y     | y=slice, x=px, z=h-1-py          | px=x, py=h-1-z         |
//! | axial    | z     | z=slice, x=px, y=h-1-py          | px=x, py=h-1-y         |

use super::{Axis, VolumeInfo};

/// Integer position in volume space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VolumeCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Integer position on the raw raster (row 0 at the top).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelPoint {
    pub x: i64,
    pub y: i64,
}

/// Map a raw-raster pixel on `axis` at `slice_index` to volume coordinates.
///
/// Both pixel components are rounded to the nearest integer first.
pub fn pixel_to_volume(
    axis: Axis,
    slice_index: u32,
    pixel_x: f64,
    pixel_y: f64,
    image_height: u32,
) -> VolumeCoord {
    let px = pixel_x.round() as i64;
    let py = pixel_y.round() as i64;
    let flipped = (i64::from(image_height) - 1 - py) as i32;
    let px = px as i32;
    let slice = slice_index as i32;

    match axis {
        Axis::Sagittal => VolumeCoord {
            x: slice,
            y: px,
            z: flipped,
        },
        Axis::Coronal => VolumeCoord {
            x: px,
            y: slice,
            z: flipped,
        },
        Axis::Axial => VolumeCoord {
            x: px,
            y: flipped,
            z: slice,
        },
    }
}

/// Raw-raster pixel at which `coord` is drawn on `axis`.
pub fn volume_to_pixel(coord: VolumeCoord, axis: Axis, image_height: u32) -> PixelPoint {
    let h = i64::from(image_height);
    match axis {
        Axis::Sagittal => PixelPoint {
            x: i64::from(coord.y),
            y: h - 1 - i64::from(coord.z),
        },
        Axis::Coronal => PixelPoint {
            x: i64::from(coord.x),
            y: h - 1 - i64::from(coord.z),
        },
        Axis::Axial => PixelPoint {
            x: i64::from(coord.x),
            y: h - 1 - i64::from(coord.y),
        },
    }
}

/// The slice index on `axis` on which `coord` is visible.
pub fn visible_slice(coord: VolumeCoord, axis: Axis) -> i32 {
    match axis {
        Axis::Sagittal => coord.x,
        Axis::Coronal => coord.y,
        Axis::Axial => coord.z,
    }
}

/// Exact integer match between the axis-fixed coordinate and the slice index.
pub fn is_visible(coord: VolumeCoord, axis: Axis, slice_index: u32) -> bool {
    i64::from(visible_slice(coord, axis)) == i64::from(slice_index)
}

/// Convert a display-space coordinate to raw-raster space.
pub fn display_to_raw(display: f64, scale_ratio: f64) -> f64 {
    if scale_ratio > 0.0 {
        display / scale_ratio
    } else {
        display
    }
}

/// Convert a raw-raster coordinate to display space.
pub fn raw_to_display(raw: f64, scale_ratio: f64) -> f64 {
    raw * scale_ratio
}

/// Raw raster `(width, height)` the slice service produces for `axis`.
///
/// Slices are rotated by 90 degrees before encoding, so the second in-plane
/// volume axis ends up vertical.
pub fn raster_dimensions(info: &VolumeInfo, axis: Axis) -> (u32, u32) {
    match axis {
        Axis::Sagittal => (info.coronal_range, info.axial_range),
        Axis::Coronal => (info.sagittal_range, info.axial_range),
        Axis::Axial => (info.sagittal_range, info.coronal_range),
    }
}
