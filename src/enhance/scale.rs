//! Scale-to-fit for the display region.

use image::imageops::{self, FilterType};
use image::RgbaImage;

/// Result of fitting a raw raster into a display region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleToFit {
    /// Display pixels per raw raster pixel
    pub ratio: f64,

    /// Scaled width (floored, at least 1)
    pub width: u32,

    /// Scaled height (floored, at least 1)
    pub height: u32,
}

impl ScaleToFit {
    /// Identity fit for a raster that is drawn at its native size.
    pub fn identity(width: u32, height: u32) -> Self {
        Self {
            ratio: 1.0,
            width,
            height,
        }
    }
}

/// Compute `min(region_w / raw_w, region_h / raw_h)` and the floored scaled size.
pub fn fit_to_region(raw_width: u32, raw_height: u32, region_width: u32, region_height: u32) -> ScaleToFit {
    if raw_width == 0 || raw_height == 0 || region_width == 0 || region_height == 0 {
        return ScaleToFit::identity(raw_width, raw_height);
    }

    let ratio = (f64::from(region_width) / f64::from(raw_width))
        .min(f64::from(region_height) / f64::from(raw_height));

    ScaleToFit {
        ratio,
        width: ((f64::from(raw_width) * ratio).floor() as u32).max(1),
        height: ((f64::from(raw_height) * ratio).floor() as u32).max(1),
    }
}

/// Resample `raw` to the fitted size.
pub fn scale_raster(raw: &RgbaImage, fit: &ScaleToFit) -> RgbaImage {
    if fit.width == raw.width() && fit.height == raw.height() {
        return raw.clone();
    }
    imageops::resize(raw, fit.width, fit.height, FilterType::Triangle)
}
