//! Cursor-driven magnifier over the unscaled raster.
//!
//! The magnifier always samples the raw raster the slice service returned, so
//! no detail is lost to the display downscale. The cursor position must already
//! be in raw-pixel space.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;

/// Default popup side length in pixels.
pub const DEFAULT_MAGNIFIER_SIZE: u32 = 150;

/// Default zoom factor.
pub const DEFAULT_MAGNIFIER_ZOOM: f64 = 3.0;

const CROSSHAIR_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

/// Popup geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagnifierConfig {
    /// Side length of the popup canvas
    pub size: u32,

    /// Zoom factor; the crop side is `size / zoom`
    pub zoom: f64,
}

impl Default for MagnifierConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_MAGNIFIER_SIZE,
            zoom: DEFAULT_MAGNIFIER_ZOOM,
        }
    }
}

impl MagnifierConfig {
    /// Side of the square cropped from the raw raster.
    pub fn crop_side(&self) -> u32 {
        if self.zoom <= 0.0 {
            return self.size.max(1);
        }
        ((f64::from(self.size) / self.zoom).round() as u32).max(1)
    }
}

/// Rectangle of the raw raster shown in the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One rendered magnifier popup.
#[derive(Debug, Clone)]
pub struct MagnifierView {
    /// The zoomed popup, `size x size`
    pub image: RgbaImage,

    /// Region of the raw raster that was zoomed
    pub crop: CropRect,
}

/// Compute the crop rectangle centered on the cursor, shifted to stay inside
/// the raster. Returns `None` when the cursor is off the raster.
pub fn crop_rect(
    raster_width: u32,
    raster_height: u32,
    cursor_x: f64,
    cursor_y: f64,
    config: &MagnifierConfig,
) -> Option<CropRect> {
    let cx = cursor_x.round() as i64;
    let cy = cursor_y.round() as i64;
    if cx < 0 || cy < 0 || cx >= i64::from(raster_width) || cy >= i64::from(raster_height) {
        return None;
    }

    let side = config.crop_side();
    let width = side.min(raster_width);
    let height = side.min(raster_height);

    let x = (cx - i64::from(width / 2)).clamp(0, i64::from(raster_width - width)) as u32;
    let y = (cy - i64::from(height / 2)).clamp(0, i64::from(raster_height - height)) as u32;

    Some(CropRect {
        x,
        y,
        width,
        height,
    })
}

/// Render the magnifier popup for a cursor at raw pixel `(cursor_x, cursor_y)`.
pub fn magnify(
    raw: &RgbaImage,
    cursor_x: f64,
    cursor_y: f64,
    config: &MagnifierConfig,
) -> Option<MagnifierView> {
    let crop = crop_rect(raw.width(), raw.height(), cursor_x, cursor_y, config)?;
    let region = imageops::crop_imm(raw, crop.x, crop.y, crop.width, crop.height).to_image();

    let size = config.size.max(1);
    let mut image = imageops::resize(&region, size, size, FilterType::Nearest);
    draw_crosshair(&mut image);

    Some(MagnifierView { image, crop })
}

fn draw_crosshair(image: &mut RgbaImage) {
    let (width, height) = image.dimensions();
    let (cx, cy) = ((width / 2) as f32, (height / 2) as f32);
    let arm = (width.min(height) / 8).max(1) as f32;

    draw_line_segment_mut(image, (cx - arm, cy), (cx + arm, cy), CROSSHAIR_COLOR);
    draw_line_segment_mut(image, (cx, cy - arm), (cx, cy + arm), CROSSHAIR_COLOR);
}
