//! The display pipeline: decode -> scale-to-fit -> binarize -> edge overlay,
//! plus overlay placement for annotations and suggestions.
//!
//! Nothing here touches annotation state; the session hands in read-only
//! slices of annotations and gets back pixels and overlay positions.

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::error::ServiceError;
use crate::volume::{self, Annotation, Axis};

use super::filters::{binarize, overlay_edges, DEFAULT_EDGE_THRESHOLD};
use super::scale::{fit_to_region, scale_raster, ScaleToFit};

/// Default display region width in pixels.
pub const DEFAULT_REGION_WIDTH: u32 = 512;

/// Default display region height in pixels.
pub const DEFAULT_REGION_HEIGHT: u32 = 512;

const ANNOTATION_COLOR: Rgba<u8> = Rgba([0, 200, 255, 255]);
const SUGGESTION_COLOR: Rgba<u8> = Rgba([255, 210, 0, 255]);
const MARKER_RADIUS: i32 = 3;
const MARKER_SIDE: u32 = 2 * MARKER_RADIUS as u32 + 1;

// =============================================================================
// Filter Settings
// =============================================================================

/// Display filter toggles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSettings {
    /// Binarization threshold; `None` disables the filter
    pub binarize: Option<u8>,

    /// Sobel edge overlay
    pub edges: bool,

    /// Magnifier popup on pointer move
    pub magnifier: bool,

    /// Reference file for histogram matching; `None` fetches the raw slice
    pub histogram_reference: Option<String>,
}

/// Files that may serve as a histogram reference for `current`.
pub fn reference_candidates<'a>(files: &'a [String], current: &str) -> Vec<&'a str> {
    files
        .iter()
        .map(String::as_str)
        .filter(|name| *name != current)
        .collect()
}

// =============================================================================
// Raster decoding
// =============================================================================

/// Decode an encoded raster payload (PNG from the slice service) to RGBA.
pub fn decode_raster(data: &[u8]) -> Result<RgbaImage, ServiceError> {
    image::load_from_memory(data)
        .map(|img| img.to_rgba8())
        .map_err(|e| ServiceError::Decode(e.to_string()))
}

// =============================================================================
// Pipeline
// =============================================================================

/// A canvas-ready raster.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Scaled and filtered pixels
    pub image: RgbaImage,

    /// Scale applied to the raw raster
    pub fit: ScaleToFit,

    /// Raw raster width before scaling
    pub raw_width: u32,

    /// Raw raster height before scaling
    pub raw_height: u32,
}

impl Frame {
    pub fn scale_ratio(&self) -> f64 {
        self.fit.ratio
    }
}

/// Stateless display pipeline parameterized by the display region and edge
/// threshold.
#[derive(Debug, Clone)]
pub struct EnhancementPipeline {
    region_width: u32,
    region_height: u32,
    edge_threshold: f32,
}

impl Default for EnhancementPipeline {
    fn default() -> Self {
        Self::new(DEFAULT_REGION_WIDTH, DEFAULT_REGION_HEIGHT)
    }
}

impl EnhancementPipeline {
    pub fn new(region_width: u32, region_height: u32) -> Self {
        Self {
            region_width,
            region_height,
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
        }
    }

    pub fn with_edge_threshold(mut self, threshold: f32) -> Self {
        self.edge_threshold = threshold;
        self
    }

    pub fn region(&self) -> (u32, u32) {
        (self.region_width, self.region_height)
    }

    pub fn set_region(&mut self, width: u32, height: u32) {
        self.region_width = width;
        self.region_height = height;
    }

    /// Run scale-to-fit, then binarize, then the edge overlay.
    ///
    /// # Example
    ///
    /// ```
    /// use image::{Rgba, RgbaImage};
    /// use landmark_annotator::enhance::{EnhancementPipeline, FilterSettings};
    ///
    /// let raw = RgbaImage::from_pixel(20, 30, Rgba([90, 90, 90, 255]));
    /// let pipeline = EnhancementPipeline::new(40, 60);
    ///
    /// let filters = FilterSettings {
    ///     binarize: Some(64),
    ///     ..FilterSettings::default()
    /// };
    /// let frame = pipeline.render(&raw, &filters);
    ///
    /// assert_eq!(frame.scale_ratio(), 2.0);
    /// assert_eq!(frame.image.dimensions(), (40, 60));
    /// assert_eq!(frame.image.get_pixel(0, 0).0, [255, 255, 255, 255]);
    /// ```
    pub fn render(&self, raw: &RgbaImage, filters: &FilterSettings) -> Frame {
        let fit = fit_to_region(raw.width(), raw.height(), self.region_width, self.region_height);
        let mut image = scale_raster(raw, &fit);

        if let Some(threshold) = filters.binarize {
            binarize(&mut image, threshold);
        }
        if filters.edges {
            overlay_edges(&mut image, self.edge_threshold);
        }

        Frame {
            image,
            fit,
            raw_width: raw.width(),
            raw_height: raw.height(),
        }
    }
}

// =============================================================================
// Overlays
// =============================================================================

/// Whether an overlay marks a committed annotation or a pending suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Annotation,
    Suggestion,
}

/// A marker position in display (scaled) space.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPoint {
    pub label: String,
    pub kind: OverlayKind,
    pub x: f64,
    pub y: f64,
}

/// Place every annotation and suggestion visible on `slice_index`.
pub fn place_overlays(
    annotations: &[Annotation],
    suggestions: &[Annotation],
    axis: Axis,
    slice_index: u32,
    raw_height: u32,
    scale_ratio: f64,
) -> Vec<OverlayPoint> {
    let tagged = annotations
        .iter()
        .map(|a| (a, OverlayKind::Annotation))
        .chain(suggestions.iter().map(|a| (a, OverlayKind::Suggestion)));

    tagged
        .filter(|(ann, _)| volume::is_visible(ann.coord(), axis, slice_index))
        .map(|(ann, kind)| {
            let pixel = volume::volume_to_pixel(ann.coord(), axis, raw_height);
            OverlayPoint {
                label: ann.label.clone(),
                kind,
                x: volume::raw_to_display(pixel.x as f64, scale_ratio),
                y: volume::raw_to_display(pixel.y as f64, scale_ratio),
            }
        })
        .collect()
}

/// Burn overlay markers into a frame as small filled squares, clipped at
/// the frame border.
pub fn draw_overlays(image: &mut RgbaImage, overlays: &[OverlayPoint]) {
    for point in overlays {
        let color = match point.kind {
            OverlayKind::Annotation => ANNOTATION_COLOR,
            OverlayKind::Suggestion => SUGGESTION_COLOR,
        };
        let cx = point.x.round() as i32;
        let cy = point.y.round() as i32;
        let marker = Rect::at(cx - MARKER_RADIUS, cy - MARKER_RADIUS)
            .of_size(MARKER_SIDE, MARKER_SIDE);
        draw_filled_rect_mut(image, marker, color);
    }
}
