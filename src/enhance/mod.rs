//! Display-only image enhancement.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  slice payload (raw or histogram-matched, from service)  │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │ decode_raster
//!                              ▼
//!            raw RGBA raster ──────────────► magnifier (raw pixels)
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  scale-to-fit ─► binarize (optional) ─► Sobel edges      │
//! └────────────────────────────┬─────────────────────────────┘
//!                              ▼
//!                 Frame + overlay points (via mapper)
//! ```
//!
//! Histogram matching is not a filter here: choosing a reference changes
//! which raster the slice service returns, and every stage above applies to
//! the matched raster unchanged.

mod filters;
mod magnifier;
mod pipeline;
mod scale;

pub use filters::{binarize, luminance, overlay_edges, sobel_magnitude, DEFAULT_EDGE_THRESHOLD};
pub use magnifier::{
    crop_rect, magnify, CropRect, MagnifierConfig, MagnifierView, DEFAULT_MAGNIFIER_SIZE,
    DEFAULT_MAGNIFIER_ZOOM,
};
pub use pipeline::{
    decode_raster, draw_overlays, place_overlays, reference_candidates, EnhancementPipeline,
    FilterSettings, Frame, OverlayKind, OverlayPoint, DEFAULT_REGION_HEIGHT, DEFAULT_REGION_WIDTH,
};
pub use scale::{fit_to_region, scale_raster, ScaleToFit};
