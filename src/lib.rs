//! # Landmark Annotator
//!
//! Engine for placing anatomical landmarks on 3D medical volumes (NIfTI)
//! viewed as 2D slices.
//!
//! The engine keeps the interactive state (open file, axis, slice, display
//! filters, annotations, pending AI suggestions) and talks to an annotation
//! backend that renders slices, stores annotation records and runs landmark
//! inference.
//!
//! ## Features
//!
//! - **Coordinate mapping**: Exact pixel <-> voxel conversion for sagittal, coronal and axial views
//! - **Display filters**: Scale-to-fit, binarization, Sobel edge overlay and a magnifier
//! - **Histogram matching**: Slices can be fetched matched against a reference volume
//! - **Suggestions**: AI landmark proposals that can be accepted or dismissed
//! - **Safe navigation**: Annotations are saved before every file switch
//!
//! ## Architecture
//!
//! - [`volume`] - Axes, volume metadata, annotations and the coordinate mapper
//! - [`enhance`] - Display pipeline and overlay placement
//! - [`annotation`] - Per-file annotation store
//! - [`suggestion`] - Suggestion lifecycle
//! - [`session`] - Navigation controller tying everything together
//! - [`service`] - Backend traits, REST client and slice cache
//! - [`config`] - CLI and engine configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use landmark_annotator::{EngineConfig, HttpBackend, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = HttpBackend::new("http://localhost:8000")?;
//!     let files = backend.list_images().await?;
//!
//!     let mut session = Session::new(backend, EngineConfig::new(files))?;
//!     session.open().await?;
//!
//!     session.select_label("L1")?;
//!     session.click(120.0, 88.0)?;
//!     session.save().await?;
//!     Ok(())
//! }
//! ```

pub mod annotation;
pub mod config;
pub mod enhance;
pub mod error;
pub mod service;
pub mod session;
pub mod suggestion;
pub mod volume;

// Re-export commonly used types
pub use annotation::{first_annotated_file, AnnotationStore, Upsert};
pub use config::{
    BackendArgs, CheckConfig, Cli, Command, DisplayArgs, EngineConfig, RenderConfig,
    SuggestConfig, VisualizeConfig, VisualizeMode,
};
pub use enhance::{
    binarize, decode_raster, draw_overlays, fit_to_region, magnify, overlay_edges,
    place_overlays, sobel_magnitude, EnhancementPipeline, FilterSettings, Frame,
    MagnifierConfig, MagnifierView, OverlayKind, OverlayPoint, ScaleToFit,
};
pub use error::{AnnotationError, ServiceError, SessionError};
pub use service::{
    AnnotationBackend, AnnotationPersistence, HttpBackend, InferenceResult, InferenceService,
    SliceCache, SliceRequest, SliceSource,
};
pub use session::{DisplayState, DrawOutcome, Navigation, Session};
pub use suggestion::{Completion, InferenceTicket, SuggestionManager, SuggestionSet, SuggestionState};
pub use volume::{
    display_to_raw, is_visible, pixel_to_volume, raster_dimensions, raw_to_display,
    visible_slice, volume_to_pixel, Annotation, Axis, PixelPoint, VolumeCoord, VolumeInfo,
};
