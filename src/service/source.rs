//! Collaborator traits for the services the engine talks to.

use std::collections::HashSet;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ServiceError;
use crate::volume::{Annotation, Axis, VolumeInfo};

// =============================================================================
// Slice Request
// =============================================================================

/// Parameters identifying one rendered slice.
///
/// Also serves as the slice cache key and as the staleness tag for draws.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SliceRequest {
    /// Image file name
    pub filename: String,

    /// Viewing axis
    pub axis: Axis,

    /// Index along `axis`
    pub slice_index: u32,

    /// Histogram-match reference file, if any
    pub reference: Option<String>,
}

impl SliceRequest {
    pub fn new(filename: impl Into<String>, axis: Axis, slice_index: u32) -> Self {
        Self {
            filename: filename.into(),
            axis,
            slice_index,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

// =============================================================================
// Inference Result
// =============================================================================

/// Landmarks proposed by the inference service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceResult {
    /// Proposed annotations, in the service's label order
    pub annotations: Vec<Annotation>,

    /// Axial slice the landmarks were inferred on
    pub z_index: u32,
}

// =============================================================================
// Traits
// =============================================================================

/// Source of slice rasters and volume metadata.
#[async_trait]
pub trait SliceSource: Send + Sync {
    /// Fetch the encoded raster for `request`.
    ///
    /// With `request.reference` set the raster is histogram-matched against
    /// the reference file.
    async fn fetch_slice(&self, request: &SliceRequest) -> Result<Bytes, ServiceError>;

    /// Fetch per-axis extents for `filename`.
    async fn fetch_volume_info(&self, filename: &str) -> Result<VolumeInfo, ServiceError>;
}

/// Storage for annotation records.
#[async_trait]
pub trait AnnotationPersistence: Send + Sync {
    /// Overwrite the saved record for `filename`.
    async fn save(&self, filename: &str, annotations: &[Annotation]) -> Result<(), ServiceError>;

    /// Load the saved record for `filename`; empty when nothing was saved.
    async fn load(&self, filename: &str) -> Result<Vec<Annotation>, ServiceError>;

    /// Files that have a saved record.
    async fn list_annotated_files(&self) -> Result<HashSet<String>, ServiceError>;
}

/// Landmark inference.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Run inference on `filename`. `None` lets the service pick the axial
    /// slice (mid-volume).
    async fn infer(&self, filename: &str, z_index: Option<u32>)
        -> Result<InferenceResult, ServiceError>;
}

/// Everything the session needs from the outside world.
pub trait AnnotationBackend: SliceSource + AnnotationPersistence + InferenceService {}

impl<T> AnnotationBackend for T where T: SliceSource + AnnotationPersistence + InferenceService {}
