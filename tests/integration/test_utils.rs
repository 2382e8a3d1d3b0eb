//! Test utilities for integration tests.
//!
//! Provides an in-memory annotation backend that records every call, so
//! tests can check both resulting state and the order of backend traffic.

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use landmark_annotator::{
    raster_dimensions, Annotation, AnnotationPersistence, EngineConfig, InferenceResult,
    InferenceService, ServiceError, Session, SliceRequest, SliceSource, VolumeInfo,
};

/// Gray level of plain slices.
pub const PLAIN_LEVEL: u8 = 60;

/// Gray level of histogram-matched slices.
pub const MATCHED_LEVEL: u8 = 200;

// =============================================================================
// Call Log
// =============================================================================

/// One backend call, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Slice(SliceRequest),
    Info(String),
    Save(String, usize),
    Load(String),
    ListAnnotated,
    Infer(String, Option<u32>),
}

// =============================================================================
// Mock Backend
// =============================================================================

/// In-memory backend with failure switches.
pub struct MockBackend {
    volumes: HashMap<String, VolumeInfo>,
    saved: RwLock<HashMap<String, Vec<Annotation>>>,
    inference: RwLock<HashMap<String, InferenceResult>>,
    calls: RwLock<Vec<Call>>,
    fail_saves: AtomicBool,
    fail_slices: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            volumes: HashMap::new(),
            saved: RwLock::new(HashMap::new()),
            inference: RwLock::new(HashMap::new()),
            calls: RwLock::new(Vec::new()),
            fail_saves: AtomicBool::new(false),
            fail_slices: AtomicBool::new(false),
        }
    }

    /// Add a volume with per-axis ranges `(sagittal, coronal, axial)`.
    pub fn with_volume(mut self, name: &str, ranges: (u32, u32, u32)) -> Self {
        self.volumes
            .insert(name.to_string(), VolumeInfo::new(ranges.0, ranges.1, ranges.2));
        self
    }

    /// Pre-populate the saved record for `name`.
    pub fn with_saved(self, name: &str, annotations: Vec<Annotation>) -> Self {
        self.saved
            .try_write()
            .expect("no contention during setup")
            .insert(name.to_string(), annotations);
        self
    }

    /// Make inference on `name` return `annotations` at `z_index`.
    pub fn with_inference(self, name: &str, annotations: Vec<Annotation>, z_index: u32) -> Self {
        self.inference
            .try_write()
            .expect("no contention during setup")
            .insert(
                name.to_string(),
                InferenceResult {
                    annotations,
                    z_index,
                },
            );
        self
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn fail_slices(&self, fail: bool) {
        self.fail_slices.store(fail, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.read().await.clone()
    }

    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    pub async fn saved(&self, name: &str) -> Option<Vec<Annotation>> {
        self.saved.read().await.get(name).cloned()
    }

    /// Number of slice fetches matching `predicate`.
    pub async fn slice_fetches(&self, predicate: impl Fn(&SliceRequest) -> bool) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|call| matches!(call, Call::Slice(request) if predicate(request)))
            .count()
    }

    pub async fn infer_calls(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|call| matches!(call, Call::Infer(..)))
            .count()
    }

    async fn record(&self, call: Call) {
        self.calls.write().await.push(call);
    }

    fn volume(&self, name: &str) -> Result<&VolumeInfo, ServiceError> {
        self.volumes
            .get(name)
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))
    }
}

#[async_trait]
impl SliceSource for MockBackend {
    async fn fetch_slice(&self, request: &SliceRequest) -> Result<Bytes, ServiceError> {
        self.record(Call::Slice(request.clone())).await;
        if self.fail_slices.load(Ordering::SeqCst) {
            return Err(ServiceError::Connection("slice service unavailable".into()));
        }

        let info = self.volume(&request.filename)?;
        if request.slice_index >= info.range(request.axis) {
            return Err(ServiceError::Status {
                status: 400,
                message: "Slice index out of bounds".into(),
            });
        }
        let (width, height) = raster_dimensions(info, request.axis);
        let level = match request.reference {
            Some(_) => MATCHED_LEVEL,
            None => PLAIN_LEVEL,
        };
        Ok(gray_png(width, height, level))
    }

    async fn fetch_volume_info(&self, filename: &str) -> Result<VolumeInfo, ServiceError> {
        self.record(Call::Info(filename.to_string())).await;
        self.volume(filename).cloned()
    }
}

#[async_trait]
impl AnnotationPersistence for MockBackend {
    async fn save(&self, filename: &str, annotations: &[Annotation]) -> Result<(), ServiceError> {
        self.record(Call::Save(filename.to_string(), annotations.len()))
            .await;
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ServiceError::Status {
                status: 500,
                message: "disk full".into(),
            });
        }
        self.saved
            .write()
            .await
            .insert(filename.to_string(), annotations.to_vec());
        Ok(())
    }

    async fn load(&self, filename: &str) -> Result<Vec<Annotation>, ServiceError> {
        self.record(Call::Load(filename.to_string())).await;
        Ok(self.saved.read().await.get(filename).cloned().unwrap_or_default())
    }

    async fn list_annotated_files(&self) -> Result<HashSet<String>, ServiceError> {
        self.record(Call::ListAnnotated).await;
        Ok(self.saved.read().await.keys().cloned().collect())
    }
}

#[async_trait]
impl InferenceService for MockBackend {
    async fn infer(
        &self,
        filename: &str,
        z_index: Option<u32>,
    ) -> Result<InferenceResult, ServiceError> {
        self.record(Call::Infer(filename.to_string(), z_index)).await;
        match self.inference.read().await.get(filename) {
            Some(result) => Ok(InferenceResult {
                annotations: result.annotations.clone(),
                z_index: z_index.unwrap_or(result.z_index),
            }),
            None => Err(ServiceError::Inference("no model output".into())),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Encode a uniform grayscale PNG.
pub fn gray_png(width: u32, height: u32, level: u8) -> Bytes {
    let pixels = vec![level; (width * height) as usize];
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(&pixels, width, height, ExtendedColorType::L8)
        .expect("PNG encoding should succeed");
    Bytes::from(out)
}

/// Engine config over `files` with a region that leaves axial slices of a
/// `(20, 30, 10)` volume at 2x.
pub fn engine_config(files: &[&str]) -> EngineConfig {
    EngineConfig::new(files.iter().map(|f| f.to_string()).collect()).with_region(40, 60)
}

/// Three-file backend: `a` annotated, `b` empty with inference output, `c`
/// empty without.
pub fn three_file_backend() -> MockBackend {
    MockBackend::new()
        .with_volume("a.nii.gz", (20, 30, 10))
        .with_volume("b.nii.gz", (20, 30, 10))
        .with_volume("c.nii.gz", (20, 30, 10))
        .with_saved(
            "a.nii.gz",
            vec![Annotation::new("L1", 5, 7, 7), Annotation::new("L2", 6, 8, 4)],
        )
        .with_inference(
            "b.nii.gz",
            vec![Annotation::new("L1", 4, 4, 3), Annotation::new("L2", 5, 5, 3)],
            3,
        )
}

/// Session over [`three_file_backend`]; the backend handle is shared.
pub fn three_file_session() -> (Session<MockBackend>, Arc<MockBackend>) {
    let backend = Arc::new(three_file_backend());
    let session = Session::with_shared_backend(
        Arc::clone(&backend),
        engine_config(&["a.nii.gz", "b.nii.gz", "c.nii.gz"]),
    )
    .expect("non-empty file list");
    (session, backend)
}
