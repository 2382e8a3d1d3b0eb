//! The session controller: owns every piece of engine state and sequences
//! calls to the backend.
//!
//! Each network call is a suspension point. After every resume the
//! controller checks that the result still belongs to the current view:
//! slice payloads carry their [`SliceRequest`], inference responses carry an
//! [`InferenceTicket`]. Results that no longer match are dropped.

use std::sync::Arc;

use bytes::Bytes;
use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::annotation::{AnnotationStore, Upsert};
use crate::config::EngineConfig;
use crate::enhance::{
    self, decode_raster, draw_overlays, place_overlays, EnhancementPipeline, Frame,
    MagnifierView, OverlayPoint,
};
use crate::error::{AnnotationError, ServiceError, SessionError};
use crate::service::{AnnotationBackend, InferenceResult, SliceCache, SliceRequest};
use crate::suggestion::{Completion, InferenceTicket, SuggestionManager};
use crate::volume::{self, Annotation, Axis, VolumeInfo};

use super::state::{DisplayState, DrawOutcome, Navigation};

/// The last slice that made it to the screen.
#[derive(Debug)]
struct DrawnSlice {
    request: SliceRequest,
    raw: RgbaImage,
    frame: Frame,
}

/// Annotation session over a fixed list of files.
pub struct Session<B> {
    backend: Arc<B>,
    config: EngineConfig,
    store: AnnotationStore,
    suggestions: SuggestionManager,
    pipeline: EnhancementPipeline,
    cache: SliceCache,
    display: DisplayState,

    /// Metadata of the open file; `None` until the first file is opened
    volume: Option<VolumeInfo>,

    drawn: Option<DrawnSlice>,
}

impl<B: AnnotationBackend> Session<B> {
    pub fn new(backend: B, config: EngineConfig) -> Result<Self, SessionError> {
        Self::with_shared_backend(Arc::new(backend), config)
    }

    /// Create a session over a backend the caller keeps a handle to.
    pub fn with_shared_backend(backend: Arc<B>, config: EngineConfig) -> Result<Self, SessionError> {
        if config.files.is_empty() {
            return Err(SessionError::NoFiles);
        }

        let pipeline = EnhancementPipeline::new(config.region_width, config.region_height)
            .with_edge_threshold(config.edge_threshold);
        let cache = SliceCache::with_capacity(config.slice_cache_bytes);

        Ok(Self {
            backend,
            config,
            store: AnnotationStore::new(),
            suggestions: SuggestionManager::new(),
            pipeline,
            cache,
            display: DisplayState::default(),
            volume: None,
            drawn: None,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn suggestions(&self) -> &SuggestionManager {
        &self.suggestions
    }

    pub fn volume(&self) -> Option<&VolumeInfo> {
        self.volume.as_ref()
    }

    /// The most recently drawn frame, if any.
    pub fn frame(&self) -> Option<&Frame> {
        self.drawn.as_ref().map(|drawn| &drawn.frame)
    }

    /// The request behind the frame on screen.
    pub fn drawn_request(&self) -> Option<&SliceRequest> {
        self.drawn.as_ref().map(|drawn| &drawn.request)
    }

    pub fn current_file(&self) -> Option<&str> {
        self.volume.as_ref()?;
        self.config
            .files
            .get(self.display.file_index)
            .map(String::as_str)
    }

    /// Annotations of the open file.
    pub fn annotations(&self) -> &[Annotation] {
        match self.current_file() {
            Some(file) => self.store.get(file),
            None => &[],
        }
    }

    /// Whether the backend reported a saved record for `filename`.
    pub fn is_file_annotated(&self, filename: &str) -> bool {
        self.store.annotated_files().contains(filename)
    }

    fn active_file(&self) -> Result<String, SessionError> {
        self.current_file()
            .map(str::to_string)
            .ok_or(SessionError::NotOpen)
    }

    fn active_volume(&self) -> Result<&VolumeInfo, SessionError> {
        self.volume.as_ref().ok_or(SessionError::NotOpen)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Load the annotated-file listing and open the first file.
    pub async fn open(&mut self) -> Result<Navigation, SessionError> {
        self.refresh_annotated_files().await;
        self.select_file(0).await
    }

    /// Move to the next file. Returns `None` on the last file.
    pub async fn next_file(&mut self) -> Result<Option<Navigation>, SessionError> {
        self.active_file()?;
        let next = self.display.file_index + 1;
        if next >= self.config.files.len() {
            return Ok(None);
        }
        self.select_file(next).await.map(Some)
    }

    /// Move to the previous file. Returns `None` on the first file.
    pub async fn previous_file(&mut self) -> Result<Option<Navigation>, SessionError> {
        self.active_file()?;
        match self.display.file_index.checked_sub(1) {
            Some(previous) => self.select_file(previous).await.map(Some),
            None => Ok(None),
        }
    }

    /// Switch to the file at `index`.
    ///
    /// The open file is saved first when it has annotations; if that save
    /// fails nothing changes. Metadata and saved annotations of the target
    /// are fetched before any state is touched, so a failed fetch also
    /// leaves the session on the old file.
    pub async fn select_file(&mut self, index: usize) -> Result<Navigation, SessionError> {
        let count = self.config.files.len();
        let filename = self
            .config
            .files
            .get(index)
            .cloned()
            .ok_or(SessionError::FileOutOfRange { index, count })?;

        if let Some(current) = self.current_file().map(str::to_string) {
            if !self.store.get(&current).is_empty() {
                info!("Saving {} before switching to {}", current, filename);
                self.save().await?;
            }
        }

        let info = self.backend.fetch_volume_info(&filename).await?;
        // Collections already in the store hold unsaved edits; only load once.
        if !self.store.contains_file(&filename) {
            let saved = self.backend.load(&filename).await?;
            self.store.replace_all(&filename, saved);
        }

        self.display.file_index = index;
        self.display.slice_index = info.middle_slice(self.display.axis);
        self.volume = Some(info);
        self.drawn = None;
        self.suggestions.reset_for(&filename);
        if self.display.filters.histogram_reference.as_deref() == Some(filename.as_str()) {
            debug!("Clearing histogram reference that matches the opened file");
            self.display.filters.histogram_reference = None;
        }

        let annotation_count = self.store.get(&filename).len();
        info!(
            "Opened {} ({}/{}) with {} annotations",
            filename,
            index + 1,
            count,
            annotation_count
        );

        let draw = self.render().await?;
        let suggestion = if annotation_count == 0 && self.config.auto_suggest {
            self.request_suggestions(None).await?
        } else {
            None
        };

        Ok(Navigation {
            filename,
            annotation_count,
            draw,
            suggestion,
        })
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Save the open file's annotations (an empty collection is a valid
    /// save), then refresh the annotated-file listing.
    pub async fn save(&mut self) -> Result<usize, SessionError> {
        let filename = self.active_file()?;
        let annotations = self.store.get(&filename);
        let count = annotations.len();

        self.backend.save(&filename, annotations).await?;
        info!("Saved {} annotations for {}", count, filename);

        self.refresh_annotated_files().await;
        Ok(count)
    }

    async fn refresh_annotated_files(&mut self) {
        match self.backend.list_annotated_files().await {
            Ok(files) => self.store.set_annotated_files(files),
            Err(e) => warn!("Failed to list annotated files: {}", e),
        }
    }

    // =========================================================================
    // Annotation editing
    // =========================================================================

    /// Choose the label the next click places.
    pub fn select_label(&mut self, label: &str) -> Result<(), SessionError> {
        if !self.config.labels.iter().any(|l| l == label) {
            return Err(AnnotationError::UnknownLabel(label.to_string()).into());
        }
        self.display.current_label = Some(label.to_string());
        Ok(())
    }

    pub fn clear_label(&mut self) {
        self.display.current_label = None;
    }

    /// Place the current label at a display-space click.
    pub fn click(&mut self, display_x: f64, display_y: f64) -> Result<Upsert, SessionError> {
        let filename = self.active_file()?;
        let label = self
            .display
            .current_label
            .clone()
            .ok_or(AnnotationError::NoLabelSelected)?;

        // Map against the frame on screen, which lags the display state
        // after a failed fetch.
        let drawn = self.visible_slice_of(&filename)?;
        let (axis, slice_index) = (drawn.request.axis, drawn.request.slice_index);
        let (width, height) = drawn.raw.dimensions();
        let scale_ratio = drawn.frame.scale_ratio();

        let raw_x = volume::display_to_raw(display_x, scale_ratio);
        let raw_y = volume::display_to_raw(display_y, scale_ratio);
        let (px, py) = (raw_x.round() as i64, raw_y.round() as i64);
        if px < 0 || py < 0 || px >= i64::from(width) || py >= i64::from(height) {
            return Err(AnnotationError::OutOfBounds {
                x: px,
                y: py,
                width,
                height,
            }
            .into());
        }

        let coord = volume::pixel_to_volume(axis, slice_index, raw_x, raw_y, height);
        debug!(
            "Click ({:.1}, {:.1}) on {} slice {} -> {} at ({}, {}, {})",
            display_x, display_y, axis, slice_index, label, coord.x, coord.y, coord.z
        );
        Ok(self.store.upsert(&filename, Annotation::at(label, coord)))
    }

    /// Delete the annotation at `index` in the open file.
    pub fn delete(&mut self, index: usize) -> Result<Annotation, SessionError> {
        let filename = self.active_file()?;
        let removed = self.store.delete(&filename, index)?;
        debug!("Deleted {} from {}", removed.label, filename);
        Ok(removed)
    }

    /// The frame on screen, if it belongs to `filename`.
    fn visible_slice_of(&self, filename: &str) -> Result<&DrawnSlice, SessionError> {
        match &self.drawn {
            Some(drawn) if drawn.request.filename == filename => Ok(drawn),
            _ => Err(SessionError::NoRaster),
        }
    }

    // =========================================================================
    // View
    // =========================================================================

    /// Switch axis; the slice resets to the middle of the new axis.
    pub async fn set_axis(&mut self, axis: Axis) -> Result<DrawOutcome, SessionError> {
        let middle = self.active_volume()?.middle_slice(axis);
        self.display.axis = axis;
        self.display.slice_index = middle;
        self.render().await
    }

    /// Jump to `index`, clamped to the axis range.
    pub async fn set_slice(&mut self, index: i64) -> Result<DrawOutcome, SessionError> {
        let clamped = self.active_volume()?.clamp_slice(self.display.axis, index);
        self.display.slice_index = clamped;
        self.render().await
    }

    pub async fn step_slice(&mut self, delta: i64) -> Result<DrawOutcome, SessionError> {
        self.set_slice(i64::from(self.display.slice_index) + delta)
            .await
    }

    /// Move to the slice on which annotation `index` is visible.
    pub async fn focus_annotation(&mut self, index: usize) -> Result<DrawOutcome, SessionError> {
        let filename = self.active_file()?;
        let annotations = self.store.get(&filename);
        let annotation = annotations
            .get(index)
            .ok_or(AnnotationError::IndexOutOfRange {
                index,
                len: annotations.len(),
            })?;
        let slice = volume::visible_slice(annotation.coord(), self.display.axis);
        self.set_slice(i64::from(slice)).await
    }

    pub fn set_binarize(&mut self, threshold: Option<u8>) {
        self.display.filters.binarize = threshold;
        self.refilter();
    }

    pub fn set_edges(&mut self, enabled: bool) {
        self.display.filters.edges = enabled;
        self.refilter();
    }

    pub fn set_magnifier(&mut self, enabled: bool) {
        self.display.filters.magnifier = enabled;
    }

    /// Files that can serve as histogram reference for the open file.
    pub fn reference_candidates(&self) -> Vec<&str> {
        enhance::reference_candidates(&self.config.files, self.current_file().unwrap_or_default())
    }

    /// Set or clear the histogram reference and redraw.
    pub async fn set_histogram_reference(
        &mut self,
        reference: Option<String>,
    ) -> Result<DrawOutcome, SessionError> {
        let filename = self.active_file()?;
        if let Some(name) = &reference {
            if *name == filename || !self.config.files.contains(name) {
                return Err(SessionError::InvalidReference(name.clone()));
            }
        }
        self.display.filters.histogram_reference = reference;
        self.render().await
    }

    /// Zoomed view of the raw raster around a display-space cursor.
    ///
    /// `None` while the magnifier is off or the cursor is off the raster.
    pub fn magnify(&self, display_x: f64, display_y: f64) -> Result<Option<MagnifierView>, SessionError> {
        if !self.display.filters.magnifier {
            return Ok(None);
        }
        let drawn = self.drawn.as_ref().ok_or(SessionError::NoRaster)?;
        let raw_x = volume::display_to_raw(display_x, drawn.frame.scale_ratio());
        let raw_y = volume::display_to_raw(display_y, drawn.frame.scale_ratio());
        Ok(enhance::magnify(&drawn.raw, raw_x, raw_y, &self.config.magnifier))
    }

    /// Annotation and suggestion markers for the frame on screen.
    pub fn overlays(&self) -> Vec<OverlayPoint> {
        let (Some(filename), Some(drawn)) = (self.current_file(), self.drawn.as_ref()) else {
            return Vec::new();
        };
        if drawn.request.filename != filename {
            return Vec::new();
        }
        place_overlays(
            self.store.get(filename),
            self.suggestions.suggestions(),
            drawn.request.axis,
            drawn.request.slice_index,
            drawn.raw.height(),
            drawn.frame.scale_ratio(),
        )
    }

    /// The frame on screen with markers burned in.
    pub fn snapshot(&self) -> Option<RgbaImage> {
        let drawn = self.drawn.as_ref()?;
        let mut image = drawn.frame.image.clone();
        draw_overlays(&mut image, &self.overlays());
        Some(image)
    }

    // =========================================================================
    // Drawing
    // =========================================================================

    /// The slice request matching the current view.
    pub fn draw_request(&self) -> Result<SliceRequest, SessionError> {
        let filename = self.active_file()?;
        let request = SliceRequest::new(filename, self.display.axis, self.display.slice_index);
        Ok(match &self.display.filters.histogram_reference {
            Some(reference) => request.with_reference(reference.clone()),
            None => request,
        })
    }

    /// Apply a slice payload fetched for `request`.
    pub fn finish_draw(
        &mut self,
        request: SliceRequest,
        payload: Result<Bytes, ServiceError>,
    ) -> DrawOutcome {
        if self.draw_request().ok().as_ref() != Some(&request) {
            debug!(
                "Discarding stale slice {} {} {}",
                request.filename, request.axis, request.slice_index
            );
            return DrawOutcome::Stale;
        }

        let raw = match payload.and_then(|data| decode_raster(&data)) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    "Failed to draw {} {} {}: {}",
                    request.filename, request.axis, request.slice_index, e
                );
                return DrawOutcome::Failed(e);
            }
        };

        let frame = self.pipeline.render(&raw, &self.display.filters);
        self.display.scale_ratio = frame.scale_ratio();
        self.drawn = Some(DrawnSlice {
            request,
            raw,
            frame,
        });
        DrawOutcome::Drawn
    }

    /// Fetch (or reuse from cache) and draw the current view.
    pub async fn render(&mut self) -> Result<DrawOutcome, SessionError> {
        let request = self.draw_request()?;

        let payload = match self.cache.get(&request).await {
            Some(data) => {
                debug!("Slice cache hit for {} {}", request.axis, request.slice_index);
                Ok(data)
            }
            None => {
                let fetched = self.backend.fetch_slice(&request).await;
                if let Ok(data) = &fetched {
                    self.cache.put(request.clone(), data.clone()).await;
                }
                fetched
            }
        };

        Ok(self.finish_draw(request, payload))
    }

    /// Re-run the filters over the raw raster on screen without refetching.
    fn refilter(&mut self) {
        if let Some(drawn) = self.drawn.as_mut() {
            drawn.frame = self.pipeline.render(&drawn.raw, &self.display.filters);
        }
    }

    // =========================================================================
    // Suggestions
    // =========================================================================

    /// Start an inference for the open file; `None` while one is loading.
    pub fn begin_inference(&mut self) -> Option<InferenceTicket> {
        self.suggestions.begin()
    }

    /// Apply an inference response. Presented suggestions move the view to
    /// the axial slice the inference ran on.
    pub fn finish_inference(
        &mut self,
        ticket: &InferenceTicket,
        result: Result<InferenceResult, ServiceError>,
    ) -> Completion {
        let completion = self.suggestions.complete(ticket, result);
        if let (Completion::Presented { z_index, .. }, Some(info)) = (&completion, &self.volume) {
            self.display.axis = Axis::Axial;
            self.display.slice_index = info.clamp_slice(Axis::Axial, i64::from(*z_index));
        }
        completion
    }

    /// Run inference on the open file and redraw on success.
    ///
    /// Returns `None` when another inference is already loading.
    pub async fn request_suggestions(
        &mut self,
        z_index: Option<u32>,
    ) -> Result<Option<Completion>, SessionError> {
        self.active_file()?;
        let Some(ticket) = self.begin_inference() else {
            return Ok(None);
        };

        info!("Requesting suggestions for {}", ticket.filename());
        let result = self.backend.infer(ticket.filename(), z_index).await;
        let completion = self.finish_inference(&ticket, result);

        if matches!(completion, Completion::Presented { .. }) {
            self.render().await?;
        }
        Ok(Some(completion))
    }

    /// Merge the present suggestions into the open file's annotations.
    pub fn accept_suggestions(&mut self) -> usize {
        self.suggestions.accept(&mut self.store)
    }

    pub fn dismiss_suggestions(&mut self) -> usize {
        self.suggestions.dismiss()
    }
}
