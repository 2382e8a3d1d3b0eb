//! Display state and the values the controller hands back to callers.

use crate::enhance::FilterSettings;
use crate::error::ServiceError;
use crate::suggestion::Completion;
use crate::volume::Axis;

/// What the user is currently looking at.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayState {
    /// Index into the configured file list
    pub file_index: usize,

    pub axis: Axis,

    /// Slice along `axis`, always in `[0, range)` once a file is open
    pub slice_index: u32,

    /// Ratio between the drawn frame and the raw raster
    pub scale_ratio: f64,

    pub filters: FilterSettings,

    /// Label placed by the next click
    pub current_label: Option<String>,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            file_index: 0,
            axis: Axis::Axial,
            slice_index: 0,
            scale_ratio: 1.0,
            filters: FilterSettings::default(),
            current_label: None,
        }
    }
}

/// Result of moving to a file.
#[derive(Debug, Clone)]
pub struct Navigation {
    pub filename: String,

    /// Annotations the file had when it was opened
    pub annotation_count: usize,

    /// Outcome of the first draw
    pub draw: DrawOutcome,

    /// Set when opening the file ran automatic inference
    pub suggestion: Option<Completion>,
}

/// What happened to a slice fetch.
#[derive(Debug, Clone)]
pub enum DrawOutcome {
    /// A new frame is on screen
    Drawn,

    /// The view moved on while the fetch was in flight; result discarded
    Stale,

    /// The fetch or decode failed; the previous frame remains
    Failed(ServiceError),
}

impl DrawOutcome {
    pub fn is_drawn(&self) -> bool {
        matches!(self, DrawOutcome::Drawn)
    }
}
