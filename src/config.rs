//! Configuration for the annotation engine and its command-line front end.
//!
//! The engine itself never reads globals: everything it needs arrives in an
//! [`EngineConfig`] at construction. The CLI builds that struct from
//! arguments and environment variables.
//!
//! # Environment Variables
//!
//! - `ANNOTATOR_SERVER` - Annotation backend base URL (default: http://localhost:8000)
//! - `ANNOTATOR_TIMEOUT` - Request timeout in seconds (default: 120)
//! - `ANNOTATOR_LABELS` - Comma-separated landmark labels (default: L1,L2,L3,L4,L5)
//! - `ANNOTATOR_REGION_WIDTH` - Display region width (default: 512)
//! - `ANNOTATOR_REGION_HEIGHT` - Display region height (default: 512)
//! - `ANNOTATOR_EDGE_THRESHOLD` - Sobel magnitude threshold (default: 30)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::enhance::{
    MagnifierConfig, DEFAULT_EDGE_THRESHOLD, DEFAULT_MAGNIFIER_SIZE, DEFAULT_MAGNIFIER_ZOOM,
    DEFAULT_REGION_HEIGHT, DEFAULT_REGION_WIDTH,
};
use crate::service::DEFAULT_SLICE_CACHE_CAPACITY;
use crate::volume::Axis;

// =============================================================================
// Default Values
// =============================================================================

/// Default annotation backend.
pub const DEFAULT_SERVER: &str = "http://localhost:8000";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Landmarks the bundled lumbar-spine model predicts.
pub const DEFAULT_LABELS: [&str; 5] = ["L1", "L2", "L3", "L4", "L5"];

// =============================================================================
// Engine Configuration
// =============================================================================

/// Everything the session needs that is not fetched from a collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Image files in navigation order
    pub files: Vec<String>,

    /// Landmark labels the user can place
    pub labels: Vec<String>,

    /// Display region the slice is scaled to fit
    pub region_width: u32,
    pub region_height: u32,

    /// Magnifier popup geometry
    pub magnifier: MagnifierConfig,

    /// Sobel magnitude above which pixels are painted as edges
    pub edge_threshold: f32,

    /// Run inference automatically when opening a file without annotations
    pub auto_suggest: bool,

    /// Byte capacity of the fetched-slice cache
    pub slice_cache_bytes: usize,
}

impl EngineConfig {
    /// Config with defaults for everything but the file list.
    pub fn new(files: Vec<String>) -> Self {
        Self {
            files,
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
            region_width: DEFAULT_REGION_WIDTH,
            region_height: DEFAULT_REGION_HEIGHT,
            magnifier: MagnifierConfig::default(),
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
            auto_suggest: true,
            slice_cache_bytes: DEFAULT_SLICE_CACHE_CAPACITY,
        }
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_region(mut self, width: u32, height: u32) -> Self {
        self.region_width = width;
        self.region_height = height;
        self
    }

    pub fn with_auto_suggest(mut self, enabled: bool) -> Self {
        self.auto_suggest = enabled;
        self
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.labels.is_empty() {
            return Err("at least one label is required".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for label in &self.labels {
            if label.trim().is_empty() {
                return Err("labels must not be empty".to_string());
            }
            if !seen.insert(label.as_str()) {
                return Err(format!("duplicate label '{}'", label));
            }
        }
        if self.region_width == 0 || self.region_height == 0 {
            return Err("display region must be at least 1x1".to_string());
        }
        if self.magnifier.size == 0 {
            return Err("magnifier size must be greater than 0".to_string());
        }
        if !(self.magnifier.zoom >= 1.0) {
            return Err("magnifier zoom must be at least 1".to_string());
        }
        if self.edge_threshold < 0.0 {
            return Err("edge threshold must not be negative".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Landmark Annotator - place anatomical landmarks on NIfTI volumes.
#[derive(Parser, Debug, Clone)]
#[command(name = "landmark-annotator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Render one slice through the display pipeline to a PNG.
    Render(RenderConfig),

    /// Run landmark inference on a file, optionally accepting and saving it.
    Suggest(SuggestConfig),

    /// Render a file's annotations on all three axes.
    Visualize(VisualizeConfig),

    /// Check connectivity with the annotation backend.
    Check(CheckConfig),
}

/// Backend connection options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    /// Annotation backend base URL.
    #[arg(long, default_value = DEFAULT_SERVER, env = "ANNOTATOR_SERVER")]
    pub server: String,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, env = "ANNOTATOR_TIMEOUT")]
    pub timeout: u64,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl BackendArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.trim().is_empty() {
            return Err("Backend URL is required. Set --server or ANNOTATOR_SERVER".to_string());
        }
        if !self.server.starts_with("http://") && !self.server.starts_with("https://") {
            return Err(format!("Backend URL must be http(s): {}", self.server));
        }
        if self.timeout == 0 {
            return Err("timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Display options shared by rendering subcommands.
#[derive(Args, Debug, Clone)]
pub struct DisplayArgs {
    /// Landmark labels (comma-separated).
    #[arg(long, env = "ANNOTATOR_LABELS", value_delimiter = ',', default_values_t = DEFAULT_LABELS.map(String::from))]
    pub labels: Vec<String>,

    /// Display region width in pixels.
    #[arg(long, default_value_t = DEFAULT_REGION_WIDTH, env = "ANNOTATOR_REGION_WIDTH")]
    pub region_width: u32,

    /// Display region height in pixels.
    #[arg(long, default_value_t = DEFAULT_REGION_HEIGHT, env = "ANNOTATOR_REGION_HEIGHT")]
    pub region_height: u32,

    /// Sobel magnitude threshold for the edge overlay.
    #[arg(long, default_value_t = DEFAULT_EDGE_THRESHOLD, env = "ANNOTATOR_EDGE_THRESHOLD")]
    pub edge_threshold: f32,

    /// Magnifier popup size in pixels.
    #[arg(long, default_value_t = DEFAULT_MAGNIFIER_SIZE)]
    pub magnifier_size: u32,

    /// Magnifier zoom factor.
    #[arg(long, default_value_t = DEFAULT_MAGNIFIER_ZOOM)]
    pub magnifier_zoom: f64,
}

impl DisplayArgs {
    /// Build the engine configuration for `files`.
    pub fn engine_config(&self, files: Vec<String>, auto_suggest: bool) -> EngineConfig {
        let mut config = EngineConfig::new(files)
            .with_labels(self.labels.iter().map(|l| l.trim().to_string()).collect())
            .with_region(self.region_width, self.region_height)
            .with_auto_suggest(auto_suggest);
        config.edge_threshold = self.edge_threshold;
        config.magnifier = MagnifierConfig {
            size: self.magnifier_size,
            zoom: self.magnifier_zoom,
        };
        config
    }
}

/// Render one slice to a PNG.
#[derive(Args, Debug, Clone)]
pub struct RenderConfig {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(flatten)]
    pub display: DisplayArgs,

    /// Image file name (as listed by the backend).
    pub file: String,

    /// Viewing axis (sagittal, coronal, axial).
    #[arg(long, default_value = "axial")]
    pub axis: Axis,

    /// Slice index (default: middle of the axis).
    #[arg(long)]
    pub slice: Option<u32>,

    /// Binarize with this threshold (0-255).
    #[arg(long)]
    pub binarize: Option<u8>,

    /// Overlay Sobel edges.
    #[arg(long, default_value_t = false)]
    pub edges: bool,

    /// Histogram-match against this reference file.
    #[arg(long)]
    pub reference: Option<String>,

    /// Also write a magnifier popup centered at this display pixel ("x,y").
    #[arg(long)]
    pub magnify_at: Option<String>,

    /// Do not draw annotation markers.
    #[arg(long, default_value_t = false)]
    pub no_overlays: bool,

    /// Output PNG path.
    #[arg(short, long, default_value = "slice.png")]
    pub output: PathBuf,
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.backend.validate()?;
        if self.reference.as_deref() == Some(self.file.as_str()) {
            return Err("reference must be a different file than the one rendered".to_string());
        }
        self.magnify_point()?;
        Ok(())
    }

    /// Parse `--magnify-at`.
    pub fn magnify_point(&self) -> Result<Option<(f64, f64)>, String> {
        let Some(raw) = self.magnify_at.as_deref() else {
            return Ok(None);
        };
        let (x, y) = raw
            .split_once(',')
            .ok_or_else(|| format!("--magnify-at expects \"x,y\", got '{}'", raw))?;
        let x = x.trim().parse::<f64>().map_err(|e| format!("invalid x '{}': {}", x, e))?;
        let y = y.trim().parse::<f64>().map_err(|e| format!("invalid y '{}': {}", y, e))?;
        Ok(Some((x, y)))
    }
}

/// Run inference on one file.
#[derive(Args, Debug, Clone)]
pub struct SuggestConfig {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(flatten)]
    pub display: DisplayArgs,

    /// Image file name.
    pub file: String,

    /// Axial slice to run inference on (default: chosen by the service).
    #[arg(long)]
    pub z_index: Option<u32>,

    /// Merge the suggestions into the file's annotations and save them.
    #[arg(long, default_value_t = false)]
    pub accept: bool,
}

impl SuggestConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.backend.validate()
    }
}

/// What `visualize` writes.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisualizeMode {
    /// Three views centered on one annotation
    #[default]
    Overview,

    /// Three views for every annotation
    Detail,
}

/// Render a file's annotations on three axes.
#[derive(Args, Debug, Clone)]
pub struct VisualizeConfig {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(flatten)]
    pub display: DisplayArgs,

    /// Image file name (default: first annotated file).
    pub file: Option<String>,

    /// Pick the first annotated file the backend lists.
    #[arg(long, default_value_t = false, conflicts_with = "file")]
    pub auto: bool,

    /// Overview centers on one annotation; detail renders every annotation.
    #[arg(long, value_enum, default_value_t = VisualizeMode::Overview)]
    pub mode: VisualizeMode,

    /// Center on this label in overview, or render only it in detail.
    #[arg(long)]
    pub label: Option<String>,

    /// Directory for the PNGs.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

impl VisualizeConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.backend.validate()?;
        if self.auto && self.file.is_some() {
            return Err("--auto cannot be combined with a file name".to_string());
        }
        Ok(())
    }

    /// Whether the file is chosen from the backend's annotated files.
    pub fn auto_select(&self) -> bool {
        self.auto || self.file.is_none()
    }
}

/// Check backend connectivity.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    #[command(flatten)]
    pub backend: BackendArgs,

    /// List image files and their annotation status.
    #[arg(long, default_value_t = false)]
    pub list_files: bool,
}

impl CheckConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.backend.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
