use thiserror::Error;

/// Errors from the external collaborators (slice service, persistence,
/// inference). Every variant is recoverable: the caller logs it and keeps its
/// prior state.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Transport-level failure (connection refused, timeout, ...)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The backend answered with a non-success status
    #[error("Backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The requested file or resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A raster payload could not be decoded into an image
    #[error("Failed to decode raster: {0}")]
    Decode(String),

    /// The inference service reported `success: false`
    #[error("Inference failed: {0}")]
    Inference(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ServiceError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            ServiceError::InvalidResponse(err.to_string())
        } else {
            ServiceError::Connection(err.to_string())
        }
    }
}

/// Validation errors raised by annotation mutations before anything changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationError {
    /// Delete or focus with a position past the end of the collection
    #[error("Annotation index {index} out of range (file has {len} annotations)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Click without an active label
    #[error("No label selected")]
    NoLabelSelected,

    /// Label not present in the configured label set
    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    /// Click landed outside the raw raster
    #[error("Pixel ({x}, {y}) is outside the {width}x{height} slice")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },
}

/// Errors surfaced by the session controller.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// A collaborator call failed
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// An annotation mutation was rejected
    #[error(transparent)]
    Annotation(#[from] AnnotationError),

    /// The configured file list is empty
    #[error("No image files configured")]
    NoFiles,

    /// An operation needs an open file but none has been opened yet
    #[error("No file is open")]
    NotOpen,

    /// Direct selection past the end of the file list
    #[error("File index {index} out of range ({count} files)")]
    FileOutOfRange { index: usize, count: usize },

    /// The histogram reference is the current file or not in the file list
    #[error("Invalid histogram reference: {0}")]
    InvalidReference(String),

    /// An operation needs a drawn slice but none has been fetched yet
    #[error("No slice has been drawn for the current view")]
    NoRaster,
}
