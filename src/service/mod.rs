//! External collaborators: slice rendering, volume metadata, annotation
//! persistence and landmark inference.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │                 Session                 │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          AnnotationBackend              │
//! │  SliceSource + AnnotationPersistence    │
//! │            + InferenceService           │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │   HttpBackend   │    │  in-memory mocks    │
//! │  (REST client)  │    │  (tests)            │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! Fetched slice payloads are kept in a [`SliceCache`] by the session so that
//! toggling filters or moving the magnifier never refetches.

mod cache;
mod http;
mod source;

pub use cache::{SliceCache, DEFAULT_SLICE_CACHE_CAPACITY};
pub use http::{decode_data_url, HttpBackend, DEFAULT_REQUEST_TIMEOUT};
pub use source::{
    AnnotationBackend, AnnotationPersistence, InferenceResult, InferenceService, SliceRequest,
    SliceSource,
};
