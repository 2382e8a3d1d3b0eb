//! Session and navigation control.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Session                            │
//! │                                                              │
//! │  select_file():  1. save current (if annotated)              │
//! │                  2. fetch metadata + saved annotations       │
//! │                  3. commit, draw, auto-suggest if empty      │
//! │                                                              │
//! │  ┌──────────────┐ ┌─────────────────┐ ┌───────────────────┐  │
//! │  │ DisplayState │ │ AnnotationStore │ │ SuggestionManager │  │
//! │  └──────────────┘ └─────────────────┘ └───────────────────┘  │
//! │  ┌─────────────────────┐ ┌────────────┐                      │
//! │  │ EnhancementPipeline │ │ SliceCache │                      │
//! │  └─────────────────────┘ └────────────┘                      │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//!                                ▼
//!                       AnnotationBackend
//! ```

mod controller;
mod state;

pub use controller::Session;
pub use state::{DisplayState, DrawOutcome, Navigation};
