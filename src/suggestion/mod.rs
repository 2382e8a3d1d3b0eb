//! AI-suggested annotations: fetch, display, accept or dismiss.

mod manager;

pub use manager::{Completion, InferenceTicket, SuggestionManager, SuggestionSet, SuggestionState};
