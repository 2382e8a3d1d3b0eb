//! Lifecycle of AI-suggested annotations for the active file.
//!
//! ```text
//!   Absent ──begin──► Loading ──complete(ok)──► Present ──accept/dismiss──► Absent
//!                        │
//!                        └──complete(err)──► Absent
//! ```
//!
//! Every inference request gets an [`InferenceTicket`] tagged with the file and
//! a generation counter. Switching files bumps the generation, so a response
//! that resolves after the switch no longer matches and is dropped.

use tracing::{debug, info, warn};

use crate::annotation::AnnotationStore;
use crate::error::ServiceError;
use crate::service::InferenceResult;
use crate::volume::Annotation;

/// Proposed annotations for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionSet {
    pub filename: String,
    pub annotations: Vec<Annotation>,

    /// Axial slice the inference ran on
    pub z_index: u32,
}

/// Tag identifying one in-flight inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceTicket {
    filename: String,
    generation: u64,
}

impl InferenceTicket {
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionState {
    Absent,
    Loading(InferenceTicket),
    Present(SuggestionSet),
}

/// What happened to an inference response.
#[derive(Debug, Clone)]
pub enum Completion {
    /// Suggestions are now present
    Presented { count: usize, z_index: u32 },

    /// The service failed; state is back to absent
    Failed(ServiceError),

    /// The response belongs to a superseded request and was ignored
    Stale,
}

#[derive(Debug)]
pub struct SuggestionManager {
    filename: Option<String>,
    state: SuggestionState,
    generation: u64,
}

impl Default for SuggestionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SuggestionManager {
    pub fn new() -> Self {
        Self {
            filename: None,
            state: SuggestionState::Absent,
            generation: 0,
        }
    }

    /// Point the manager at a new active file. Any loading or present
    /// suggestions are discarded.
    pub fn reset_for(&mut self, filename: &str) {
        self.generation += 1;
        self.filename = Some(filename.to_string());
        self.state = SuggestionState::Absent;
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn state(&self) -> &SuggestionState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, SuggestionState::Loading(_))
    }

    /// Currently displayed suggestions (empty unless present).
    pub fn suggestions(&self) -> &[Annotation] {
        match &self.state {
            SuggestionState::Present(set) => set.annotations.as_slice(),
            _ => &[],
        }
    }

    pub fn current(&self) -> Option<&SuggestionSet> {
        match &self.state {
            SuggestionState::Present(set) => Some(set),
            _ => None,
        }
    }

    /// Start an inference for the active file.
    ///
    /// Returns `None` while another inference is loading or before any file
    /// is active; the caller should treat that as a no-op.
    pub fn begin(&mut self) -> Option<InferenceTicket> {
        if self.is_loading() {
            debug!("Inference already in flight, ignoring request");
            return None;
        }
        let filename = self.filename.clone()?;
        let ticket = InferenceTicket {
            filename,
            generation: self.generation,
        };
        self.state = SuggestionState::Loading(ticket.clone());
        Some(ticket)
    }

    /// Apply an inference response.
    pub fn complete(
        &mut self,
        ticket: &InferenceTicket,
        result: Result<InferenceResult, ServiceError>,
    ) -> Completion {
        let current = matches!(&self.state, SuggestionState::Loading(active) if active == ticket)
            && ticket.generation == self.generation;
        if !current {
            debug!("Dropping stale inference response for {}", ticket.filename);
            return Completion::Stale;
        }

        match result {
            Ok(result) => {
                let count = result.annotations.len();
                info!(
                    "Received {} suggestions for {} at z={}",
                    count, ticket.filename, result.z_index
                );
                self.state = SuggestionState::Present(SuggestionSet {
                    filename: ticket.filename.clone(),
                    annotations: result.annotations,
                    z_index: result.z_index,
                });
                Completion::Presented {
                    count,
                    z_index: result.z_index,
                }
            }
            Err(err) => {
                warn!("Inference failed for {}: {}", ticket.filename, err);
                self.state = SuggestionState::Absent;
                Completion::Failed(err)
            }
        }
    }

    /// Merge every suggestion into `store` by label, then go back to absent.
    ///
    /// Returns how many suggestions were merged (0 when none are present).
    pub fn accept(&mut self, store: &mut AnnotationStore) -> usize {
        let set = match std::mem::replace(&mut self.state, SuggestionState::Absent) {
            SuggestionState::Present(set) => set,
            other => {
                self.state = other;
                return 0;
            }
        };

        let count = set.annotations.len();
        for annotation in set.annotations {
            store.upsert(&set.filename, annotation);
        }
        info!("Accepted {} suggestions for {}", count, set.filename);
        count
    }

    /// Discard present suggestions without touching the store.
    pub fn dismiss(&mut self) -> usize {
        match std::mem::replace(&mut self.state, SuggestionState::Absent) {
            SuggestionState::Present(set) => {
                debug!("Dismissed {} suggestions for {}", set.annotations.len(), set.filename);
                set.annotations.len()
            }
            other => {
                self.state = other;
                0
            }
        }
    }
}
