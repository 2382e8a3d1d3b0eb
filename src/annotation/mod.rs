//! Annotation state owned by the session.

mod store;

pub use store::{first_annotated_file, AnnotationStore, Upsert};
