//! Per-file annotation collections with one point per label.
//!
//! `upsert` is the only way a single annotation enters a collection; it
//! replaces an entry with the same label in place or appends. Bulk loads go
//! through `replace_all`, which collapses duplicate labels before the
//! collection becomes visible.

use std::collections::{HashMap, HashSet};

use crate::error::AnnotationError;
use crate::volume::Annotation;

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// A new label was appended at this position
    Inserted(usize),

    /// An existing entry at this position was overwritten
    Replaced(usize),
}

/// In-memory annotation collections for the session.
#[derive(Debug, Default, Clone)]
pub struct AnnotationStore {
    collections: HashMap<String, Vec<Annotation>>,
    annotated_files: HashSet<String>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Annotations for `file`, in insertion order. Empty if never loaded.
    pub fn get(&self, file: &str) -> &[Annotation] {
        self.collections
            .get(file)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether a collection for `file` has been loaded or created this session.
    pub fn contains_file(&self, file: &str) -> bool {
        self.collections.contains_key(file)
    }

    /// Insert or replace by label.
    pub fn upsert(&mut self, file: &str, annotation: Annotation) -> Upsert {
        let entries = self.collections.entry(file.to_string()).or_default();
        match entries.iter().position(|a| a.label == annotation.label) {
            Some(index) => {
                entries[index] = annotation;
                Upsert::Replaced(index)
            }
            None => {
                entries.push(annotation);
                Upsert::Inserted(entries.len() - 1)
            }
        }
    }

    /// Remove the annotation at `index`.
    pub fn delete(&mut self, file: &str, index: usize) -> Result<Annotation, AnnotationError> {
        let len = self.get(file).len();
        match self.collections.get_mut(file) {
            Some(entries) if index < entries.len() => Ok(entries.remove(index)),
            _ => Err(AnnotationError::IndexOutOfRange { index, len }),
        }
    }

    pub fn is_annotated(&self, file: &str, label: &str) -> bool {
        self.get(file).iter().any(|a| a.label == label)
    }

    /// Replace the whole collection for `file`; later duplicates of a label win
    /// but keep the position of the first occurrence.
    pub fn replace_all(&mut self, file: &str, annotations: Vec<Annotation>) {
        let mut entries: Vec<Annotation> = Vec::with_capacity(annotations.len());
        for annotation in annotations {
            match entries.iter().position(|a| a.label == annotation.label) {
                Some(index) => entries[index] = annotation,
                None => entries.push(annotation),
            }
        }
        self.collections.insert(file.to_string(), entries);
    }

    /// Files known to have a saved annotation record.
    pub fn annotated_files(&self) -> &HashSet<String> {
        &self.annotated_files
    }

    /// Replace the annotated-file set with a fresh server listing.
    pub fn set_annotated_files(&mut self, files: impl IntoIterator<Item = String>) {
        self.annotated_files = files.into_iter().collect();
    }
}

/// The first file in listing order that has a saved annotation record.
pub fn first_annotated_file<'a>(
    files: &'a [String],
    annotated: &HashSet<String>,
) -> Option<&'a str> {
    files
        .iter()
        .map(String::as_str)
        .find(|file| annotated.contains(*file))
}
