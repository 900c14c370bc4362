// ============================================================
// Layer 3 — Integrity Errors
// ============================================================
// Data-integrity failures are never corrected silently.
// Each variant means the build rules themselves do not cover
// the observed data, so the whole run stops.
//
// These are typed with thiserror so tests can match on the
// exact failure; the application layer wraps them in anyhow.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    /// A vocabulary mapping assigned two indices to one key
    #[error("mapping '{mapping}' has duplicate key '{key}'")]
    DuplicateKey { mapping: &'static str, key: String },

    /// A vocabulary mapping assigned one index to two keys
    #[error("mapping '{mapping}' has duplicate index {index}")]
    DuplicateIndex { mapping: &'static str, index: usize },

    /// Indices of a mapping are not exactly 0..len
    #[error("mapping '{mapping}' is not dense: index {index} out of range for {len} entries")]
    SparseIndex { mapping: &'static str, index: usize, len: usize },

    /// Forward and reverse mappings disagree
    #[error("mapping '{mapping}' forward and reverse tables disagree on '{key}'")]
    Asymmetric { mapping: &'static str, key: String },

    /// Images whose device label set did not resolve to one label
    #[error("got {count} non consolidated image devices, for example: {examples:?}")]
    UnresolvedTags { count: usize, examples: Vec<String> },

    /// Feature and label bundles are not row-aligned
    #[error("bundle '{bundle}' has {actual} rows, expected {expected}")]
    RowMismatch { bundle: &'static str, expected: usize, actual: usize },

    /// A feature row has a different width from the first row
    #[error("'{bundle}' row {row} has width {actual}, expected {expected}")]
    WidthMismatch { bundle: &'static str, row: usize, expected: usize, actual: usize },

    /// A record reached assembly without image features
    #[error("record for image '{image_name}' has no image features")]
    MissingImageFeatures { image_name: String },

    /// Test rows must never feed the vocabulary
    #[error("vocabulary must be built from train/validation records, got a '{split}' record")]
    WrongSplit { split: String },
}
