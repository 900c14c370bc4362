// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and pure functions: what a record is, how
// device tags consolidate, how the vocabulary is indexed and
// how probabilities turn back into answers.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - only structs, enums, traits and pure functions
//
// Everything with a real invariant lives here so it can be
// tested without images, word vectors or a model.

/// Question/answer/image records and dataset splits
pub mod record;

/// Imaging device tags and per-image consolidation
pub mod device_tag;

/// Word / answer / device index mappings
pub mod vocabulary;

/// Shared word-splitting rules
pub mod text;

/// Feature and label bundles, training history
pub mod features;

/// Percentile selection, decoding and evaluation
pub mod prediction;

/// Typed data-integrity failures
pub mod errors;

/// Core abstractions other layers implement
pub mod traits;
