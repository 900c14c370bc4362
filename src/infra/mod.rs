// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File formats and on-disk artifacts shared by several layers:
//
//   word_vectors.rs    — GloVe-style embedding table reader
//
//   tokenizer_store.rs — word-level tokenizer built over the
//                        embedding vocabulary, saved as
//                        tokenizer.json and reloaded when valid
//
//   image_store.rs     — per-image CNN features (bincode)
//
//   sample_store.rs    — processed samples for one split (bincode)
//
//   meta_store.rs      — vocabulary JSON persistence
//
//   checkpoint.rs      — classifier weights and config
//
//   metrics.rs         — per-epoch CSV log
//
//   results.rs         — prediction result table (CSV)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer building, saving, and loading
pub mod tokenizer_store;

/// Pretrained word embedding table
pub mod word_vectors;

/// Cached CNN features keyed by image file name
pub mod image_store;

/// Processed dataset store
pub mod sample_store;

/// Meta data (vocabulary) JSON file
pub mod meta_store;

/// Training metrics CSV logger
pub mod metrics;

/// Prediction result table
pub mod results;
