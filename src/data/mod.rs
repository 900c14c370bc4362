// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the raw QA files and the tensor batches
// the classifier trains on:
//
//   QA .txt files + image folders
//       │
//       ▼
//   QaFileLoader        → tab-separated rows into Records
//       │
//       ▼
//   Preprocessor        → find-and-replace rules, whitespace
//       │
//       ▼
//   KeywordEnricher     → whole-word indicator flags
//       │
//       ▼
//   (device_tag)        → one imaging device per image
//       │
//       ▼
//   TextFeatureExtractor→ question word-vector blocks
//       │
//       ▼
//   Assembler           → aligned feature/label bundles
//       │
//       ▼
//   VqaDataset          → Burn's Dataset trait
//       │
//       ▼
//   VqaBatcher          → stacked tensor batches

/// Reads VQA-Med QA files and drops rows without an image file
pub mod loader;

/// Regex find-and-replace cleaning
pub mod preprocessor;

/// Whole-word keyword indicator flags
pub mod enricher;

/// Tokenizer + word vectors → fixed-shape text features
pub mod text_features;

/// Stacks samples into feature and label bundles
pub mod assembler;

/// Implements Burn's Dataset trait for VQA items
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded train/validation split
pub mod splitter;
