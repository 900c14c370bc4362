// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// One use case per CLI command. Each owns a plain config
// struct (built from CLI args) and an `execute` that wires the
// lower layers together:
//
//   embed-images → EmbedUseCase    images → image feature store
//   prepare      → PrepareUseCase  QA file → sample store
//   build-meta   → MetaUseCase     sample stores → meta_data.json
//   train        → TrainUseCase    samples + meta → checkpoint
//   predict      → PredictUseCase  samples + checkpoint → CSV
//
// No model math or file formats live here; only workflow.

/// Pipeline-wide settings (JSON file or defaults)
pub mod config;

pub mod embed_use_case;

pub mod prepare_use_case;

pub mod meta_use_case;

// The training workflow
pub mod train_use_case;

pub mod predict_use_case;
