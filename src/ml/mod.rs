// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All burn model code lives here; the application layer only
// sees the VqaClassifier trait and FrozenCnn.
//
//   image_encoder.rs — frozen conv stack that turns an image
//                      file into a fixed-width feature row
//
//   model.rs         — CNN-feature + LSTM classifier with one
//                      sigmoid output per answer class
//
//   trainer.rs       — Adam loop with BCE loss, validation,
//                      per-epoch checkpoints and early stop
//
//   inferencer.rs    — chunked probability prediction
//
//   classifier.rs    — VqaClassifier implementation tying the
//                      above to the checkpoint directory

/// Frozen CNN image feature extractor
pub mod image_encoder;

/// CNN+LSTM multi-label answer classifier
pub mod model;

/// Training loop with validation, checkpointing and early stopping
pub mod trainer;

/// Batched probability prediction from a trained model
pub mod inferencer;

/// VqaClassifier backed by burn
pub mod classifier;
