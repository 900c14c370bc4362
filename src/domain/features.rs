// ============================================================
// Layer 3 — Feature and Label Bundles
// ============================================================
// The matrices handed to a classifier. Every bundle is stored
// row-major with one row per source record, and row i of every
// array refers to the same record.

use serde::{Deserialize, Serialize};

/// Per-modality model inputs, aligned by record order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureBundle {
    /// Flattened CNN activations, one row per record
    pub image: Vec<Vec<f32>>,

    /// Flattened `(max_tokens, embedding_dim)` word vectors, one row per record
    pub text: Vec<Vec<f32>>,

    /// `(max_tokens, embedding_dim)` of every text row
    pub text_shape: (usize, usize),
}

impl FeatureBundle {
    pub fn len(&self) -> usize {
        self.image.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }

    pub fn image_width(&self) -> usize {
        self.image.first().map_or(0, Vec::len)
    }
}

/// Multi-hot targets over the answer vocabulary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelBundle {
    pub classes: usize,
    pub rows:    Vec<Vec<u8>>,
}

impl LabelBundle {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Metrics for one training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Starts at 1
    pub epoch: usize,

    /// Mean binary cross-entropy over training batches
    pub train_loss: f64,

    /// Mean binary cross-entropy on the validation set (NaN without one)
    pub val_loss: f64,

    /// Fraction of label cells predicted correctly at 0.5
    pub val_accuracy: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64, val_accuracy: f64) -> Self {
        Self { epoch, train_loss, val_loss, val_accuracy }
    }

    /// True if validation loss dropped by more than `min_delta`
    pub fn is_improvement(&self, best_val_loss: f64, min_delta: f64) -> bool {
        self.val_loss < best_val_loss - min_delta
    }
}

/// What `fit` reports back
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub history:       Vec<EpochMetrics>,
    pub stopped_early: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 2.5, 2.3, 0.9);
        assert!(m.is_improvement(3.0, 0.02));
        assert!(!m.is_improvement(2.31, 0.02));
        assert!(!m.is_improvement(2.0, 0.0));
    }
}
