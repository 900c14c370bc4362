// ============================================================
// Layer 5 — CNN+LSTM Answer Classifier
// ============================================================
//
//   image features [N, W] ── Linear → tanh ─────────────┐
//                                                        ⊙ → dropout → Linear → tanh
//   word vectors [N, T, D] ── LSTM → last hidden         │     → dropout → Linear
//                              → Linear → tanh ──────────┘           → logits [N, C]
//
// One logit per answer class; classes are independent
// (multi-label), so the loss is binary cross-entropy on logits
// and probabilities come from a sigmoid, not a softmax.

use anyhow::{ensure, Result};
use burn::{
    nn::{
        loss::BinaryCrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Linear, LinearConfig,
        Lstm, LstmConfig,
    },
    prelude::*,
    tensor::activation::{sigmoid, tanh},
};

use crate::application::config::ClassifierSettings;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct VqaModelConfig {
    pub image_dim:     usize,
    pub embedding_dim: usize,
    pub max_tokens:    usize,
    pub lstm_units:    usize,
    pub merge_units:   usize,
    pub dense_units:   usize,
    pub classes:       usize,
    pub dropout:       f64,
}

impl VqaModelConfig {
    pub fn from_settings(
        s:          &ClassifierSettings,
        image_dim:  usize,
        text_shape: (usize, usize),
        classes:    usize,
    ) -> Self {
        Self::new(
            image_dim, text_shape.1, text_shape.0,
            s.lstm_units, s.merge_units, s.dense_units,
            classes, s.dropout,
        )
    }

    /// Fail early when feature rows don't fit this network's input layers.
    /// Sequence length is free; only the per-step width is fixed.
    pub fn check_inputs(&self, image_width: usize, text_shape: (usize, usize)) -> Result<()> {
        ensure!(
            text_shape.1 == self.embedding_dim,
            "word vectors are {}-dim but the model was trained on {}-dim vectors",
            text_shape.1, self.embedding_dim
        );
        ensure!(
            image_width == self.image_dim,
            "image features are {} wide but the model was trained on {}",
            image_width, self.image_dim
        );
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> VqaModel<B> {
        VqaModel {
            image_dense: LinearConfig::new(self.image_dim, self.merge_units).init(device),
            lstm:        LstmConfig::new(self.embedding_dim, self.lstm_units, true).init(device),
            text_dense:  LinearConfig::new(self.lstm_units, self.merge_units).init(device),
            dense:       LinearConfig::new(self.merge_units, self.dense_units).init(device),
            output:      LinearConfig::new(self.dense_units, self.classes).init(device),
            dropout:     DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct VqaModel<B: Backend> {
    pub image_dense: Linear<B>,
    pub lstm:        Lstm<B>,
    pub text_dense:  Linear<B>,
    pub dense:       Linear<B>,
    pub output:      Linear<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> VqaModel<B> {
    /// images: [batch, W], texts: [batch, T, D] → logits: [batch, classes]
    pub fn forward(&self, images: Tensor<B, 2>, texts: Tensor<B, 3>) -> Tensor<B, 2> {
        let image = tanh(self.image_dense.forward(images));

        let (_, state) = self.lstm.forward(texts, None);
        let question   = tanh(self.text_dense.forward(state.hidden));

        let merged = self.dropout.forward(image * question);
        let hidden = self.dropout.forward(tanh(self.dense.forward(merged)));
        self.output.forward(hidden)
    }

    /// Per-class probabilities in [0, 1]
    pub fn probabilities(&self, images: Tensor<B, 2>, texts: Tensor<B, 3>) -> Tensor<B, 2> {
        sigmoid(self.forward(images, texts))
    }

    /// Mean binary cross-entropy against multi-hot targets
    pub fn forward_loss(
        &self,
        images:  Tensor<B, 2>,
        texts:   Tensor<B, 3>,
        targets: Tensor<B, 2, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(images, texts);
        let bce = BinaryCrossEntropyLossConfig::new()
            .with_logits(true)
            .init(&logits.device());
        let loss = bce.forward(logits.clone(), targets);
        (loss, logits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_output_shapes() {
        let device = Default::default();
        let cfg    = VqaModelConfig::new(6, 3, 4, 5, 8, 7, 2, 0.0);
        let model: VqaModel<NdArray> = cfg.init(&device);

        let images  = Tensor::<NdArray, 2>::ones([3, 6], &device);
        let texts   = Tensor::<NdArray, 3>::zeros([3, 4, 3], &device);
        let targets = Tensor::<NdArray, 2, Int>::zeros([3, 2], &device);

        let probs = model.probabilities(images.clone(), texts.clone());
        assert_eq!(probs.dims(), [3, 2]);
        let p: Vec<f32> = probs.into_data().to_vec().unwrap();
        assert!(p.iter().all(|v| (0.0..=1.0).contains(v)));

        let (loss, logits) = model.forward_loss(images, texts, targets);
        assert_eq!(logits.dims(), [3, 2]);
        assert!(loss.into_scalar().elem::<f32>().is_finite());
    }

    #[test]
    fn test_check_inputs() {
        let cfg = VqaModelConfig::new(6, 3, 4, 5, 8, 7, 2, 0.0);
        assert!(cfg.check_inputs(6, (4, 3)).is_ok());
        assert!(cfg.check_inputs(6, (9, 3)).is_ok());
        assert!(cfg.check_inputs(6, (4, 2)).is_err());
        assert!(cfg.check_inputs(5, (4, 3)).is_err());
    }
}
