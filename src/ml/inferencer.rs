// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Runs a trained classifier over a feature bundle and returns
// one sigmoid probability row per record. Rows are processed in
// fixed-size chunks so large test sets don't build one giant
// tensor.

use anyhow::Result;
use burn::prelude::*;

use crate::data::batcher::{image_tensor, text_tensor};
use crate::domain::features::FeatureBundle;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{VqaModel, VqaModelConfig};
use crate::ml::trainer::InferBackend;

const CHUNK_ROWS: usize = 256;

pub struct Inferencer {
    model:  VqaModel<InferBackend>,
    config: VqaModelConfig,
    device: <InferBackend as Backend>::Device,
}

impl Inferencer {
    pub fn new(model: VqaModel<InferBackend>, config: VqaModelConfig) -> Self {
        Self { model, config, device: Default::default() }
    }

    pub fn from_checkpoint(ckpt_manager: &CheckpointManager) -> Result<Self> {
        let device = Default::default();
        let config = ckpt_manager.load_config()?;
        let model  = ckpt_manager.load_model::<InferBackend>(&device)?;
        tracing::info!("Model loaded from checkpoint '{}'", ckpt_manager.dir().display());
        Ok(Self { model, config, device })
    }

    pub fn config(&self) -> &VqaModelConfig {
        &self.config
    }

    pub fn predict(&self, features: &FeatureBundle) -> Result<Vec<Vec<f32>>> {
        if features.is_empty() {
            return Ok(Vec::new());
        }
        self.config.check_inputs(features.image_width(), features.text_shape)?;

        let mut out = Vec::with_capacity(features.len());

        for (images, texts) in features.image.chunks(CHUNK_ROWS).zip(features.text.chunks(CHUNK_ROWS)) {
            let probs = self.model.probabilities(
                image_tensor(images, &self.device),
                text_tensor(texts, features.text_shape, &self.device),
            );
            let [rows, classes] = probs.dims();
            let flat: Vec<f32> = probs
                .into_data()
                .to_vec()
                .map_err(|e| anyhow::anyhow!("Cannot read probabilities: {e:?}"))?;

            out.extend((0..rows).map(|r| flat[r * classes..(r + 1) * classes].to_vec()));
        }

        tracing::debug!("Predicted {} rows", out.len());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inferencer() -> Inferencer {
        let cfg = VqaModelConfig::new(3, 2, 2, 4, 4, 4, 5, 0.0);
        Inferencer::new(cfg.init(&Default::default()), cfg)
    }

    #[test]
    fn test_one_row_per_record() {
        let inf = inferencer();

        let features = FeatureBundle {
            image:      vec![vec![0.2; 3]; 300],
            text:       vec![vec![0.1; 4]; 300],
            text_shape: (2, 2),
        };
        let probs = inf.predict(&features).unwrap();
        assert_eq!(probs.len(), 300);
        assert!(probs.iter().all(|row| row.len() == 5));
        // identical inputs give the same row on both sides of a chunk boundary
        assert!(probs[0].iter().zip(&probs[299]).all(|(a, b)| (a - b).abs() < 1e-5));
    }

    #[test]
    fn test_mismatched_feature_widths_error() {
        let inf = inferencer();

        let wrong_text = FeatureBundle {
            image:      vec![vec![0.2; 3]; 2],
            text:       vec![vec![0.1; 6]; 2],
            text_shape: (2, 3),
        };
        let err = inf.predict(&wrong_text).unwrap_err().to_string();
        assert!(err.contains("word vectors"), "{err}");

        let wrong_image = FeatureBundle {
            image:      vec![vec![0.2; 4]; 2],
            text:       vec![vec![0.1; 4]; 2],
            text_shape: (2, 2),
        };
        assert!(inf.predict(&wrong_image).is_err());

        let empty = FeatureBundle { image: Vec::new(), text: Vec::new(), text_shape: (2, 7) };
        assert!(inf.predict(&empty).unwrap().is_empty());
    }
}
