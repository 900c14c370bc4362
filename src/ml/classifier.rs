// ============================================================
// Layer 5 — Burn-backed VqaClassifier
// ============================================================
// Wires model, trainer, inferencer and checkpoints behind the
// domain's VqaClassifier trait, so the application layer can
// fit and predict without touching burn types.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::application::config::{ClassifierSettings, TrainingSettings};
use crate::data::dataset::VqaDataset;
use crate::domain::features::{FeatureBundle, LabelBundle, TrainingRecord};
use crate::domain::traits::VqaClassifier;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::Inferencer;
use crate::ml::model::VqaModelConfig;
use crate::ml::trainer::run_training;

pub struct BurnVqaClassifier {
    settings:  ClassifierSettings,
    training:  TrainingSettings,
    ckpt:      CheckpointManager,
    inference: Option<Inferencer>,
}

impl BurnVqaClassifier {
    /// An untrained classifier that checkpoints into `checkpoint_dir`
    pub fn new(
        settings:       ClassifierSettings,
        training:       TrainingSettings,
        checkpoint_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        Ok(Self {
            settings,
            training,
            ckpt:      CheckpointManager::new(checkpoint_dir)?,
            inference: None,
        })
    }

    /// A classifier restored from the latest checkpoint
    pub fn from_checkpoint(checkpoint_dir: impl Into<PathBuf>) -> Result<Self> {
        let ckpt      = CheckpointManager::new(checkpoint_dir)?;
        let inference = Inferencer::from_checkpoint(&ckpt)?;
        Ok(Self {
            settings:  ClassifierSettings::default(),
            training:  TrainingSettings::default(),
            ckpt,
            inference: Some(inference),
        })
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.ckpt
    }

    /// Shape of the network currently held, once trained or loaded
    pub fn model_config(&self) -> Option<&VqaModelConfig> {
        self.inference.as_ref().map(Inferencer::config)
    }
}

impl VqaClassifier for BurnVqaClassifier {
    fn fit(
        &mut self,
        features:   &FeatureBundle,
        labels:     &LabelBundle,
        validation: Option<(&FeatureBundle, &LabelBundle)>,
    ) -> Result<TrainingRecord> {
        let model_cfg = VqaModelConfig::from_settings(
            &self.settings,
            features.image_width(),
            features.text_shape,
            labels.classes,
        );
        self.ckpt.save_config(&model_cfg)?;

        let train = VqaDataset::from_bundles(features, labels).context("Training bundles")?;
        let val   = validation
            .map(|(f, l)| VqaDataset::from_bundles(f, l))
            .transpose()
            .context("Validation bundles")?;

        let (model, record) = run_training(&model_cfg, &self.training, train, val, &self.ckpt)?;
        self.inference = Some(Inferencer::new(model, model_cfg));
        Ok(record)
    }

    fn predict(&self, features: &FeatureBundle) -> Result<Vec<Vec<f32>>> {
        self.inference
            .as_ref()
            .context("Classifier has neither been trained nor loaded from a checkpoint")?
            .predict(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundles(n: usize) -> (FeatureBundle, LabelBundle) {
        let features = FeatureBundle {
            image:      (0..n).map(|i| vec![i as f32 / n as f32; 3]).collect(),
            text:       vec![vec![0.5; 4]; n],
            text_shape: (2, 2),
        };
        let labels = LabelBundle {
            classes: 2,
            rows:    (0..n).map(|i| vec![(i % 2) as u8, 1]).collect(),
        };
        (features, labels)
    }

    fn small() -> ClassifierSettings {
        ClassifierSettings { lstm_units: 4, merge_units: 4, dense_units: 4, dropout: 0.0 }
    }

    #[test]
    fn test_predict_before_fit_errors() {
        let dir = tempfile::tempdir().unwrap();
        let clf = BurnVqaClassifier::new(small(), TrainingSettings::default(), dir.path()).unwrap();
        assert!(clf.predict(&bundles(2).0).is_err());
    }

    #[test]
    fn test_fit_then_reload_from_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let training = TrainingSettings { epochs: 1, batch_size: 2, ..TrainingSettings::default() };
        let mut clf = BurnVqaClassifier::new(small(), training, dir.path()).unwrap();

        let (features, labels) = bundles(6);
        let record = clf.fit(&features, &labels, None).unwrap();
        assert_eq!(record.history.len(), 1);
        assert_eq!(clf.predict(&features).unwrap().len(), 6);

        let reloaded = BurnVqaClassifier::from_checkpoint(dir.path()).unwrap();
        let probs    = reloaded.predict(&features).unwrap();
        assert_eq!(probs.len(), 6);
        assert!(probs.iter().all(|row| row.len() == 2));
        assert_eq!(reloaded.model_config().map(|c| c.image_dim), Some(3));
        assert_eq!(reloaded.model_config().map(|c| c.embedding_dim), Some(2));
    }
}
