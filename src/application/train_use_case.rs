// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates classifier training:
//
//   Step 1: Load config, meta data and samples    (Layer 6 - infra)
//   Step 2: Hold out validation rows if needed    (Layer 4 - data)
//   Step 3: Assemble feature/label bundles        (Layer 4 - data)
//   Step 4: Log bundle shapes
//   Step 5: Fit the classifier                    (Layer 5 - ml)
//   Step 6: Copy meta data + config next to the
//           checkpoints so `predict` needs only
//           the checkpoint directory              (Layer 6 - infra)

use anyhow::{ensure, Result};
use std::path::Path;

use crate::application::config::PipelineConfig;
use crate::data::{assembler::assemble, splitter::split_train_val};
use crate::domain::features::{FeatureBundle, LabelBundle, TrainingRecord};
use crate::domain::traits::{Persistable, VqaClassifier};
use crate::domain::vocabulary::Vocabulary;
use crate::infra::{meta_store::META_FILE_NAME, sample_store::SampleStore};
use crate::ml::classifier::BurnVqaClassifier;

pub const PIPELINE_CONFIG_FILE: &str = "pipeline_config.json";

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub train_samples:  String,
    /// When absent, a seeded fraction of the training rows is held out
    pub val_samples:    Option<String>,
    pub meta:           String,
    pub checkpoint_dir: String,
    pub config_path:    Option<String>,
    pub epochs:         Option<usize>,
    pub batch_size:     Option<usize>,
    pub learning_rate:  Option<f64>,
}

pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainingRecord> {
        let cfg = &self.config;

        // ── Step 1: Load ──────────────────────────────────────────────────────
        let mut pipeline = PipelineConfig::load(cfg.config_path.as_deref())?;
        if let Some(epochs) = cfg.epochs {
            pipeline.training.epochs = epochs;
        }
        if let Some(batch_size) = cfg.batch_size {
            pipeline.training.batch_size = batch_size;
        }
        if let Some(lr) = cfg.learning_rate {
            pipeline.training.learning_rate = lr;
        }
        pipeline.validate()?;

        let vocab = Vocabulary::load(&cfg.meta)?;
        let train = SampleStore::load(&cfg.train_samples)?;
        ensure!(!train.is_empty(), "'{}' holds no samples", cfg.train_samples);
        let text_shape = train.text_shape;

        // ── Step 2: Validation rows ───────────────────────────────────────────
        let (train_samples, val_samples) = match &cfg.val_samples {
            Some(path) => {
                let val = SampleStore::load(path)?;
                ensure!(
                    val.text_shape == text_shape,
                    "validation text shape {:?} differs from training {:?}",
                    val.text_shape, text_shape
                );
                (train.samples, val.samples)
            }
            None => split_train_val(
                train.samples,
                pipeline.training.validation_fraction,
                pipeline.training.seed,
            ),
        };
        tracing::info!("Split: {} train, {} validation", train_samples.len(), val_samples.len());

        // ── Step 3: Assemble ──────────────────────────────────────────────────
        let (train_x, train_y) = assemble(&train_samples, &vocab, text_shape)?;
        let validation = if val_samples.is_empty() {
            None
        } else {
            Some(assemble(&val_samples, &vocab, text_shape)?)
        };

        // ── Step 4: Shape sanity ──────────────────────────────────────────────
        log_shapes("train", &train_x, &train_y);
        if let Some((x, y)) = &validation {
            log_shapes("validation", x, y);
        }

        // ── Step 5: Fit ───────────────────────────────────────────────────────
        let mut classifier = BurnVqaClassifier::new(
            pipeline.classifier.clone(),
            pipeline.training.clone(),
            &cfg.checkpoint_dir,
        )?;
        let record = classifier.fit(&train_x, &train_y, validation.as_ref().map(|(x, y)| (x, y)))?;

        // ── Step 6: Artifacts for predict ─────────────────────────────────────
        let dir = Path::new(&cfg.checkpoint_dir);
        vocab.save(&dir.join(META_FILE_NAME).to_string_lossy())?;
        pipeline.save(dir.join(PIPELINE_CONFIG_FILE))?;

        tracing::info!(
            "Training finished after {} epochs{}",
            record.history.len(),
            if record.stopped_early { " (early stop)" } else { "" }
        );
        Ok(record)
    }
}

fn log_shapes(name: &str, features: &FeatureBundle, labels: &LabelBundle) {
    tracing::info!(
        "{} shapes: image [{}, {}], text [{}, {}, {}], labels [{}, {}]",
        name,
        features.len(), features.image_width(),
        features.text.len(), features.text_shape.0, features.text_shape.1,
        labels.len(), labels.classes,
    );
}
