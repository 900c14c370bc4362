// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + validation loop using Burn's DataLoader and Adam.
//
//   - Training runs on Autodiff<NdArray> for gradients
//   - model.valid() returns the model on plain NdArray, so the
//     validation batcher is built for the inner backend
//   - validation accuracy counts label cells where
//     sigmoid(logit) > 0.5 agrees with the target
//
// Early stopping: training ends once validation loss has
// failed to drop by more than `min_delta` for more than
// `patience` consecutive epochs. Without a validation set
// every epoch runs.

use anyhow::{ensure, Result};
use burn::{
    backend::{Autodiff, NdArray},
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    nn::loss::BinaryCrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::activation::sigmoid,
};

use crate::application::config::TrainingSettings;
use crate::data::{batcher::VqaBatcher, dataset::VqaDataset};
use crate::domain::features::{EpochMetrics, TrainingRecord};
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::model::{VqaModel, VqaModelConfig};

pub type TrainBackend = Autodiff<NdArray>;
pub type InferBackend = NdArray;

pub fn run_training(
    model_cfg:     &VqaModelConfig,
    settings:      &TrainingSettings,
    train_dataset: VqaDataset,
    val_dataset:   Option<VqaDataset>,
    ckpt_manager:  &CheckpointManager,
) -> Result<(VqaModel<InferBackend>, TrainingRecord)> {
    ensure!(train_dataset.item_count() > 0, "No training samples");

    let device     = burn::backend::ndarray::NdArrayDevice::default();
    let text_shape = (model_cfg.max_tokens, model_cfg.embedding_dim);
    let metrics    = MetricsLogger::new(ckpt_manager.dir())?;

    <TrainBackend as Backend>::seed(settings.seed);

    // ── Build model ───────────────────────────────────────────────────────────
    let mut model: VqaModel<TrainBackend> = model_cfg.init(&device);
    tracing::info!(
        "Model ready: lstm={}, merge={}, dense={}, classes={}",
        model_cfg.lstm_units, model_cfg.merge_units, model_cfg.dense_units, model_cfg.classes
    );

    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_loader = DataLoaderBuilder::new(VqaBatcher::<TrainBackend>::new(device.clone(), text_shape))
        .batch_size(settings.batch_size)
        .shuffle(settings.seed)
        .num_workers(1)
        .build(train_dataset);

    let val_loader = val_dataset.filter(|d| d.item_count() > 0).map(|d| {
        DataLoaderBuilder::new(VqaBatcher::<InferBackend>::new(device.clone(), text_shape))
            .batch_size(settings.batch_size)
            .num_workers(1)
            .build(d)
    });
    if val_loader.is_none() {
        tracing::warn!("No validation samples; early stopping is disabled");
    }

    let mut record   = TrainingRecord::default();
    let mut best     = f64::INFINITY;
    let mut stagnant = 0usize;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=settings.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let (loss, _) = model.forward_loss(batch.images, batch.texts, batch.labels);

            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches  += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(settings.learning_rate, model, grads);
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();

        let (val_loss, val_accuracy) = match &val_loader {
            Some(loader) => {
                let mut loss_sum = 0.0f64;
                let mut batches  = 0usize;
                let mut correct  = 0usize;
                let mut cells    = 0usize;

                for batch in loader.iter() {
                    let logits = model_valid.forward(batch.images, batch.texts);
                    let bce = BinaryCrossEntropyLossConfig::new()
                        .with_logits(true)
                        .init(&logits.device());

                    loss_sum += bce
                        .forward(logits.clone(), batch.labels.clone())
                        .into_scalar()
                        .elem::<f64>();
                    batches += 1;

                    let [n, c] = batch.labels.dims();
                    cells += n * c;

                    let hits: i64 = sigmoid(logits)
                        .greater_elem(0.5)
                        .int()
                        .equal(batch.labels)
                        .int()
                        .sum()
                        .into_scalar()
                        .elem::<i64>();
                    correct += hits as usize;
                }

                let loss = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };
                let acc  = if cells   > 0 { correct as f64 / cells as f64 } else { 0.0 };
                (loss, acc)
            }
            None => (f64::NAN, 0.0),
        };

        let m = EpochMetrics::new(epoch, avg_train_loss, val_loss, val_accuracy);
        tracing::info!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | val_acc={:.1}%",
            epoch, settings.epochs, m.train_loss, m.val_loss, m.val_accuracy * 100.0,
        );
        metrics.log(&m)?;
        ckpt_manager.save_model(&model_valid, epoch)?;

        // ── Early stopping ────────────────────────────────────────────────────
        let improved = m.is_improvement(best, settings.min_delta);
        record.history.push(m);

        if val_loader.is_some() {
            if improved {
                best     = val_loss;
                stagnant = 0;
            } else {
                stagnant += 1;
                if stagnant > settings.patience {
                    tracing::info!(
                        "Early stop at epoch {}: val_loss did not improve on {:.4} by {}",
                        epoch, best, settings.min_delta
                    );
                    record.stopped_early = true;
                    break;
                }
            }
        }
    }

    tracing::info!("Training complete after {} epochs", record.history.len());
    Ok((model.valid(), record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::VqaItem;

    fn dataset(n: usize) -> VqaDataset {
        VqaDataset::new(
            (0..n)
                .map(|i| VqaItem {
                    image: vec![(i % 2) as f32; 4],
                    text:  vec![0.1 * i as f32; 6],
                    label: vec![(i % 2) as u8, 1 - (i % 2) as u8],
                })
                .collect(),
        )
    }

    fn settings(epochs: usize) -> TrainingSettings {
        TrainingSettings { epochs, batch_size: 4, ..TrainingSettings::default() }
    }

    #[test]
    fn test_training_writes_checkpoints_and_metrics() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let cfg  = VqaModelConfig::new(4, 3, 2, 4, 4, 4, 2, 0.0);

        let (model, record) =
            run_training(&cfg, &settings(2), dataset(8), None, &ckpt).unwrap();

        assert_eq!(record.history.len(), 2);
        assert!(!record.stopped_early);
        assert!(record.history.iter().all(|m| m.train_loss.is_finite()));
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);

        let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);

        let images = Tensor::<InferBackend, 2>::zeros([1, 4], &Default::default());
        let texts  = Tensor::<InferBackend, 3>::zeros([1, 2, 3], &Default::default());
        assert_eq!(model.probabilities(images, texts).dims(), [1, 2]);
    }

    #[test]
    fn test_validation_metrics_are_recorded() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let cfg  = VqaModelConfig::new(4, 3, 2, 4, 4, 4, 2, 0.0);

        // a huge min_delta means no epoch after the first counts as improvement
        let s = TrainingSettings { min_delta: 1e6, ..settings(5) };
        let (_, record) = run_training(&cfg, &s, dataset(8), Some(dataset(4)), &ckpt).unwrap();

        assert!(record.stopped_early);
        assert_eq!(record.history.len(), 2);
        let first = &record.history[0];
        assert!(first.val_loss.is_finite());
        assert!((0.0..=1.0).contains(&first.val_accuracy));
    }

    #[test]
    fn test_empty_training_set_errors() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let cfg  = VqaModelConfig::new(4, 3, 2, 4, 4, 4, 2, 0.0);
        assert!(run_training(&cfg, &settings(1), dataset(0), None, &ckpt).is_err());
    }
}
