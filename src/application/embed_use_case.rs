// ============================================================
// Layer 2 — EmbedUseCase
// ============================================================
// Runs the frozen CNN over every .jpg in an image folder and
// caches the features:
//
//   Step 1: Load the pipeline config           (Layer 2)
//   Step 2: Build or load the frozen CNN       (Layer 5 - ml)
//   Step 3: Encode every image; failures → None (Layer 6 - infra)
//   Step 4: Save the embedding store           (Layer 6 - infra)

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::application::config::PipelineConfig;
use crate::domain::traits::Persistable;
use crate::infra::image_store::{ImageEmbeddingStore, DEFAULT_STORE_NAME};
use crate::ml::image_encoder::FrozenCnn;

#[derive(Debug, Clone)]
pub struct EmbedConfig {
    pub images_dir:   String,
    /// Defaults to `<images_dir>/embedded_images.bin`
    pub output:       Option<String>,
    /// CompactRecorder weights for the CNN; seeded init when absent
    pub cnn_weights:  Option<String>,
    /// Where to write the CNN weights that were used
    pub save_weights: Option<String>,
    pub config_path:  Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbedReport {
    pub output: PathBuf,
    pub images: usize,
    pub failed: usize,
}

pub struct EmbedUseCase {
    config: EmbedConfig,
}

impl EmbedUseCase {
    pub fn new(config: EmbedConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EmbedReport> {
        let cfg      = &self.config;
        let pipeline = PipelineConfig::load(cfg.config_path.as_deref())?;

        let cnn = FrozenCnn::load(&pipeline.image, cfg.cnn_weights.as_deref().map(Path::new))?;
        if let Some(path) = &cfg.save_weights {
            cnn.save_weights(path)?;
        }

        let images_dir = Path::new(&cfg.images_dir);
        tracing::info!("Embedding images in '{}'", images_dir.display());
        let store = ImageEmbeddingStore::build(images_dir, |p| cnn.encode_file(p))?;

        let output = cfg
            .output
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| images_dir.join(DEFAULT_STORE_NAME));
        store.save(&output.to_string_lossy())?;

        Ok(EmbedReport { output, images: store.len(), failed: store.failed_count() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embeds_folder_and_keeps_failures() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(8, 8, image::Rgb([10, 200, 30]))
            .save_with_format(dir.path().join("good.jpg"), image::ImageFormat::Jpeg)
            .unwrap();
        std::fs::write(dir.path().join("broken.jpg"), b"garbage").unwrap();

        let cfg_path = dir.path().join("pipeline.json");
        std::fs::write(
            &cfg_path,
            r#"{"image": {"width": 8, "height": 8, "channels": [2], "tap_layer": 0, "pool_size": 1}}"#,
        )
        .unwrap();

        let report = EmbedUseCase::new(EmbedConfig {
            images_dir:   dir.path().to_string_lossy().into_owned(),
            output:       None,
            cnn_weights:  None,
            save_weights: None,
            config_path:  Some(cfg_path.to_string_lossy().into_owned()),
        })
        .execute()
        .unwrap();

        assert_eq!(report.images, 2);
        assert_eq!(report.failed, 1);

        let store = ImageEmbeddingStore::load(&report.output.to_string_lossy()).unwrap();
        assert_eq!(store.get("good.jpg").map(<[f32]>::len), Some(2));
        assert!(store.get("broken.jpg").is_none());
    }
}
