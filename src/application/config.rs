// ============================================================
// Layer 2 — Pipeline Configuration
// ============================================================
// Every tunable value in one explicit object, passed into each
// component at construction. Nothing reads ambient globals.
//
// Defaults are usable as-is; a JSON file given with --config
// overrides any subset of fields (missing fields keep their
// defaults thanks to #[serde(default)]).

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub text:       TextSettings,
    pub image:      ImageSettings,
    pub enrichment: EnrichmentSettings,
    pub classifier: ClassifierSettings,
    pub training:   TrainingSettings,
    pub prediction: PredictionSettings,
}

/// Text feature shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSettings {
    /// Tokens kept per question; longer text is truncated,
    /// shorter text is zero padded
    pub max_tokens: usize,
}

/// Image pre-processing and the frozen CNN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub width:  u32,
    pub height: u32,

    /// Per-channel RGB normalisation applied after scaling to [0, 1]
    pub mean: [f32; 3],
    pub std:  [f32; 3],

    /// Output channels of each conv block
    pub channels: Vec<usize>,

    /// Block whose activations are kept (0-based)
    pub tap_layer: usize,

    /// Tapped activations are average-pooled to pool_size × pool_size
    pub pool_size: usize,

    /// Seed for weights when no pretrained checkpoint is supplied
    pub seed: u64,
}

/// A case-insensitive regex rewrite applied during cleaning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindReplace {
    pub pattern:     String,
    pub replacement: String,
}

/// Keyword indicator columns and text rewrites
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentSettings {
    /// Must contain "ct" and "mri" for device consolidation
    pub imaging_devices:  Vec<String>,
    pub diagnosis:        Vec<String>,
    pub locations:        Vec<String>,
    pub find_and_replace: Vec<FindReplace>,
}

/// Classifier head sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub lstm_units:  usize,
    pub merge_units: usize,
    pub dense_units: usize,
    pub dropout:     f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub epochs:        usize,
    pub batch_size:    usize,
    pub learning_rate: f64,

    /// Validation loss must drop by more than this to count as progress
    pub min_delta: f64,

    /// Epochs without progress tolerated before stopping
    pub patience: usize,

    /// Share of training samples held out when no validation set is given
    pub validation_fraction: f64,

    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionSettings {
    /// Per-record probability percentile an answer must reach
    pub percentile: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            text:       TextSettings::default(),
            image:      ImageSettings::default(),
            enrichment: EnrichmentSettings::default(),
            classifier: ClassifierSettings::default(),
            training:   TrainingSettings::default(),
            prediction: PredictionSettings::default(),
        }
    }
}

impl Default for TextSettings {
    fn default() -> Self {
        Self { max_tokens: 32 }
    }
}

impl ImageSettings {
    /// Every conv block halves the image, so the tapped activation
    /// must still be at least one pixel on each side.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("image size must be positive, got {}x{}", self.width, self.height);
        }
        if self.channels.is_empty() {
            bail!("image.channels must name at least one conv block");
        }
        if self.tap_layer >= self.channels.len() {
            bail!(
                "image.tap_layer {} out of range for {} conv blocks",
                self.tap_layer,
                self.channels.len()
            );
        }
        let blocks = self.tap_layer + 1;
        let side   = self.width.min(self.height) as usize;
        if blocks >= usize::BITS as usize || side >> blocks == 0 {
            bail!(
                "image {}x{} shrinks to nothing after {blocks} pooling blocks",
                self.width,
                self.height,
            );
        }
        if self.pool_size == 0 {
            bail!("image.pool_size must be positive");
        }
        if self.std.iter().any(|s| *s <= 0.0) {
            bail!("image.std entries must be positive");
        }
        Ok(())
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            width:     224,
            height:    224,
            mean:      [0.485, 0.456, 0.406],
            std:       [0.229, 0.224, 0.225],
            channels:  vec![16, 32, 64, 128],
            tap_layer: 3,
            pool_size: 4,
            seed:      42,
        }
    }
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        let words = |ws: &[&str]| ws.iter().map(|w| w.to_string()).collect::<Vec<_>>();
        Self {
            imaging_devices: words(&["ct", "mri"]),
            diagnosis:       words(&["tumor", "cyst", "fracture", "hemorrhage", "lesion", "mass"]),
            locations:       words(&["brain", "chest", "lung", "liver", "kidney", "spine", "pelvis", "abdomen"]),
            find_and_replace: vec![
                FindReplace {
                    pattern:     r"\bcomputed tomography\b".into(),
                    replacement: "ct".into(),
                },
                FindReplace {
                    pattern:     r"\bmagnetic resonance( imaging)?\b".into(),
                    replacement: "mri".into(),
                },
            ],
        }
    }
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            lstm_units:  256,
            merge_units: 512,
            dense_units: 512,
            dropout:     0.5,
        }
    }
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            epochs:              20,
            batch_size:          75,
            learning_rate:       1e-3,
            min_delta:           0.02,
            patience:            0,
            validation_fraction: 0.2,
            seed:                42,
        }
    }
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self { percentile: 99.8 }
    }
}

impl PipelineConfig {
    /// Load from a JSON file, or use defaults when no path is given
    pub fn load(path: Option<&str>) -> Result<Self> {
        let cfg = match path {
            Some(p) => {
                let json = fs::read_to_string(p)
                    .with_context(|| format!("Cannot read config '{p}'"))?;
                serde_json::from_str(&json)
                    .with_context(|| format!("Invalid config '{p}'"))?
            }
            None => Self::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.text.max_tokens == 0 {
            bail!("text.max_tokens must be positive");
        }
        self.image.validate()?;
        if self.training.batch_size == 0 {
            bail!("training.batch_size must be positive");
        }
        if !(0.0..1.0).contains(&self.training.validation_fraction) {
            bail!("training.validation_fraction must be in [0, 1)");
        }
        if !(0.0..=100.0).contains(&self.prediction.percentile) {
            bail!("prediction.percentile must be in [0, 100], got {}", self.prediction.percentile);
        }
        for device in ["ct", "mri"] {
            if !self.enrichment.imaging_devices.iter().any(|d| d == device) {
                tracing::warn!(
                    "enrichment.imaging_devices has no '{device}' entry; every image will consolidate without it"
                );
            }
        }
        Ok(())
    }

    /// Width of one image feature row produced by the frozen CNN
    pub fn image_feature_width(&self) -> usize {
        self.image.channels[self.image.tap_layer] * self.image.pool_size * self.image.pool_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
        assert_eq!(PipelineConfig::default().image_feature_width(), 128 * 4 * 4);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{ "prediction": { "percentile": 95.0 } }"#).unwrap();
        assert_eq!(cfg.prediction.percentile, 95.0);
        assert_eq!(cfg.text.max_tokens, 32);
    }

    #[test]
    fn test_rejects_bad_tap_layer() {
        let mut cfg = PipelineConfig::default();
        cfg.image.tap_layer = 9;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_image_too_small_for_pooling() {
        let mut cfg = PipelineConfig::default();
        cfg.image.width  = 8;
        cfg.image.height = 8;
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("shrinks to nothing"), "{err}");

        // four 2x2 pools need 16px per side
        cfg.image.width  = 16;
        cfg.image.height = 16;
        assert!(cfg.validate().is_ok());
        cfg.image.height = 15;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_round_trips_through_file() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut cfg = PipelineConfig::default();
        cfg.training.epochs = 3;
        cfg.save(&path).unwrap();
        let loaded = PipelineConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(loaded, cfg);
    }
}
