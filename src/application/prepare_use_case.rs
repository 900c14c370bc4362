// ============================================================
// Layer 2 — PrepareUseCase
// ============================================================
// Turns one raw QA file into a processed sample store:
//
//   Step 1: Load QA rows                        (Layer 4 - data)
//   Step 2: Find-and-replace cleaning           (Layer 4 - data)
//   Step 3: Keyword indicator flags             (Layer 4 - data)
//   Step 4: Consolidate imaging devices         (Layer 3 - domain)
//   Step 5: Drop rows without an image file     (Layer 4 - data)
//   Step 6: Question text features              (Layer 4 - data)
//   Step 7: Image features, cached or computed  (Layer 5/6)
//   Step 8: Save the sample store               (Layer 6 - infra)
//
// Consolidation runs before path filtering so every row of an
// image votes on its device, even rows that are later dropped.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::application::config::PipelineConfig;
use crate::data::{
    dataset::Sample,
    enricher::KeywordEnricher,
    loader::{filter_existing, QaFileLoader},
    preprocessor::Preprocessor,
    text_features::TextFeatureExtractor,
};
use crate::domain::device_tag::apply_consolidation;
use crate::domain::record::{Record, Split};
use crate::domain::traits::{Persistable, RecordSource};
use crate::infra::{
    image_store::{ImageEmbeddingStore, DEFAULT_STORE_NAME},
    sample_store::SampleStore,
    tokenizer_store::TokenizerStore,
    word_vectors::WordVectors,
};
use crate::ml::image_encoder::FrozenCnn;

#[derive(Debug, Clone)]
pub struct PrepareConfig {
    pub qa_file:      String,
    pub images_dir:   String,
    pub split:        Split,
    /// GloVe-style text file: `word v1 … vD` per line
    pub word_vectors: String,
    /// Holds tokenizer.json and the default output
    pub work_dir:     String,
    /// Defaults to `<images_dir>/embedded_images.bin` when that exists
    pub image_store:  Option<String>,
    pub cnn_weights:  Option<String>,
    /// Defaults to `<work_dir>/<split>_samples.bin`
    pub output:       Option<String>,
    pub config_path:  Option<String>,
}

impl PrepareConfig {
    pub fn output_path(&self) -> PathBuf {
        self.output
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_samples_path(&self.work_dir, self.split))
    }
}

/// `<work_dir>/<split>_samples.bin`
pub fn default_samples_path(work_dir: &str, split: Split) -> PathBuf {
    Path::new(work_dir).join(format!("{split}_samples.bin"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrepareReport {
    pub output:        PathBuf,
    pub loaded:        usize,
    pub missing_files: usize,
    pub missing_image: usize,
    pub samples:       usize,
}

pub struct PrepareUseCase {
    config: PrepareConfig,
}

impl PrepareUseCase {
    pub fn new(config: PrepareConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PrepareReport> {
        let cfg      = &self.config;
        let pipeline = PipelineConfig::load(cfg.config_path.as_deref())?;

        // ── Step 1: Load ──────────────────────────────────────────────────────
        let mut records = QaFileLoader::new(&cfg.qa_file, &cfg.images_dir, cfg.split).load_all()?;
        let loaded = records.len();

        // ── Step 2: Clean ─────────────────────────────────────────────────────
        Preprocessor::new(&pipeline.enrichment.find_and_replace)?.clean_records(&mut records);

        // ── Step 3: Enrich ────────────────────────────────────────────────────
        let e = &pipeline.enrichment;
        let keywords = e.imaging_devices.iter().chain(&e.diagnosis).chain(&e.locations);
        let added = KeywordEnricher::new(keywords)?.enrich(&mut records);
        tracing::info!("Added {} indicator columns: {:?}", added.len(), added);

        // ── Step 4: Consolidate imaging devices ───────────────────────────────
        let devices = apply_consolidation(&mut records)?;
        tracing::info!("Consolidated imaging device for {} images", devices.len());

        // ── Step 5: Drop rows without an image ────────────────────────────────
        let (records, missing_files) = filter_existing(records);

        // ── Step 6: Text features ─────────────────────────────────────────────
        let vectors   = WordVectors::load(&cfg.word_vectors)?;
        let tokenizer = TokenizerStore::new(&cfg.work_dir).load_or_build(&vectors)?;
        let extractor = TextFeatureExtractor::new(tokenizer, vectors, pipeline.text.max_tokens);
        let text_shape = extractor.shape();

        // ── Step 7: Image features ────────────────────────────────────────────
        let images = ImageSource::open(cfg, &pipeline)?;

        let mut samples       = Vec::with_capacity(records.len());
        let mut missing_image = 0usize;
        for (i, record) in records.into_iter().enumerate() {
            let text_features = extractor.extract(&record.question)?;
            match images.features(&record) {
                Some(image_features) => samples.push(Sample {
                    record,
                    text_features,
                    image_features: Some(image_features),
                }),
                None => {
                    tracing::warn!("No image features for '{}'; row skipped", record.image_name);
                    missing_image += 1;
                }
            }
            if (i + 1) % 500 == 0 {
                tracing::debug!("Prepared {} rows", i + 1);
            }
        }

        // ── Step 8: Save ──────────────────────────────────────────────────────
        let output = cfg.output_path();
        let store  = SampleStore::new(samples, text_shape);
        store.save(&output.to_string_lossy())?;

        tracing::info!(
            "Prepared {} {} samples ({} loaded, {} without image file, {} without image features)",
            store.len(), cfg.split, loaded, missing_files, missing_image
        );
        Ok(PrepareReport { output, loaded, missing_files, missing_image, samples: store.len() })
    }
}

// ─── Image feature lookup ─────────────────────────────────────────────────────
// Cached features win; otherwise the CNN is built once and run
// per image. An encoding failure means "no features", never an
// aborted run.
enum ImageSource {
    Cached(ImageEmbeddingStore),
    Live(FrozenCnn),
}

impl ImageSource {
    fn open(cfg: &PrepareConfig, pipeline: &PipelineConfig) -> Result<Self> {
        let cached = cfg
            .image_store
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| Some(Path::new(&cfg.images_dir).join(DEFAULT_STORE_NAME)).filter(|p| p.exists()));

        match cached {
            Some(path) => {
                tracing::info!("Using cached image features from '{}'", path.display());
                Ok(Self::Cached(ImageEmbeddingStore::load(&path.to_string_lossy())?))
            }
            None => {
                tracing::info!("No image store found; encoding images on the fly");
                let weights = cfg.cnn_weights.as_deref().map(Path::new);
                Ok(Self::Live(FrozenCnn::load(&pipeline.image, weights)?))
            }
        }
    }

    fn features(&self, record: &Record) -> Option<Vec<f32>> {
        match self {
            Self::Cached(store) => store.get(&record.image_name).map(<[f32]>::to_vec),
            Self::Live(cnn) => match cnn.encode_file(&record.path) {
                Ok(f) => Some(f),
                Err(e) => {
                    tracing::warn!("Failed to embed '{}': {:#}", record.path.display(), e);
                    None
                }
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::device_tag::DeviceTag;
    use std::fs;

    pub(crate) fn write_fixture(dir: &Path) {
        let images = dir.join("images");
        fs::create_dir_all(&images).unwrap();
        for name in ["a", "b"] {
            image::RgbImage::from_pixel(8, 8, image::Rgb([50, 100, 150]))
                .save_with_format(images.join(format!("{name}.jpg")), image::ImageFormat::Jpeg)
                .unwrap();
        }
        fs::write(
            dir.join("qa.txt"),
            "1\ta\twhat does the computed tomography show?\tliver lesion\n\
             2\ta\twhich modality is this?\tmri\n\
             3\tb\tis this an mri of the brain?\tbrain tumor\n\
             \n\
             4\tmissing\twhere is the mass?\tchest\n",
        )
        .unwrap();
        fs::write(dir.join("vectors.txt"), "what 1 0\nthe 0 1\nshow 0.5 0.5\nis 1 1\n").unwrap();
        fs::write(
            dir.join("pipeline.json"),
            r#"{"text": {"max_tokens": 4},
                "image": {"width": 8, "height": 8, "channels": [2], "tap_layer": 0, "pool_size": 1}}"#,
        )
        .unwrap();
    }

    pub(crate) fn prepare_config(dir: &Path, split: Split) -> PrepareConfig {
        let s = |p: PathBuf| p.to_string_lossy().into_owned();
        PrepareConfig {
            qa_file:      s(dir.join("qa.txt")),
            images_dir:   s(dir.join("images")),
            split,
            word_vectors: s(dir.join("vectors.txt")),
            work_dir:     s(dir.join("work")),
            image_store:  None,
            cnn_weights:  None,
            output:       None,
            config_path:  Some(s(dir.join("pipeline.json"))),
        }
    }

    #[test]
    fn test_prepare_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let report = PrepareUseCase::new(prepare_config(dir.path(), Split::Train)).execute().unwrap();
        assert_eq!(report.loaded, 4);
        assert_eq!(report.missing_files, 1);
        assert_eq!(report.samples, 3);

        let store = SampleStore::load(&report.output.to_string_lossy()).unwrap();
        assert_eq!(store.text_shape, (4, 2));

        let first = &store.samples[0];
        // "computed tomography" was rewritten to "ct"
        assert_eq!(first.record.question, "what does the ct show?");
        // image a: one ct row and one mri row → unknown
        assert_eq!(first.record.device, Some(DeviceTag::Unknown));
        assert!(!first.record.indicators.contains_key("ct"));
        assert!(first.record.flag("liver"));
        assert_eq!(first.text_features, vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(first.image_features.as_ref().map(Vec::len), Some(2));

        assert_eq!(store.samples[2].record.device, Some(DeviceTag::Mri));
    }
}
