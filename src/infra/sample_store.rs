// ============================================================
// Layer 6 — Processed Sample Store
// ============================================================
// `prepare` writes one store per split so feature extraction
// never has to run twice. bincode keeps the float-heavy payload
// compact and fast to reload.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::Path,
};

use crate::data::dataset::Sample;
use crate::domain::record::Record;
use crate::domain::traits::Persistable;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleStore {
    pub samples:    Vec<Sample>,
    /// `(max_tokens, embedding_dim)` of every text feature row
    pub text_shape: (usize, usize),
}

impl SampleStore {
    pub fn new(samples: Vec<Sample>, text_shape: (usize, usize)) -> Self {
        Self { samples, text_shape }
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.samples.iter().map(|s| &s.record)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Persistable for SampleStore {
    fn save(&self, path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        let file = File::create(path).with_context(|| format!("Cannot create '{path}'"))?;
        bincode::serialize_into(BufWriter::new(file), self)
            .with_context(|| format!("Cannot write samples to '{path}'"))?;
        tracing::info!("Saved {} samples to '{}'", self.len(), path);
        Ok(())
    }

    fn load(path: &str) -> Result<Self> {
        let file = File::open(path).with_context(|| {
            format!("Cannot open samples '{path}'. Have you run 'prepare' first?")
        })?;
        let store: Self = bincode::deserialize_from(BufReader::new(file))
            .with_context(|| format!("Corrupt sample store '{path}'"))?;
        tracing::debug!("Loaded {} samples from '{}'", store.len(), path);
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Split;

    #[test]
    fn test_save_and_load() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/train_samples.bin");
        let path = path.to_str().unwrap();

        let record = Record::new("a.jpg", "is ct present", Some("yes".into()), "img/a.jpg", Split::Train)
            .with_flag("liver", true);
        let store = SampleStore::new(
            vec![Sample { record, text_features: vec![0.25; 6], image_features: None }],
            (3, 2),
        );
        store.save(path).unwrap();

        let loaded = SampleStore::load(path).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.records().next().unwrap().image_name, "a.jpg");
    }

    #[test]
    fn test_missing_store_errors() {
        assert!(SampleStore::load("/nonexistent/samples.bin").is_err());
    }

    #[test]
    fn test_save_under_file_errors() {
        let dir     = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("work");
        fs::write(&blocker, b"x").unwrap();

        let path = blocker.join("train_samples.bin");
        let err  = SampleStore::default().save(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Cannot create"), "{err}");
        assert!(!path.exists());
    }
}
