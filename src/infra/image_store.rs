// ============================================================
// Layer 6 — Image Embedding Store
// ============================================================
// Running the CNN over every image is the slowest step of the
// pipeline, so features are computed once per image folder and
// cached in a table keyed by image file name.
//
// An image that fails to decode or encode is kept in the table
// as None: the failure is logged once at build time and every
// consumer simply skips it.
//
// On disk the table is bincode, written next to the images as
// `embedded_images.bin` by default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use crate::domain::traits::Persistable;

pub const DEFAULT_STORE_NAME: &str = "embedded_images.bin";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageEmbeddingStore {
    entries: BTreeMap<String, Option<Vec<f32>>>,
}

impl ImageEmbeddingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode every `.jpg` in `dir` with `encode`.
    /// Failures are logged and stored as None; the build never aborts
    /// on a single bad image.
    pub fn build<F>(dir: &Path, encode: F) -> Result<Self>
    where
        F: Fn(&Path) -> Result<Vec<f32>>,
    {
        let files = list_jpgs(dir)?;
        let total = files.len();
        let mut store = Self::new();

        for (i, path) in files.iter().enumerate() {
            tracing::debug!("embedded {}/{}", i + 1, total);
            let features = match encode(path) {
                Ok(f) => Some(f),
                Err(e) => {
                    tracing::warn!("Failed on embedded {}/{} '{}': {:#}", i + 1, total, path.display(), e);
                    None
                }
            };
            let name = file_name(path);
            store.entries.insert(name, features);
        }

        tracing::info!(
            "Embedded {} images from '{}' ({} failed)",
            store.len(),
            dir.display(),
            store.failed_count()
        );
        Ok(store)
    }

    pub fn insert(&mut self, image_name: impl Into<String>, features: Option<Vec<f32>>) {
        self.entries.insert(image_name.into(), features);
    }

    /// Features for an image; None if unknown or if encoding failed
    pub fn get(&self, image_name: &str) -> Option<&[f32]> {
        self.entries.get(image_name).and_then(|f| f.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.entries.values().filter(|f| f.is_none()).count()
    }
}

impl Persistable for ImageEmbeddingStore {
    fn save(&self, path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        let file = File::create(path).with_context(|| format!("Cannot create '{path}'"))?;
        bincode::serialize_into(BufWriter::new(file), self)
            .with_context(|| format!("Cannot write image store '{path}'"))?;
        tracing::debug!("Saved {} image embeddings to '{}'", self.len(), path);
        Ok(())
    }

    fn load(path: &str) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Cannot open image store '{path}'"))?;
        bincode::deserialize_from(BufReader::new(file))
            .with_context(|| format!("Corrupt image store '{path}'"))
    }
}

/// Sorted `.jpg` files (any case) directly inside `dir`
pub fn list_jpgs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
    {
        let path = entry?.path();
        let is_jpg = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("jpg"));
        if is_jpg {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_are_stored_as_none() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.jpg"), b"x").unwrap();
        fs::write(dir.path().join("bad.JPG"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let store = ImageEmbeddingStore::build(dir.path(), |p| {
            if p.ends_with("bad.JPG") {
                anyhow::bail!("cannot decode")
            }
            Ok(vec![1.0, 2.0])
        })
        .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.failed_count(), 1);
        assert_eq!(store.get("good.jpg"), Some(&[1.0, 2.0][..]));
        assert_eq!(store.get("bad.JPG"), None);
        assert_eq!(store.get("missing.jpg"), None);
    }

    #[test]
    fn test_persists_with_bincode() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_STORE_NAME);
        let mut store = ImageEmbeddingStore::new();
        store.insert("a.jpg", Some(vec![0.5; 4]));
        store.insert("b.jpg", None);
        store.save(path.to_str().unwrap()).unwrap();

        let loaded = ImageEmbeddingStore::load(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn test_save_under_file_errors() {
        let dir     = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("features");
        fs::write(&blocker, b"x").unwrap();

        let path = blocker.join(DEFAULT_STORE_NAME);
        assert!(ImageEmbeddingStore::new().save(path.to_str().unwrap()).is_err());
    }
}
