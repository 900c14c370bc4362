// ============================================================
// Layer 6 — Meta Data File
// ============================================================
// The vocabulary is written once as pretty JSON and read by
// both training and inference. Loading re-runs the bijection
// check, so a hand-edited or truncated file fails loudly
// instead of silently shifting answer indices.

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::domain::traits::Persistable;
use crate::domain::vocabulary::Vocabulary;

pub const META_FILE_NAME: &str = "meta_data.json";

impl Persistable for Vocabulary {
    fn save(&self, path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Cannot write meta data to '{path}'"))?;
        tracing::info!("Meta file available at: {}", path);
        Ok(())
    }

    fn load(path: &str) -> Result<Self> {
        let json = fs::read_to_string(path).with_context(|| {
            format!("Cannot read meta data '{path}'. Have you run 'build-meta' first?")
        })?;
        let vocab: Vocabulary = serde_json::from_str(&json)
            .with_context(|| format!("Invalid meta data '{path}'"))?;
        vocab
            .validate()
            .with_context(|| format!("Meta data '{path}' failed its integrity check"))?;
        Ok(vocab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{Record, Split};

    #[test]
    fn test_json_uses_meta_keys() {
        let r = Record::new("a.jpg", "is ct present", Some("ct scan".into()), "a.jpg", Split::Train);
        let vocab = Vocabulary::build(&[r]).unwrap();
        let json: serde_json::Value = serde_json::to_value(&vocab).unwrap();
        for key in ["word_to_ix", "ix_to_word", "ans_to_ix", "ix_to_ans", "img_device_to_ix", "ix_to_img_device"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["ix_to_ans"]["0"], "ct scan");
    }

    #[test]
    fn test_load_rejects_broken_mapping() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join(META_FILE_NAME);
        let r = Record::new("a.jpg", "q", Some("ct scan".into()), "a.jpg", Split::Train);
        let mut vocab = Vocabulary::build(&[r]).unwrap();
        vocab.ans_to_ix.insert("normal".into(), 0);
        vocab.save(path.to_str().unwrap()).unwrap();

        assert!(Vocabulary::load(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_save_under_file_errors() {
        let dir     = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("ckpt");
        fs::write(&blocker, b"x").unwrap();

        let r     = Record::new("a.jpg", "q", Some("ct scan".into()), "a.jpg", Split::Train);
        let vocab = Vocabulary::build(&[r]).unwrap();
        let err   = vocab.save(blocker.join(META_FILE_NAME).to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Cannot create"), "{err}");
    }
}
