// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// A word-level tokenizer whose vocabulary IS the word-vector
// table, so a token id maps straight to an embedding row:
//
//   id 0      → [UNK]   (contributes an all-zero row)
//   id i + 1  → word-vector row i
//
// The tokenizer JSON is written by hand in HuggingFace format
// and loaded back with Tokenizer::from_file. A saved tokenizer
// is reused only if its vocabulary size still matches the
// vector table; otherwise it is rebuilt.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokenizers::Tokenizer;

use crate::infra::word_vectors::WordVectors;

pub const UNK_TOKEN: &str = "[UNK]";
pub const UNK_ID:    u32  = 0;

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self) -> PathBuf {
        self.dir.join("tokenizer.json")
    }

    /// Load the saved tokenizer if it matches `vectors`, else build one
    pub fn load_or_build(&self, vectors: &WordVectors) -> Result<Tokenizer> {
        if self.path().exists() {
            let tokenizer = self.load()?;
            if tokenizer.get_vocab_size(true) == vectors.len() + 1 {
                tracing::info!("Loading existing tokenizer from '{}'", self.path().display());
                return Ok(tokenizer);
            }
            tracing::warn!(
                "Saved tokenizer has {} entries but the vector table has {}; rebuilding",
                tokenizer.get_vocab_size(true),
                vectors.len() + 1
            );
        }
        self.build_and_save(vectors)
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    fn build_and_save(&self, vectors: &WordVectors) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let mut vocab = serde_json::Map::with_capacity(vectors.len() + 1);
        vocab.insert(UNK_TOKEN.to_string(), serde_json::json!(UNK_ID));
        for (row, word) in vectors.words().iter().enumerate() {
            vocab.insert(word.clone(), serde_json::json!(row + 1));
        }

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                {"id": UNK_ID, "content": UNK_TOKEN, "single_word": false, "lstrip": false,
                 "rstrip": false, "normalized": false, "special": true}
            ],
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": {
                "type": "Whitespace"
            },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK_TOKEN
            }
        });

        let path = self.path();
        std::fs::write(&path, serde_json::to_string(&tokenizer_json)?)
            .with_context(|| format!("Cannot write tokenizer JSON to '{}'", path.display()))?;

        tracing::info!(
            "Tokenizer built with {} words, saved to '{}'",
            vectors.len() + 1,
            path.display()
        );

        Tokenizer::from_file(&path).map_err(|e| anyhow::anyhow!("Cannot reload tokenizer: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectors(words: &[&str]) -> WordVectors {
        WordVectors::from_entries(
            words.iter().map(|w| (w.to_string(), vec![1.0, 0.0])).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_ids_follow_vector_rows() {
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path()).load_or_build(&vectors(&["ct", "scan"])).unwrap();
        let enc = tok.encode("CT scan of liver", false).unwrap();
        assert_eq!(enc.get_ids(), &[1, 2, UNK_ID, UNK_ID]);
    }

    #[test]
    fn test_rebuilds_when_table_changes() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        store.load_or_build(&vectors(&["ct"])).unwrap();
        let tok = store.load_or_build(&vectors(&["ct", "mri", "scan"])).unwrap();
        assert_eq!(tok.get_vocab_size(true), 4);
    }
}
