// ============================================================
// Layer 4 — Text Feature Extractor
// ============================================================
// Turns a question into a fixed-shape matrix of word vectors:
//
//   "is ct present"  →  [ v(is) | v(ct) | v(present) | 0 | … | 0 ]
//                        └──────── max_tokens rows ──────────┘
//
// Tokens past max_tokens are dropped; unknown tokens ([UNK])
// and padding rows stay all-zero. The output is flattened
// row-major to max_tokens × embedding_dim floats.
//
// Pure: the same text with the same tokenizer and vector table
// always gives bit-identical output.

use anyhow::Result;
use tokenizers::Tokenizer;

use crate::infra::tokenizer_store::UNK_ID;
use crate::infra::word_vectors::WordVectors;

pub struct TextFeatureExtractor {
    tokenizer:  Tokenizer,
    vectors:    WordVectors,
    max_tokens: usize,
}

impl TextFeatureExtractor {
    pub fn new(tokenizer: Tokenizer, vectors: WordVectors, max_tokens: usize) -> Self {
        Self { tokenizer, vectors, max_tokens }
    }

    pub fn embedding_dim(&self) -> usize {
        self.vectors.dim()
    }

    /// `(max_tokens, embedding_dim)`
    pub fn shape(&self) -> (usize, usize) {
        (self.max_tokens, self.vectors.dim())
    }

    pub fn extract(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self.tokenizer.encode(text, false).map_err(|e| {
            tracing::error!("Failed to get embedding for '{}'", text);
            anyhow::anyhow!("Tokenisation failed for '{text}': {e}")
        })?;

        let dim = self.vectors.dim();
        let mut features = vec![0.0f32; self.max_tokens * dim];

        for (j, &id) in encoding.get_ids().iter().take(self.max_tokens).enumerate() {
            if id == UNK_ID {
                continue;
            }
            if let Some(v) = self.vectors.row(id as usize - 1) {
                features[j * dim..(j + 1) * dim].copy_from_slice(v);
            }
        }
        Ok(features)
    }
}
