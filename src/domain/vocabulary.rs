// ============================================================
// Layer 3 — Vocabulary ("meta data")
// ============================================================
// Three bidirectional index mappings shared by training,
// validation and inference:
//
//   word   ↔ index   every question/answer word
//   answer ↔ index   every distinct full answer (the classes)
//   device ↔ index   every consolidated imaging device tag
//
// Invariants, checked at build time and again on load:
//   - each mapping is a bijection (no duplicate keys/indices)
//   - indices are dense, 0..len
//   - forward and reverse tables agree
//
// Keys are sorted before indexing, so rebuilding from the same
// records reproduces the same mapping. The mapping is persisted
// next to the model and never recomputed during inference.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::domain::errors::IntegrityError;
use crate::domain::record::Record;
use crate::domain::text::vocabulary_words;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub word_to_ix:       BTreeMap<String, usize>,
    pub ix_to_word:       BTreeMap<usize, String>,
    pub ans_to_ix:        BTreeMap<String, usize>,
    pub ix_to_ans:        BTreeMap<usize, String>,
    pub img_device_to_ix: BTreeMap<String, usize>,
    pub ix_to_img_device: BTreeMap<usize, String>,
}

/// Forward and reverse tables over sorted, deduplicated keys
fn index_keys(keys: BTreeSet<String>) -> (BTreeMap<String, usize>, BTreeMap<usize, String>) {
    let forward = keys.iter().enumerate().map(|(i, k)| (k.clone(), i)).collect();
    let reverse = keys.into_iter().enumerate().collect();
    (forward, reverse)
}

/// Check that a forward/reverse pair forms a dense bijection
fn check_bijection(
    mapping: &'static str,
    forward: &BTreeMap<String, usize>,
    reverse: &BTreeMap<usize, String>,
) -> Result<(), IntegrityError> {
    let mut seen_ix = HashSet::new();
    for (key, &ix) in forward {
        if !seen_ix.insert(ix) {
            return Err(IntegrityError::DuplicateIndex { mapping, index: ix });
        }
        if ix >= forward.len() {
            return Err(IntegrityError::SparseIndex { mapping, index: ix, len: forward.len() });
        }
        if reverse.get(&ix) != Some(key) {
            return Err(IntegrityError::Asymmetric { mapping, key: key.clone() });
        }
    }

    let mut seen_keys = HashSet::new();
    for (&ix, key) in reverse {
        if !seen_keys.insert(key) {
            return Err(IntegrityError::DuplicateKey { mapping, key: key.clone() });
        }
        if ix >= reverse.len() {
            return Err(IntegrityError::SparseIndex { mapping, index: ix, len: reverse.len() });
        }
    }

    if forward.len() != reverse.len() {
        return Err(IntegrityError::RowMismatch {
            bundle:   mapping,
            expected: forward.len(),
            actual:   reverse.len(),
        });
    }
    Ok(())
}

impl Vocabulary {
    /// Build the vocabulary from labelled (train/validation) records
    pub fn build(records: &[Record]) -> Result<Self, IntegrityError> {
        let mut words   = BTreeSet::new();
        let mut answers = BTreeSet::new();
        let mut devices = BTreeSet::new();

        for r in records {
            if !r.split.is_labelled() {
                return Err(IntegrityError::WrongSplit { split: r.split.to_string() });
            }
            words.extend(vocabulary_words(&r.question));
            if let Some(answer) = &r.answer {
                words.extend(vocabulary_words(answer));
                answers.insert(answer.clone());
            }
            if let Some(device) = r.device {
                devices.insert(device.as_str().to_string());
            }
        }

        let (word_to_ix, ix_to_word)             = index_keys(words);
        let (ans_to_ix, ix_to_ans)               = index_keys(answers);
        let (img_device_to_ix, ix_to_img_device) = index_keys(devices);

        let vocab = Self {
            word_to_ix, ix_to_word,
            ans_to_ix, ix_to_ans,
            img_device_to_ix, ix_to_img_device,
        };
        vocab.validate()?;

        tracing::info!(
            "Meta built from {} rows: {} unique words, {} unique answers, {} imaging devices",
            records.len(),
            vocab.word_count(),
            vocab.answer_count(),
            vocab.ix_to_img_device.len(),
        );
        Ok(vocab)
    }

    /// Verify every mapping is a dense bijection
    pub fn validate(&self) -> Result<(), IntegrityError> {
        check_bijection("words",   &self.word_to_ix,       &self.ix_to_word)?;
        check_bijection("answers", &self.ans_to_ix,        &self.ix_to_ans)?;
        check_bijection("devices", &self.img_device_to_ix, &self.ix_to_img_device)?;
        Ok(())
    }

    pub fn word_count(&self) -> usize {
        self.word_to_ix.len()
    }

    /// Number of answer classes the classifier predicts over
    pub fn answer_count(&self) -> usize {
        self.ans_to_ix.len()
    }

    pub fn answer(&self, ix: usize) -> Option<&str> {
        self.ix_to_ans.get(&ix).map(String::as_str)
    }

    pub fn answer_index(&self, answer: &str) -> Option<usize> {
        self.ans_to_ix.get(answer).copied()
    }

    /// Answers in index order
    pub fn answers(&self) -> impl Iterator<Item = &str> {
        self.ix_to_ans.values().map(String::as_str)
    }

    pub fn device_index(&self, device: &str) -> Option<usize> {
        self.img_device_to_ix.get(device).copied()
    }
}
