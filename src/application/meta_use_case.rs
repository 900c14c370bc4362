// ============================================================
// Layer 2 — MetaUseCase
// ============================================================
// Builds the vocabulary ("meta data") from the labelled sample
// stores and writes it as JSON. Test stores are refused: the
// vocabulary only ever sees train and validation rows.

use anyhow::{ensure, Context, Result};

use crate::domain::record::Record;
use crate::domain::traits::Persistable;
use crate::domain::vocabulary::Vocabulary;
use crate::infra::sample_store::SampleStore;

#[derive(Debug, Clone)]
pub struct MetaConfig {
    /// Train and validation sample stores
    pub sample_paths: Vec<String>,
    pub output:       String,
}

pub struct MetaUseCase {
    config: MetaConfig,
}

impl MetaUseCase {
    pub fn new(config: MetaConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Vocabulary> {
        let cfg = &self.config;
        ensure!(!cfg.sample_paths.is_empty(), "build-meta needs at least one sample store");

        let mut records: Vec<Record> = Vec::new();
        for path in &cfg.sample_paths {
            let store = SampleStore::load(path)?;
            records.extend(store.records().cloned());
        }

        let vocab = Vocabulary::build(&records).context("Cannot build meta data")?;
        vocab.save(&cfg.output)?;
        Ok(vocab)
    }
}
