// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between layers:
//   - RecordSource   → where QA rows come from (a TSV file today)
//   - VqaClassifier  → the trainable model, opaque to the pipeline
//   - Persistable    → artifacts written once and read thereafter
//
// The application layer only talks to these traits, so a
// different model or file format is a new impl, not a rewrite.

use anyhow::Result;

use crate::domain::features::{FeatureBundle, LabelBundle, TrainingRecord};
use crate::domain::record::Record;

// ─── RecordSource ─────────────────────────────────────────────────────────────
/// Any component that can produce raw records
pub trait RecordSource {
    fn load_all(&self) -> Result<Vec<Record>>;
}

// ─── VqaClassifier ────────────────────────────────────────────────────────────
/// A multi-label classifier over the answer vocabulary.
///
/// The pipeline never looks inside: it hands over aligned
/// feature/label bundles and reads back one probability row
/// per record, with one column per answer class.
pub trait VqaClassifier {
    fn fit(
        &mut self,
        features:   &FeatureBundle,
        labels:     &LabelBundle,
        validation: Option<(&FeatureBundle, &LabelBundle)>,
    ) -> Result<TrainingRecord>;

    fn predict(&self, features: &FeatureBundle) -> Result<Vec<Vec<f32>>>;
}

// ─── Persistable ──────────────────────────────────────────────────────────────
/// Any artifact whose state can be saved and restored from disk.
///
/// Implementations:
///   - Vocabulary          → meta JSON
///   - ImageEmbeddingStore → bincode feature table
///   - SampleStore         → bincode processed dataset
pub trait Persistable: Sized {
    fn save(&self, path: &str) -> Result<()>;

    fn load(path: &str) -> Result<Self>;
}
