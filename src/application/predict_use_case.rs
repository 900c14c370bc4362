// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Scores a prepared sample store with a trained checkpoint:
//
//   Step 1: Load meta data, samples and the model  (Layer 6)
//   Step 2: Class probabilities per record         (Layer 5 - ml)
//   Step 3: Per-record percentile cutoff → answers (Layer 3 - domain)
//   Step 4: Result table → CSV                     (Layer 6 - infra)
//   Step 5: Score against ground truth when known  (Layer 3 - domain)

use anyhow::{ensure, Context, Result};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use crate::application::config::PipelineConfig;
use crate::application::train_use_case::PIPELINE_CONFIG_FILE;
use crate::data::assembler::assemble_features;
use crate::domain::prediction::{decode, evaluate, select_indices, EvaluationSummary};
use crate::domain::traits::{Persistable, VqaClassifier};
use crate::domain::vocabulary::Vocabulary;
use crate::infra::{meta_store::META_FILE_NAME, results::ResultTable, sample_store::SampleStore};
use crate::ml::classifier::BurnVqaClassifier;

/// Probability columns are `p:<answer>` so an answer can never shadow a fixed column
pub const PROBABILITY_PREFIX: &str = "p:";

#[derive(Debug, Clone)]
pub struct PredictConfig {
    pub samples:            String,
    pub checkpoint_dir:     String,
    /// Defaults to the copy saved in the checkpoint directory
    pub meta:               Option<String>,
    pub output:             String,
    /// Overrides `prediction.percentile` from the config
    pub percentile:         Option<f64>,
    /// Add one probability column per answer that was predicted at least once
    pub with_probabilities: bool,
    /// Defaults to the config saved in the checkpoint directory
    pub config_path:        Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictReport {
    pub output:     PathBuf,
    pub rows:       usize,
    pub evaluation: Option<EvaluationSummary>,
}

pub struct PredictUseCase {
    config: PredictConfig,
}

impl PredictUseCase {
    pub fn new(config: PredictConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PredictReport> {
        let cfg  = &self.config;
        let ckpt = Path::new(&cfg.checkpoint_dir);

        // ── Step 1: Load ──────────────────────────────────────────────────────
        let config_path = cfg.config_path.clone().or_else(|| {
            let saved = ckpt.join(PIPELINE_CONFIG_FILE);
            saved.exists().then(|| saved.to_string_lossy().into_owned())
        });
        let pipeline   = PipelineConfig::load(config_path.as_deref())?;
        let percentile = cfg.percentile.unwrap_or(pipeline.prediction.percentile);
        ensure!((0.0..=100.0).contains(&percentile), "percentile must be in [0, 100], got {percentile}");

        let meta_path = cfg
            .meta
            .clone()
            .unwrap_or_else(|| ckpt.join(META_FILE_NAME).to_string_lossy().into_owned());
        let vocab      = Vocabulary::load(&meta_path)?;
        let store      = SampleStore::load(&cfg.samples)?;
        let classifier = BurnVqaClassifier::from_checkpoint(ckpt)?;

        // ── Step 2: Probabilities ─────────────────────────────────────────────
        let features = assemble_features(&store.samples, store.text_shape)?;
        if let Some(model) = classifier.model_config().filter(|_| !features.is_empty()) {
            model
                .check_inputs(features.image_width(), features.text_shape)
                .with_context(|| format!("Samples '{}' don't fit checkpoint '{}'", cfg.samples, cfg.checkpoint_dir))?;
        }
        let probabilities = classifier.predict(&features)?;
        ensure!(
            probabilities.len() == store.len(),
            "model returned {} rows for {} samples", probabilities.len(), store.len()
        );
        ensure!(
            probabilities.iter().all(|row| row.len() == vocab.answer_count()),
            "model output width does not match the {} answers in '{}'",
            vocab.answer_count(), meta_path
        );

        // ── Step 3: Select and decode ─────────────────────────────────────────
        let selected: Vec<Vec<usize>> = probabilities
            .iter()
            .map(|row| select_indices(row, percentile))
            .collect();
        let predictions = selected
            .iter()
            .map(|ix| decode(ix, &vocab))
            .collect::<Result<Vec<_>, _>>()?;

        // ── Step 4: Result table ──────────────────────────────────────────────
        let prob_columns: Vec<usize> = if cfg.with_probabilities {
            selected.iter().flatten().copied().collect::<BTreeSet<_>>().into_iter().collect()
        } else {
            Vec::new()
        };

        let mut columns: Vec<String> = ["path", "image_name", "question", "answer", "prediction"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        for &ix in &prob_columns {
            columns.push(format!("{PROBABILITY_PREFIX}{}", vocab.answer(ix).unwrap_or_default()));
        }

        let mut table = ResultTable::new(columns);
        for ((sample, prediction), probs) in store.samples.iter().zip(&predictions).zip(&probabilities) {
            let r = &sample.record;
            let mut row = vec![
                r.path.display().to_string(),
                r.image_name.clone(),
                r.question.clone(),
                r.answer.clone().unwrap_or_default(),
                prediction.clone(),
            ];
            row.extend(prob_columns.iter().map(|&ix| format!("{:.6}", probs[ix])));
            table.push_row(row)?;
        }

        let table  = table.with_preferred_order();
        let output = PathBuf::from(&cfg.output);
        table.write_csv(&output)?;

        // ── Step 5: Evaluate ──────────────────────────────────────────────────
        let pairs: Vec<(&str, &str)> = store
            .samples
            .iter()
            .zip(&predictions)
            .filter_map(|(s, p)| s.record.answer.as_deref().map(|a| (a, p.as_str())))
            .collect();

        let evaluation = (!pairs.is_empty()).then(|| evaluate(pairs));
        if let Some(e) = &evaluation {
            tracing::info!(
                "Evaluated {} records: exact={:.3} precision={:.3} recall={:.3} f1={:.3}",
                e.records, e.exact_match, e.precision, e.recall, e.f1
            );
        }

        Ok(PredictReport { output, rows: table.len(), evaluation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::tests::trained_fixture;

    fn predict_config(dir: &Path, ckpt: &Path, with_probabilities: bool) -> PredictConfig {
        PredictConfig {
            samples:            dir.join("work/train_samples.bin").to_string_lossy().into_owned(),
            checkpoint_dir:     ckpt.to_string_lossy().into_owned(),
            meta:               None,
            output:             dir.join("out/results.csv").to_string_lossy().into_owned(),
            percentile:         None,
            with_probabilities,
            config_path:        None,
        }
    }

    #[test]
    fn test_predict_writes_ordered_csv() {
        let dir = tempfile::tempdir().unwrap();
        let (ckpt, _) = trained_fixture(dir.path());

        let report = PredictUseCase::new(predict_config(dir.path(), &ckpt, true)).execute().unwrap();
        assert_eq!(report.rows, 3);
        assert_eq!(report.evaluation.as_ref().map(|e| e.records), Some(3));

        let csv    = std::fs::read_to_string(&report.output).unwrap();
        let header = csv.lines().next().unwrap();
        assert!(header.starts_with("image_name,question,answer,prediction,path"));
        assert_eq!(csv.lines().count(), 4);

        // every probability column is prefixed, and no name appears twice
        let names: Vec<&str> = header.split(',').collect();
        let probs: Vec<&&str> = names.iter().skip(5).collect();
        assert!(!probs.is_empty());
        assert!(probs.iter().all(|c| c.starts_with(PROBABILITY_PREFIX)));
        assert_eq!(names.iter().collect::<BTreeSet<_>>().len(), names.len());
    }

    #[test]
    fn test_every_row_gets_a_prediction() {
        let dir = tempfile::tempdir().unwrap();
        let (ckpt, _) = trained_fixture(dir.path());

        let mut cfg = predict_config(dir.path(), &ckpt, false);
        cfg.percentile = Some(0.0);
        let report = PredictUseCase::new(cfg).execute().unwrap();

        // at the 0th percentile every class is selected
        let csv = std::fs::read_to_string(&report.output).unwrap();
        for line in csv.lines().skip(1) {
            assert!(line.contains("brain tumor liver lesion mri"));
        }
    }

    #[test]
    fn test_samples_with_wrong_embedding_width_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (ckpt, _) = trained_fixture(dir.path());

        // same flat width, but 1-dim word vectors instead of the 2-dim ones trained on
        let path      = dir.path().join("work/train_samples.bin");
        let path      = path.to_str().unwrap();
        let mut store = SampleStore::load(path).unwrap();
        store.text_shape = (8, 1);
        store.save(path).unwrap();

        let err = PredictUseCase::new(predict_config(dir.path(), &ckpt, false)).execute().unwrap_err();
        assert!(format!("{err:#}").contains("word vectors"), "{err:#}");
    }
}
