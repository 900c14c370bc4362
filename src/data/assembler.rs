// ============================================================
// Layer 4 — Feature/Label Assembler
// ============================================================
// Stacks per-record features into aligned bundles and builds a
// multi-hot label row per record over the answer vocabulary.
//
// An answer class is "on" for a record when the class's tokens
// occur as a contiguous run of whole tokens in the record's
// answer (case-insensitive, punctuation stripped):
//
//   answer  "ct  of the liver"   classes: "ct", "liver", "brain"
//   label   [   1,     1,     0 ]
//
// Records without an answer (test split) get an all-zero row.

use crate::data::dataset::Sample;
use crate::domain::errors::IntegrityError;
use crate::domain::features::{FeatureBundle, LabelBundle};
use crate::domain::text::{contains_tokens, match_tokens};
use crate::domain::vocabulary::Vocabulary;

/// Stack features only; used for prediction on unlabelled data.
pub fn assemble_features(
    samples:    &[Sample],
    text_shape: (usize, usize),
) -> Result<FeatureBundle, IntegrityError> {
    let text_width = text_shape.0 * text_shape.1;
    let mut image  = Vec::with_capacity(samples.len());
    let mut text   = Vec::with_capacity(samples.len());
    let mut image_width = None;

    for (row, sample) in samples.iter().enumerate() {
        let features = sample.image_features.as_ref().ok_or_else(|| {
            IntegrityError::MissingImageFeatures { image_name: sample.record.image_name.clone() }
        })?;

        let expected = *image_width.get_or_insert(features.len());
        if features.len() != expected {
            return Err(IntegrityError::WidthMismatch {
                bundle: "image",
                row,
                expected,
                actual: features.len(),
            });
        }
        if sample.text_features.len() != text_width {
            return Err(IntegrityError::WidthMismatch {
                bundle:   "text",
                row,
                expected: text_width,
                actual:   sample.text_features.len(),
            });
        }

        image.push(features.clone());
        text.push(sample.text_features.clone());
    }

    Ok(FeatureBundle { image, text, text_shape })
}

/// Multi-hot answer rows, one per sample
pub fn assemble_labels(samples: &[Sample], vocab: &Vocabulary) -> LabelBundle {
    let classes: Vec<Vec<String>> = vocab.answers().map(match_tokens).collect();

    let rows = samples
        .iter()
        .map(|sample| match &sample.record.answer {
            Some(answer) => {
                let tokens = match_tokens(answer);
                classes
                    .iter()
                    .map(|class| u8::from(contains_tokens(&tokens, class)))
                    .collect()
            }
            None => vec![0u8; classes.len()],
        })
        .collect();

    LabelBundle { classes: classes.len(), rows }
}

/// Features and labels for a labelled split; row i of both is sample i.
pub fn assemble(
    samples:    &[Sample],
    vocab:      &Vocabulary,
    text_shape: (usize, usize),
) -> Result<(FeatureBundle, LabelBundle), IntegrityError> {
    let features = assemble_features(samples, text_shape)?;
    let labels   = assemble_labels(samples, vocab);

    for (bundle, actual) in [("image", features.image.len()), ("text", features.text.len()), ("labels", labels.len())] {
        if actual != samples.len() {
            return Err(IntegrityError::RowMismatch { bundle, expected: samples.len(), actual });
        }
    }

    tracing::debug!(
        "Assembled {} rows: image width {}, text {:?}, {} classes",
        samples.len(), features.image_width(), text_shape, labels.classes
    );
    Ok((features, labels))
}
