// ============================================================
// Layer 3 — Percentile Answer Selection and Scoring
// ============================================================
// A classifier emits one probability per answer class. Rather
// than keeping only the arg-max, every class whose probability
// reaches the record's OWN percentile cutoff is kept, so the
// number of predicted answers varies per record.
//
// The percentile uses linear interpolation between the two
// closest ranks (the numpy default):
//   rank   = p/100 · (n − 1)
//   cutoff = v[⌊rank⌋] + (v[⌈rank⌉] − v[⌊rank⌋]) · frac(rank)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::errors::IntegrityError;
use crate::domain::text::match_tokens;
use crate::domain::vocabulary::Vocabulary;

/// `q`-th percentile of `values`, or None for an empty slice
pub fn percentile(values: &[f32], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = values.iter().map(|&v| v as f64).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo   = rank.floor() as usize;
    let hi   = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}

/// Indices whose probability meets or exceeds this record's cutoff
pub fn select_indices(probabilities: &[f32], q: f64) -> Vec<usize> {
    let Some(cutoff) = percentile(probabilities, q) else {
        return Vec::new();
    };
    probabilities
        .iter()
        .enumerate()
        .filter(|&(_, &p)| p as f64 >= cutoff)
        .map(|(i, _)| i)
        .collect()
}

/// Decode selected class indices to one space-separated answer string
pub fn decode(indices: &[usize], vocab: &Vocabulary) -> Result<String, IntegrityError> {
    let answers = indices
        .iter()
        .map(|&ix| {
            vocab.answer(ix).ok_or(IntegrityError::SparseIndex {
                mapping: "answers",
                index:   ix,
                len:     vocab.answer_count(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(answers.join(" "))
}

// ─── Evaluation ───────────────────────────────────────────────────────────────

/// Word-overlap scores over every record that has a ground truth answer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub records:     usize,
    pub exact_match: f64,
    pub precision:   f64,
    pub recall:      f64,
    pub f1:          f64,
}

/// Micro-averaged bag-of-words precision/recall/F1 plus exact match.
/// Pairs are `(ground_truth, prediction)`.
pub fn evaluate<'a, I>(pairs: I) -> EvaluationSummary
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut records    = 0usize;
    let mut exact      = 0usize;
    let mut overlap    = 0usize;
    let mut pred_total = 0usize;
    let mut true_total = 0usize;

    for (truth, prediction) in pairs {
        let truth_tokens = match_tokens(truth);
        let pred_tokens  = match_tokens(prediction);
        records += 1;
        if truth_tokens == pred_tokens {
            exact += 1;
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for t in &truth_tokens {
            *counts.entry(t.as_str()).or_insert(0) += 1;
        }
        for p in &pred_tokens {
            if let Some(c) = counts.get_mut(p.as_str()) {
                if *c > 0 {
                    *c -= 1;
                    overlap += 1;
                }
            }
        }
        pred_total += pred_tokens.len();
        true_total += truth_tokens.len();
    }

    let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };
    let precision = ratio(overlap, pred_total);
    let recall    = ratio(overlap, true_total);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    EvaluationSummary {
        records,
        exact_match: ratio(exact, records),
        precision,
        recall,
        f1,
    }
}
