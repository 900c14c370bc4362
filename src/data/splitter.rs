// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Used by `train` when no validation split was prepared:
// shuffles the training samples with a seeded RNG and holds
// out a fraction for early stopping.
//
// The seed makes the split reproducible across runs.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, validation),
/// holding out `val_fraction` of them.
pub fn split_train_val<T>(mut samples: Vec<T>, val_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let held_out = ((total as f64) * val_fraction.clamp(0.0, 1.0)).round() as usize;
    let split_at = total - held_out.min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation ({}% / {}%)",
        samples.len(),
        val.len(),
        (samples.len() * 100) / total.max(1),
        (val.len()     * 100) / total.max(1),
    );

    (samples, val)
}
