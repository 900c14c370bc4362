use anyhow::{ensure, Result};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::domain::features::{FeatureBundle, LabelBundle};
use crate::domain::record::Record;

/// A cleaned record with its cached features.
/// This is the unit stored per split by `prepare`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub record:         Record,
    /// Question word vectors, max_tokens × embedding_dim, row-major
    pub text_features:  Vec<f32>,
    /// None when the image could not be encoded
    pub image_features: Option<Vec<f32>>,
}

/// One training row: both inputs plus the multi-hot target
#[derive(Debug, Clone)]
pub struct VqaItem {
    pub image: Vec<f32>,
    pub text:  Vec<f32>,
    pub label: Vec<u8>,
}

pub struct VqaDataset {
    items: Vec<VqaItem>,
}

impl VqaDataset {
    pub fn new(items: Vec<VqaItem>) -> Self { Self { items } }

    /// Zip aligned bundles back into per-row items
    pub fn from_bundles(features: &FeatureBundle, labels: &LabelBundle) -> Result<Self> {
        ensure!(
            features.len() == labels.len() && features.text.len() == labels.len(),
            "feature rows ({}/{}) and label rows ({}) are not aligned",
            features.image.len(), features.text.len(), labels.len()
        );
        let items = features.image.iter()
            .zip(&features.text)
            .zip(&labels.rows)
            .map(|((image, text), label)| VqaItem {
                image: image.clone(),
                text:  text.clone(),
                label: label.clone(),
            })
            .collect();
        Ok(Self { items })
    }

    pub fn item_count(&self) -> usize { self.items.len() }
}

impl Dataset<VqaItem> for VqaDataset {
    fn get(&self, index: usize) -> Option<VqaItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bundles_rejects_misaligned_rows() {
        let features = FeatureBundle {
            image:      vec![vec![0.0; 2]; 3],
            text:       vec![vec![0.0; 4]; 3],
            text_shape: (2, 2),
        };
        let labels = LabelBundle { classes: 1, rows: vec![vec![1]; 2] };
        assert!(VqaDataset::from_bundles(&features, &labels).is_err());

        let labels = LabelBundle { classes: 1, rows: vec![vec![1]; 3] };
        let ds = VqaDataset::from_bundles(&features, &labels).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.get(2).unwrap().label, vec![1]);
    }
}
