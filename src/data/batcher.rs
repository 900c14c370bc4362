// ============================================================
// Layer 4 — VQA Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<VqaItem> into
// the three tensors the classifier consumes.
//
//   Input:  N items, each with an image row (W floats), a flat
//           text block (T·D floats) and a multi-hot label (C)
//   Output: images [N, W]   texts [N, T, D]   labels [N, C] (Int)
//
// Every row is already fixed-width, so batching is a flatten
// followed by one reshape per tensor.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::VqaItem;

// ─── VqaBatch ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct VqaBatch<B: Backend> {
    /// Image features — shape: [batch_size, image_width]
    pub images: Tensor<B, 2>,

    /// Word vectors — shape: [batch_size, max_tokens, embedding_dim]
    pub texts: Tensor<B, 3>,

    /// Multi-hot answer targets — shape: [batch_size, classes]
    pub labels: Tensor<B, 2, Int>,
}

// ─── VqaBatcher ───────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct VqaBatcher<B: Backend> {
    pub device:     B::Device,
    /// `(max_tokens, embedding_dim)` used to fold the flat text rows
    pub text_shape: (usize, usize),
}

impl<B: Backend> VqaBatcher<B> {
    pub fn new(device: B::Device, text_shape: (usize, usize)) -> Self {
        Self { device, text_shape }
    }
}

/// Stack equal-width rows into a `[rows, width]` float tensor
pub fn image_tensor<B: Backend>(rows: &[Vec<f32>], device: &B::Device) -> Tensor<B, 2> {
    let width = rows.first().map_or(0, Vec::len);
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Tensor::from_data(TensorData::new(flat, [rows.len(), width]), device)
}

/// Stack flat text rows into a `[rows, max_tokens, embedding_dim]` tensor
pub fn text_tensor<B: Backend>(
    rows:       &[Vec<f32>],
    text_shape: (usize, usize),
    device:     &B::Device,
) -> Tensor<B, 3> {
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Tensor::from_data(
        TensorData::new(flat, [rows.len(), text_shape.0, text_shape.1]),
        device,
    )
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
impl<B: Backend> Batcher<VqaItem, VqaBatch<B>> for VqaBatcher<B> {
    fn batch(&self, items: Vec<VqaItem>) -> VqaBatch<B> {
        let batch_size = items.len();
        let classes    = items.first().map_or(0, |i| i.label.len());

        let image_rows: Vec<Vec<f32>> = items.iter().map(|i| i.image.clone()).collect();
        let text_rows:  Vec<Vec<f32>> = items.iter().map(|i| i.text.clone()).collect();

        let label_flat: Vec<i64> = items
            .iter()
            .flat_map(|i| i.label.iter().map(|&x| x as i64))
            .collect();

        let labels = Tensor::<B, 2, Int>::from_data(
            TensorData::new(label_flat, [batch_size, classes]),
            &self.device,
        );

        VqaBatch {
            images: image_tensor(&image_rows, &self.device),
            texts:  text_tensor(&text_rows, self.text_shape, &self.device),
            labels,
        }
    }
}
