// ============================================================
// Layer 5 — Frozen CNN Image Encoder
// ============================================================
// Turns one image file into a fixed-width feature row:
//
//   file → decode → resize_exact(W, H) → RGB → /255 → (x−mean)/std
//        → [1, 3, H, W]
//        → ConvBlock₀ … ConvBlock_tap   (conv3×3 → relu → maxpool 2×2)
//        → AdaptiveAvgPool(p × p)
//        → flatten → C_tap · p · p floats
//
// The network is never trained. Weights come from a
// CompactRecorder file when one is given, otherwise from a
// fixed seed, so two runs over the same image agree exactly.

use anyhow::{Context, Result};
use burn::{
    backend::NdArray,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::activation::relu,
};
use image::imageops::FilterType;
use std::path::{Path, PathBuf};

use crate::application::config::ImageSettings;

type EncoderBackend = NdArray;

// ─── Architecture ─────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct ImageEncoderConfig {
    /// Output channels per conv block
    pub channels:  Vec<usize>,
    /// Index of the block whose activations are kept
    pub tap_layer: usize,
    /// Side of the adaptive pooling grid
    pub pool_size: usize,
}

impl ImageEncoderConfig {
    pub fn from_settings(s: &ImageSettings) -> Self {
        Self::new(s.channels.clone(), s.tap_layer, s.pool_size)
    }

    /// Width of one flattened feature row
    pub fn feature_width(&self) -> usize {
        self.channels[self.tap_layer] * self.pool_size * self.pool_size
    }

    /// Only blocks up to the tap layer are built; later ones never
    /// contribute to the output.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ImageEncoder<B> {
        let mut blocks  = Vec::with_capacity(self.tap_layer + 1);
        let mut in_chan = 3;
        for &out_chan in self.channels.iter().take(self.tap_layer + 1) {
            blocks.push(ConvBlock {
                conv: Conv2dConfig::new([in_chan, out_chan], [3, 3])
                    .with_padding(PaddingConfig2d::Same)
                    .init(device),
                pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            });
            in_chan = out_chan;
        }
        ImageEncoder {
            blocks,
            grid: AdaptiveAvgPool2dConfig::new([self.pool_size, self.pool_size]).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pool.forward(relu(self.conv.forward(x)))
    }
}

#[derive(Module, Debug)]
pub struct ImageEncoder<B: Backend> {
    pub blocks: Vec<ConvBlock<B>>,
    pub grid:   AdaptiveAvgPool2d,
}

impl<B: Backend> ImageEncoder<B> {
    /// images: [batch, 3, H, W] → [batch, C_tap · p · p]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for block in &self.blocks {
            x = block.forward(x);
        }
        self.grid.forward(x).flatten::<2>(1, 3)
    }
}

// ─── Frozen encoder ───────────────────────────────────────────────────────────
/// The CNN plus the preprocessing settings it was built for.
pub struct FrozenCnn {
    encoder:  ImageEncoder<EncoderBackend>,
    config:   ImageEncoderConfig,
    settings: ImageSettings,
    device:   <EncoderBackend as Backend>::Device,
}

impl FrozenCnn {
    /// Build the encoder; load `weights` if given, else seed the init.
    pub fn load(settings: &ImageSettings, weights: Option<&Path>) -> Result<Self> {
        settings.validate()?;
        let device = Default::default();
        let config = ImageEncoderConfig::from_settings(settings);

        <EncoderBackend as Backend>::seed(settings.seed);
        let mut encoder: ImageEncoder<EncoderBackend> = config.init(&device);

        match weights {
            Some(path) => {
                let record = CompactRecorder::new()
                    .load(path.to_path_buf(), &device)
                    .with_context(|| format!("Cannot load CNN weights '{}'", path.display()))?;
                encoder = encoder.load_record(record);
                tracing::info!("CNN weights loaded from '{}'", path.display());
            }
            None => tracing::info!("CNN initialised from seed {}", settings.seed),
        }

        Ok(Self { encoder, config, settings: settings.clone(), device })
    }

    /// Persist the current weights so later runs can reuse them
    pub fn save_weights(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        CompactRecorder::new()
            .record(self.encoder.clone().into_record(), path.clone())
            .with_context(|| format!("Cannot save CNN weights to '{}'", path.display()))
    }

    pub fn feature_width(&self) -> usize {
        self.config.feature_width()
    }

    /// Decoded, resized and normalised pixels in CHW order
    pub fn pixels(&self, path: &Path) -> Result<Vec<f32>> {
        let img = image::open(path)
            .with_context(|| format!("Cannot decode image '{}'", path.display()))?;

        let (w, h) = (self.settings.width, self.settings.height);
        let rgb    = img.resize_exact(w, h, FilterType::Triangle).to_rgb8();

        let plane = (w * h) as usize;
        let mut chw = vec![0.0f32; 3 * plane];
        for (i, pixel) in rgb.pixels().enumerate() {
            for c in 0..3 {
                let v = pixel[c] as f32 / 255.0;
                chw[c * plane + i] = (v - self.settings.mean[c]) / self.settings.std[c];
            }
        }
        Ok(chw)
    }

    /// Run one image through the CNN
    pub fn encode_file(&self, path: &Path) -> Result<Vec<f32>> {
        let pixels = self.pixels(path)?;
        let shape  = [1, 3, self.settings.height as usize, self.settings.width as usize];
        let input  = Tensor::<EncoderBackend, 4>::from_data(TensorData::new(pixels, shape), &self.device);

        self.encoder
            .forward(input)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Cannot read CNN output for '{}': {e:?}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ImageSettings {
        ImageSettings {
            width:     16,
            height:    16,
            channels:  vec![4, 6],
            tap_layer: 1,
            pool_size: 2,
            ..ImageSettings::default()
        }
    }

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let img  = image::RgbImage::from_fn(20, 12, |x, y| image::Rgb([(x * 10) as u8, (y * 20) as u8, 128]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_feature_width() {
        let cfg = ImageEncoderConfig::from_settings(&ImageSettings::default());
        assert_eq!(cfg.feature_width(), 128 * 16);
    }

    #[test]
    fn test_pixels_are_resized_and_normalised() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png");
        let cnn  = FrozenCnn::load(&settings(), None).unwrap();

        let px = cnn.pixels(&path).unwrap();
        assert_eq!(px.len(), 3 * 16 * 16);
        // blue channel is constant 128 everywhere
        let blue = (128.0 / 255.0 - 0.406) / 0.225;
        assert!(px[2 * 256..].iter().all(|v| (v - blue).abs() < 1e-5));
    }

    #[test]
    fn test_encoding_is_deterministic_and_fixed_width() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png");
        let cnn  = FrozenCnn::load(&settings(), None).unwrap();

        let a = cnn.encode_file(&path).unwrap();
        let b = cnn.encode_file(&path).unwrap();
        assert_eq!(a.len(), 6 * 2 * 2);
        assert_eq!(a, b);
    }

    #[test]
    fn test_saved_weights_reload() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png");
        let cnn  = FrozenCnn::load(&settings(), None).unwrap();
        cnn.save_weights(dir.path().join("cnn")).unwrap();

        // CompactRecorder stores half precision, so compare two reloads
        let weights = dir.path().join("cnn.mpk");
        let a = FrozenCnn::load(&settings(), Some(&weights)).unwrap();
        let b = FrozenCnn::load(&settings(), Some(&weights)).unwrap();
        assert_eq!(a.encode_file(&path).unwrap(), b.encode_file(&path).unwrap());
        assert_eq!(a.encode_file(&path).unwrap().len(), cnn.feature_width());
    }

    #[test]
    fn test_rejects_image_smaller_than_pooling_stack() {
        // two blocks halve 3px down to zero
        let tiny = ImageSettings { width: 3, height: 16, ..settings() };
        assert!(FrozenCnn::load(&tiny, None).is_err());
        let ok = ImageSettings { width: 4, height: 16, ..settings() };
        assert!(FrozenCnn::load(&ok, None).is_ok());
    }

    #[test]
    fn test_undecodable_file_errors() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        let cnn = FrozenCnn::load(&settings(), None).unwrap();
        assert!(cnn.encode_file(&path).is_err());
    }
}
