// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// One subcommand per pipeline stage, in the order they run:
//
//   embed-images → prepare → build-meta → train → predict
//
// Every stage that touches features or the model accepts
// `--config <pipeline.json>`; without it the built-in defaults
// apply.

use clap::{Args, Subcommand};

use crate::application::{
    embed_use_case::EmbedConfig,
    meta_use_case::MetaConfig,
    predict_use_case::PredictConfig,
    prepare_use_case::PrepareConfig,
    train_use_case::TrainConfig,
};
use crate::domain::record::Split;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encode every .jpg in a folder with the frozen CNN
    EmbedImages(EmbedArgs),

    /// Clean, enrich and featurise one QA file into a sample store
    Prepare(PrepareArgs),

    /// Build meta_data.json from train/validation sample stores
    BuildMeta(MetaArgs),

    /// Train the answer classifier
    Train(TrainArgs),

    /// Predict answers for a sample store and write a CSV
    Predict(PredictArgs),
}

/// Shared `--config` flag
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// Pipeline settings JSON; defaults apply to anything it omits
    #[arg(long)]
    pub config: Option<String>,
}

#[derive(Args, Debug)]
pub struct EmbedArgs {
    /// Folder of .jpg images
    #[arg(long)]
    pub images_dir: String,

    /// Output store (default: <images_dir>/embedded_images.bin)
    #[arg(long)]
    pub output: Option<String>,

    /// Pretrained CNN weights (CompactRecorder file)
    #[arg(long)]
    pub cnn_weights: Option<String>,

    /// Save the CNN weights used, for reuse by later runs
    #[arg(long)]
    pub save_weights: Option<String>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

impl From<EmbedArgs> for EmbedConfig {
    fn from(a: EmbedArgs) -> Self {
        EmbedConfig {
            images_dir:   a.images_dir,
            output:       a.output,
            cnn_weights:  a.cnn_weights,
            save_weights: a.save_weights,
            config_path:  a.pipeline.config,
        }
    }
}

#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Tab-separated QA file: id, image, question[, answer]
    #[arg(long)]
    pub qa_file: String,

    /// Folder holding the images named in the QA file
    #[arg(long)]
    pub images_dir: String,

    /// train, validation (or valid) or test
    #[arg(long)]
    pub split: Split,

    /// Word embedding table (GloVe text format)
    #[arg(long)]
    pub word_vectors: String,

    /// Working directory for the tokenizer and sample stores
    #[arg(long, default_value = "work")]
    pub work_dir: String,

    /// Cached image features (default: <images_dir>/embedded_images.bin if present)
    #[arg(long)]
    pub image_store: Option<String>,

    /// CNN weights used when images are encoded on the fly
    #[arg(long)]
    pub cnn_weights: Option<String>,

    /// Output store (default: <work_dir>/<split>_samples.bin)
    #[arg(long)]
    pub output: Option<String>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

impl From<PrepareArgs> for PrepareConfig {
    fn from(a: PrepareArgs) -> Self {
        PrepareConfig {
            qa_file:      a.qa_file,
            images_dir:   a.images_dir,
            split:        a.split,
            word_vectors: a.word_vectors,
            work_dir:     a.work_dir,
            image_store:  a.image_store,
            cnn_weights:  a.cnn_weights,
            output:       a.output,
            config_path:  a.pipeline.config,
        }
    }
}

#[derive(Args, Debug)]
pub struct MetaArgs {
    /// Train and validation sample stores
    #[arg(long = "samples", required = true, num_args = 1..)]
    pub samples: Vec<String>,

    #[arg(long, default_value = "work/meta_data.json")]
    pub output: String,
}

impl From<MetaArgs> for MetaConfig {
    fn from(a: MetaArgs) -> Self {
        MetaConfig { sample_paths: a.samples, output: a.output }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(long, default_value = "work/train_samples.bin")]
    pub train_samples: String,

    /// Validation store; without it a fraction of the training rows is held out
    #[arg(long)]
    pub val_samples: Option<String>,

    #[arg(long, default_value = "work/meta_data.json")]
    pub meta: String,

    /// Directory to save model checkpoints, metrics and meta data
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Overrides training.epochs
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Overrides training.batch_size
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Overrides training.learning_rate
    #[arg(long)]
    pub lr: Option<f64>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            train_samples:  a.train_samples,
            val_samples:    a.val_samples,
            meta:           a.meta,
            checkpoint_dir: a.checkpoint_dir,
            config_path:    a.pipeline.config,
            epochs:         a.epochs,
            batch_size:     a.batch_size,
            learning_rate:  a.lr,
        }
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    #[arg(long, default_value = "work/test_samples.bin")]
    pub samples: String,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Meta data (default: the copy in the checkpoint directory)
    #[arg(long)]
    pub meta: Option<String>,

    #[arg(long, default_value = "predictions.csv")]
    pub output: String,

    /// Per-record percentile cutoff, 0–100
    #[arg(long)]
    pub percentile: Option<f64>,

    /// Add a probability column for every predicted answer
    #[arg(long)]
    pub with_probabilities: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

impl From<PredictArgs> for PredictConfig {
    fn from(a: PredictArgs) -> Self {
        PredictConfig {
            samples:            a.samples,
            checkpoint_dir:     a.checkpoint_dir,
            meta:               a.meta,
            output:             a.output,
            percentile:         a.percentile,
            with_probabilities: a.with_probabilities,
            config_path:        a.pipeline.config,
        }
    }
}
