// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to its
// use case in Layer 2. Nothing here computes; it converts args
// into application configs and prints short summaries.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::Commands;

use crate::application::{
    embed_use_case::EmbedUseCase,
    meta_use_case::MetaUseCase,
    predict_use_case::PredictUseCase,
    prepare_use_case::PrepareUseCase,
    train_use_case::TrainUseCase,
};

#[derive(Parser, Debug)]
#[command(
    name = "vqa-med",
    version,
    about = "Medical VQA: image/question features, answer vocabulary, CNN+LSTM training and prediction."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::EmbedImages(args) => {
                let report = EmbedUseCase::new(args.into()).execute()?;
                println!(
                    "Embedded {} images ({} failed) into '{}'",
                    report.images, report.failed, report.output.display()
                );
            }
            Commands::Prepare(args) => {
                let report = PrepareUseCase::new(args.into()).execute()?;
                println!(
                    "Prepared {} of {} rows into '{}'",
                    report.samples, report.loaded, report.output.display()
                );
            }
            Commands::BuildMeta(args) => {
                let vocab = MetaUseCase::new(args.into()).execute()?;
                println!(
                    "Meta data: {} words, {} answers, {} imaging devices",
                    vocab.word_count(), vocab.answer_count(), vocab.ix_to_img_device.len()
                );
            }
            Commands::Train(args) => {
                tracing::info!("Starting training on '{}'", args.train_samples);
                let record = TrainUseCase::new(args.into()).execute()?;
                if let Some(last) = record.history.last() {
                    println!(
                        "Training complete after {} epochs (train_loss={:.4}, val_loss={:.4}). Checkpoint saved.",
                        last.epoch, last.train_loss, last.val_loss
                    );
                }
            }
            Commands::Predict(args) => {
                let report = PredictUseCase::new(args.into()).execute()?;
                println!("Wrote {} predictions to '{}'", report.rows, report.output.display());
                if let Some(e) = report.evaluation {
                    println!(
                        "exact={:.3} precision={:.3} recall={:.3} f1={:.3} over {} records",
                        e.exact_match, e.precision, e.recall, e.f1, e.records
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Split;

    #[test]
    fn test_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "vqa-med", "prepare",
            "--qa-file", "qa.txt", "--images-dir", "imgs",
            "--split", "valid", "--word-vectors", "glove.txt",
            "--config", "p.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Prepare(a) => {
                assert_eq!(a.split, Split::Validation);
                assert_eq!(a.work_dir, "work");
                assert_eq!(a.pipeline.config.as_deref(), Some("p.json"));
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from([
            "vqa-med", "build-meta", "--samples", "a.bin", "b.bin",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::BuildMeta(ref a) if a.samples.len() == 2));

        assert!(Cli::try_parse_from(["vqa-med", "embed-images"]).is_err());
    }
}
