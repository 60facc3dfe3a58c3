//! qclassify command-line interface
//!
//! Loads a tabular dataset, runs the configured quantum classifier on it and
//! reports the test accuracy together with the predicted and true labels.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use qclassify::config::{MethodConfig, RunConfig};
use qclassify::machine_learning::core::training_count;
use qclassify::machine_learning::dataset::LabeledDataset;
use qclassify::machine_learning::quantum::{QcnnClassifier, QuantumKernelClassifier, SupportVectorClassifier};

/// Quantum kernel and QCNN classification of tabular data
#[derive(Parser)]
#[command(name = "qclassify")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON run configuration; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the classification method of the configuration
    #[arg(short, long, value_enum)]
    method: Option<Method>,

    /// Log per-iteration progress
    #[arg(short, long)]
    verbose: bool,

    /// Write the report as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Method {
    Kernel,
    Qcnn,
}

#[derive(Serialize)]
struct Output<'a, R: Serialize> {
    method: &'static str,
    report: &'a R,
    true_labels: &'a [f64],
}

fn write_report<R: Serialize>(path: &Path, output: &Output<'_, R>) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), output)?;
    info!(path = %path.display(), "report written");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };
    match cli.method {
        Some(Method::Kernel) if !matches!(config.method, MethodConfig::Kernel { .. }) => {
            config.method = MethodConfig::kernel();
        }
        Some(Method::Qcnn) if !matches!(config.method, MethodConfig::Qcnn { .. }) => {
            config.method = MethodConfig::qcnn();
        }
        _ => {}
    }
    config.validate()?;

    let source = &config.dataset;
    let mut dataset = LabeledDataset::load(&source.name, &source.extension, &source.path, source.rows_to_skip)?;
    if let Some(range) = source.row_range() {
        dataset = dataset.slice(range)?;
    }
    if source.normalize {
        dataset.normalize_min_max();
    }
    info!(
        samples = dataset.len(),
        features = dataset.num_features(),
        method = config.method.name(),
        "dataset ready"
    );

    let embedding = config.embedding.build();
    embedding
        .validate(dataset.num_features(), config.num_qubits)
        .map_err(|e| anyhow!(e))?;

    let split = training_count(dataset.len(), config.training_ratio)?;
    let true_labels = &dataset.labels[split.min(dataset.len())..];

    match &config.method {
        MethodConfig::Kernel { c } => {
            let c = *c;
            let labels = dataset.class_labels()?;
            let classifier = QuantumKernelClassifier::new(embedding, config.num_qubits);
            let report = classifier.run(&dataset.features, &labels, config.training_ratio, |kernel| {
                SupportVectorClassifier::new(kernel).with_c(c)
            })?;

            info!("The score of the kernel: {}", report.accuracy);
            info!("The predictions of the labels: {:?}", report.predictions);
            info!("The true value of the labels: {:?}", true_labels);

            if let Some(path) = &cli.output {
                write_report(path, &Output { method: "kernel", report: &report, true_labels })?;
            }
        }
        MethodConfig::Qcnn { optimizer, error_metric, num_batches } => {
            let labels = dataset.to_signed_labels(source.positive_label);
            let mut classifier = match config.seed {
                Some(seed) => QcnnClassifier::with_rng(embedding, config.num_qubits, &mut StdRng::seed_from_u64(seed))?,
                None => QcnnClassifier::new(embedding, config.num_qubits)?,
            };
            let optimizer = optimizer.build(config.seed);
            let error = error_metric.build();

            let report = match num_batches {
                Some(num_batches) => classifier.run_batched(
                    &dataset.features,
                    &labels,
                    optimizer.as_ref(),
                    error.as_ref(),
                    *num_batches,
                    config.training_ratio,
                )?,
                None => classifier.run(
                    &dataset.features,
                    &labels,
                    optimizer.as_ref(),
                    error.as_ref(),
                    config.training_ratio,
                )?,
            };

            let signed_truth = &labels[split.min(labels.len())..];
            info!("The score of the QCNN: {}", report.accuracy);
            info!("The predictions of the labels: {:?}", report.predictions);
            info!("The true value of the labels: {:?}", signed_truth);
            if !report.invalid_predictions.is_empty() {
                info!("Test samples without a prediction: {:?}", report.invalid_predictions);
            }

            if let Some(path) = &cli.output {
                write_report(path, &Output { method: "qcnn", report: &report, true_labels: signed_truth })?;
            }
        }
    }

    Ok(())
}
