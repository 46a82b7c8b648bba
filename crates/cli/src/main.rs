//! neuromif CLI
//!
//! Exports trained dense-layer parameters and MNIST test samples as Q4.4
//! memory images for hardware ROM initialisation.
//!
//! # Usage
//!
//! ```bash
//! # Per-layer weights and biases
//! neuromif weights --model mnist_fixed_point.safetensors --out-dir mif/
//!
//! # One random test image
//! neuromif sample --images data/MNIST/raw/t10k-images-idx3-ubyte
//!
//! # Check an exported file
//! neuromif inspect mif/layer_1_weights.mif
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use neuromif_fixed_point::{read_lines, serialize_binary16, RoundingMode};
use neuromif_model::{export_model, export_sample, ExportConfig, SafetensorsLoader, SampleSource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "neuromif")]
#[command(version)]
#[command(about = "Export network parameters and samples as Q4.4 memory images")]
struct Cli {
    /// JSON export config; NEUROMIF_* variables and flags override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Rounding applied to value * 16 (half-away-from-zero, half-to-even, toward-zero)
    #[arg(short, long, global = true)]
    rounding: Option<RoundingMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export every configured layer as <name>_weights.mif / <name>_biases.mif
    Weights {
        /// Trained parameters (safetensors)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Export one MNIST test image
    Sample {
        /// IDX3 image file
        #[arg(long)]
        images: Option<PathBuf>,

        /// IDX1 label file
        #[arg(long)]
        labels: Option<PathBuf>,

        /// Image index (random when omitted)
        #[arg(short, long)]
        index: Option<usize>,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode a memory image and summarise its contents
    Inspect {
        /// File to read
        path: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<ExportConfig> {
    let config = match &cli.config {
        Some(path) => ExportConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ExportConfig::default(),
    };
    let mut config = config.with_env();
    if let Some(mode) = cli.rounding {
        config.rounding = mode;
    }
    Ok(config)
}

fn run_weights(
    mut config: ExportConfig,
    model: Option<PathBuf>,
    out_dir: Option<PathBuf>,
) -> Result<()> {
    if let Some(model) = model {
        config.model_path = model;
    }
    if let Some(out_dir) = out_dir {
        config.out_dir = out_dir;
    }

    let loader = SafetensorsLoader::from_file(&config.model_path)
        .with_context(|| format!("loading parameters from {}", config.model_path.display()))?;
    let exports = export_model(&loader, &config)?;

    for export in &exports {
        println!(
            "{:<12} {:>7} weights  {:>4} biases  {:>5} saturated",
            export.name,
            export.weights.lines,
            export.biases.lines,
            export.clipped()
        );
    }
    Ok(())
}

fn run_sample(
    mut config: ExportConfig,
    images: Option<PathBuf>,
    labels: Option<PathBuf>,
    index: Option<usize>,
    output: Option<PathBuf>,
) -> Result<()> {
    if let Some(images) = images {
        config.images_path = images;
    }
    let explicit_labels = labels.is_some();
    if explicit_labels {
        config.labels_path = labels;
    }
    if let Some(output) = output {
        config.sample_output = output;
    }

    // A missing default label file is not fatal; an explicit one is
    let labels_path = config
        .labels_path
        .as_deref()
        .filter(|p| explicit_labels || p.exists());
    let source = SampleSource::open(&config.images_path, labels_path)
        .with_context(|| format!("reading {}", config.images_path.display()))?;

    let sample = match index {
        Some(i) => source.sample(i)?,
        None => source.random_sample(&mut rand::thread_rng())?,
    };

    let summary = export_sample(&sample, &config.sample_output, config.rounding)?;
    match sample.label {
        Some(label) => println!(
            "Exported image {} (label {}) to {}: {} pixels",
            sample.index,
            label,
            config.sample_output.display(),
            summary.lines
        ),
        None => println!(
            "Exported image {} to {}: {} pixels",
            sample.index,
            config.sample_output.display(),
            summary.lines
        ),
    }
    Ok(())
}

fn run_inspect(path: &Path) -> Result<()> {
    let codes = read_lines(path).with_context(|| format!("reading {}", path.display()))?;

    println!("{}: {} words", path.display(), codes.len());
    let (Some(&min), Some(&max)) = (codes.iter().min(), codes.iter().max()) else {
        return Ok(());
    };

    let saturated = codes.iter().filter(|&&c| c == -128 || c == 127).count();
    let out_of_range = codes.iter().filter(|&&c| !(-128..=127).contains(&c)).count();

    println!("  min: {:>5} ({:+.4})  {}", min, min as f64 / 16.0, serialize_binary16(min));
    println!("  max: {:>5} ({:+.4})  {}", max, max as f64 / 16.0, serialize_binary16(max));
    println!("  saturated: {}", saturated);
    if out_of_range > 0 {
        tracing::warn!(out_of_range, "Words outside the sign-extended Q4.4 range");
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neuromif=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Weights { model, out_dir } => run_weights(config, model, out_dir),
        Commands::Sample {
            images,
            labels,
            index,
            output,
        } => run_sample(config, images, labels, index, output),
        Commands::Inspect { path } => run_inspect(&path),
    }
}
