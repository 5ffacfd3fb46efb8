//! GreenThumb CLI
//!
//! Dataset management, training, leaf prediction and soil analysis from the
//! command line.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use greenthumb::app::{AppConfig, AppContext, TrainingStatus};
use greenthumb::backend::backend_name;
use greenthumb::dataset::{create_layout, index::is_image_file, DatasetStatus};
use greenthumb::inference::BatchStatus;
use greenthumb::training::TrainingConfig;
use greenthumb::utils::logging::{init_logging, LogConfig};

/// Plant disease classification and soil analysis
#[derive(Parser, Debug)]
#[command(name = "greenthumb")]
#[command(version)]
#[command(about = "Plant disease classification and soil analysis with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Data directory (images live under <data-dir>/raw)
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Models directory (checkpoint, staging area, training history)
    #[arg(long, global = true, default_value = "models")]
    models_dir: PathBuf,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show per-crop, per-severity image counts
    Stats,

    /// Check that the dataset has at least one image
    Validate,

    /// Create the {crop}/{severity} directory layout
    Setup,

    /// Train the classifier on the local dataset
    Train {
        /// Number of training epochs
        #[arg(short, long, default_value = "50")]
        epochs: usize,

        /// Batch size for training
        #[arg(short, long, default_value = "16")]
        batch_size: usize,

        /// Learning rate
        #[arg(short, long, default_value = "0.001")]
        learning_rate: f64,

        /// Fraction of samples held out for validation [0, 1)
        #[arg(long, default_value = "0.2")]
        test_split: f64,

        /// Random seed for the split and augmentation
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Disable data augmentation
        #[arg(long, default_value = "false")]
        no_augment: bool,
    },

    /// Predict crop and severity for an image or a directory of images
    Predict {
        /// Path to input image or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Print JSON instead of a summary
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Delete the saved checkpoint so the untrained model is served
    Reset,

    /// Show model information
    Info,

    /// Estimate soil properties from a soil photo
    Soil {
        /// Path to the soil image
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };

    let _ = init_logging(&log_config);

    let config = AppConfig::with_dirs(&cli.data_dir, &cli.models_dir);

    match cli.command {
        Commands::Stats => cmd_stats(config)?,
        Commands::Validate => cmd_validate(config)?,
        Commands::Setup => cmd_setup(&config)?,
        Commands::Train {
            epochs,
            batch_size,
            learning_rate,
            test_split,
            seed,
            no_augment,
        } => {
            let training = TrainingConfig::new(epochs, batch_size, learning_rate, test_split)
                .with_seed(seed)
                .with_augment(!no_augment);
            cmd_train(config, training).await?;
        }
        Commands::Predict { input, json } => cmd_predict(config, &input, json).await?,
        Commands::Reset => cmd_reset(&config)?,
        Commands::Info => cmd_info(config).await?,
        Commands::Soil { input } => cmd_soil(config, &input)?,
    }

    Ok(())
}

fn cmd_stats(config: AppConfig) -> Result<()> {
    info!("Computing dataset statistics for: {:?}", config.raw_dir);
    let ctx = AppContext::new(config)?;
    let stats = ctx.dataset_stats();

    println!("{}", "Dataset Statistics".cyan().bold());
    println!("  Total images:    {}", stats.total_images);
    println!("  Crops available: {}", stats.crops_available);
    println!();

    if stats.status == DatasetStatus::Empty {
        println!("{} {}", "Note:".yellow(), stats.message.unwrap_or_default());
        println!("Run `greenthumb setup` and add images under {:?}", ctx.config().raw_dir);
        return Ok(());
    }

    for (crop, counts) in &stats.crops {
        if counts.is_empty() {
            continue;
        }
        let total: usize = counts.values().sum();
        println!("  {:<10} {:>6}", crop.green(), total);
        for (level, count) in counts {
            println!("      {:>3}%  {:>6}", level, count);
        }
    }

    Ok(())
}

fn cmd_validate(config: AppConfig) -> Result<()> {
    let ctx = AppContext::new(config)?;
    if ctx.validate_dataset() {
        println!("{} dataset is ready for training", "OK".green().bold());
        Ok(())
    } else {
        bail!("no images found under {:?}", ctx.config().raw_dir)
    }
}

fn cmd_setup(config: &AppConfig) -> Result<()> {
    config.create_dirs()?;
    create_layout(&config.raw_dir)?;
    println!(
        "{} Directory structure created at {:?}",
        "Done:".green(),
        config.raw_dir
    );
    Ok(())
}

async fn cmd_train(config: AppConfig, training: TrainingConfig) -> Result<()> {
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  Epochs:        {}", training.epochs);
    println!("  Batch size:    {}", training.batch_size);
    println!("  Learning rate: {}", training.learning_rate);
    println!("  Test split:    {}", training.test_split);
    println!("  Backend:       {}", backend_name());
    println!();

    let ctx = AppContext::new(config)?;
    let started = ctx.start_training(training).await?;
    info!("Run {} started on {} images", started.run_id, started.train_candidates);

    match ctx.join_training().await {
        TrainingStatus::Completed { summary, .. } => {
            println!();
            println!("{}", "Training complete".green().bold());
            println!("  Epochs run:      {}", summary.epochs_run);
            println!("  Train / val:     {} / {}", summary.train_samples, summary.val_samples);
            println!("  Best val loss:   {:.4}", summary.best_val_loss);
            println!("  Final LR:        {:.6}", summary.final_learning_rate);
            println!("  Checkpoint:      {:?}", summary.checkpoint_path);
            Ok(())
        }
        TrainingStatus::Failed { message, .. } => bail!("training failed: {}", message),
        other => bail!("unexpected training state: {:?}", other),
    }
}

fn collect_images(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.exists() {
        bail!("input path not found: {:?}", input);
    }
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(input)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_image_file(p))
        .collect();
    files.sort();
    Ok(files)
}

async fn cmd_predict(config: AppConfig, input: &Path, json: bool) -> Result<()> {
    let ctx = AppContext::new(config)?;
    let files = collect_images(input)?;

    if files.len() == 1 {
        let analysis = ctx.analyze(&std::fs::read(&files[0])?).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        } else {
            println!("{}", analysis.prediction.display());
            println!();
            println!("{}", "Recommendations:".cyan().bold());
            for rec in &analysis.recommendations {
                println!("  - {}", rec);
            }
        }
        return Ok(());
    }

    let mut uploads = Vec::with_capacity(files.len());
    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        uploads.push((name, std::fs::read(path)?));
    }

    let report = ctx.batch_analyze(uploads).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for item in &report.results {
        match (item.status, &item.prediction, &item.error) {
            (BatchStatus::Success, Some(p), _) => println!(
                "  {} {:<12} {:<34} {:.1}%",
                item.filename.green(),
                p.crop_type.display_name(),
                p.disease_status,
                p.confidence * 100.0
            ),
            (_, _, error) => println!(
                "  {} {}",
                item.filename.red(),
                error.as_deref().unwrap_or("failed")
            ),
        }
    }
    println!();
    println!("{}/{} images analyzed", report.successful, report.total);

    Ok(())
}

fn cmd_reset(config: &AppConfig) -> Result<()> {
    if config.checkpoint_path.exists() {
        std::fs::remove_file(&config.checkpoint_path)?;
        println!("{} removed {:?}", "Reset:".yellow(), config.checkpoint_path);
    } else {
        println!("No checkpoint at {:?}, nothing to reset", config.checkpoint_path);
    }
    Ok(())
}

async fn cmd_info(config: AppConfig) -> Result<()> {
    let ctx = AppContext::new(config)?;
    let info = ctx.model_info().await;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn cmd_soil(config: AppConfig, input: &Path) -> Result<()> {
    let ctx = AppContext::new(config)?;
    let analysis = ctx.analyze_soil(&std::fs::read(input)?)?;

    let report = &analysis.report;
    println!("{}", "Soil Analysis".cyan().bold());
    println!("  pH:          {:.2}", report.ph);
    println!("  Moisture:    {:.1}%", report.moisture);
    println!("  Nitrogen:    {:.1}", report.nitrogen);
    println!("  Phosphorus:  {:.1}", report.phosphorus);
    println!("  Potassium:   {:.1}", report.potassium);
    println!("  Texture:     {}", report.texture);
    println!("  Confidence:  {:.2}", report.confidence);
    println!();
    println!("{} {}", "Suggested crops:".green(), analysis.recommendations.join(", "));
    Ok(())
}
