//! MapCover CLI - Land-cover classification for scanned historical maps

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use mapcover_classify::{
    classify, extract_samples, split_train_test, BandStack, ClassifyParams, ConfusionMatrix,
    ModelBundle, TrainingConfig,
};
use mapcover_core::io::{read_geotiff, write_geotiff};
use mapcover_core::Raster;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "mapcover")]
#[command(author, version, about = "Land-cover classification for historical maps", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a classifier from labelled pixels
    Train {
        /// Input band rasters, one single-band file per feature
        #[arg(required = true)]
        bands: Vec<PathBuf>,
        /// Label raster (u8, 0 = background, aligned with the bands)
        #[arg(short, long)]
        labels: PathBuf,
        /// Output model file
        #[arg(short, long)]
        output: PathBuf,
        /// Number of cross-validation folds
        #[arg(long, default_value = "5")]
        folds: usize,
        /// Comma-separated regularization grid; default 10^-8..10^7
        #[arg(long)]
        tau: Option<String>,
        /// Skip the per-feature scaling transform
        #[arg(long)]
        no_scale: bool,
        /// Hold out this fraction per class and print a confusion matrix
        #[arg(long)]
        holdout: Option<f64>,
    },
    /// Classify a band stack with a trained model
    Classify {
        /// Input band rasters, one single-band file per feature
        #[arg(required = true)]
        bands: Vec<PathBuf>,
        /// Trained model file
        #[arg(short, long)]
        model: PathBuf,
        /// Optional inclusion mask (u8, 0 = skip)
        #[arg(long)]
        mask: Option<PathBuf>,
        /// Output class raster
        #[arg(short, long)]
        output: PathBuf,
        /// Square block edge length
        #[arg(long, default_value = "256")]
        block_size: usize,
        /// Disable parallel block processing
        #[arg(long)]
        sequential: bool,
        /// NoData value reserved for future multi-band outputs
        #[arg(long, default_value = "-10000")]
        nodata: f64,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_bands(paths: &[PathBuf]) -> Result<Vec<Raster<f64>>> {
    let pb = spinner("Reading bands...");
    let mut bands = Vec::with_capacity(paths.len());
    for path in paths {
        let band: Raster<f64> = read_geotiff(path)
            .with_context(|| format!("Failed to read band: {}", path.display()))?;
        bands.push(band);
    }
    pb.finish_and_clear();
    let (rows, cols) = bands[0].shape();
    info!("Input: {} x {} pixels, {} bands", cols, rows, bands.len());
    Ok(bands)
}

fn read_u8(path: &PathBuf, what: &str) -> Result<Raster<u8>> {
    let raster: Raster<u8> = read_geotiff(path)
        .with_context(|| format!("Failed to read {}: {}", what, path.display()))?;
    Ok(raster)
}

fn write_classes(raster: &Raster<u8>, path: &PathBuf) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path).context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn parse_tau_grid(s: &str) -> Result<Vec<f64>> {
    s.split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .with_context(|| format!("Invalid tau value: {}", v))
        })
        .collect()
}

fn done(name: &str, path: &PathBuf, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Commands ───────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn cmd_train(
    bands: Vec<PathBuf>,
    labels: PathBuf,
    output: PathBuf,
    folds: usize,
    tau: Option<String>,
    no_scale: bool,
    holdout: Option<f64>,
) -> Result<()> {
    let band_rasters = read_bands(&bands)?;
    let refs: Vec<&Raster<f64>> = band_rasters.iter().collect();
    let stack = BandStack::new(refs).context("Band extents differ")?;
    let label_raster = read_u8(&labels, "label raster")?;

    let (x, y) = extract_samples(&stack, &label_raster)
        .context("Label raster does not match the band stack")?;
    info!("Extracted {} labelled samples", y.len());

    let mut config = TrainingConfig {
        folds,
        scale: !no_scale,
        ..TrainingConfig::default()
    };
    if let Some(grid) = tau {
        config.tau_grid = parse_tau_grid(&grid)?;
    }

    // Optional held-out split for an honest confusion matrix
    let (x_train, y_train, held_out) = match holdout {
        Some(fraction) => {
            let (xt, yt, xh, yh) = split_train_test(&x, &y, 1.0 - fraction)
                .context("Invalid holdout fraction")?;
            (xt, yt, Some((xh, yh)))
        }
        None => (x, y, None),
    };

    let start = Instant::now();
    let pb = spinner("Training...");
    let outcome =
        mapcover_classify::train(&x_train.view(), &y_train, &config).context("Training failed")?;
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    if let Some(report) = &outcome.report {
        println!("Cross-validation ({} folds):", folds);
        for (tau, acc) in report.tau_grid.iter().zip(report.accuracy.iter()) {
            println!("  tau = {:>10.2e}  accuracy = {:.2}%", tau, acc);
        }
        println!("Selected tau: {:.2e}", report.best_tau);
    }

    if let Some((x_held, y_held)) = held_out {
        let scaling = outcome.bundle.scaling()?;
        let model = outcome.bundle.classifier()?;
        let scaled = scaling.apply(&x_held.view())?;
        let predicted = model.predict(&scaled.view(), None)?;
        let cm = ConfusionMatrix::compute(
            predicted.as_slice().context("prediction buffer")?,
            &y_held,
        )?;
        println!("\nHeld-out assessment ({} samples):", y_held.len());
        println!("{}", cm);
    }

    outcome
        .bundle
        .save(&output)
        .with_context(|| format!("Failed to write model: {}", output.display()))?;
    done("Model", &output, elapsed);
    Ok(())
}

fn cmd_classify(
    bands: Vec<PathBuf>,
    model: PathBuf,
    mask: Option<PathBuf>,
    output: PathBuf,
    block_size: usize,
    sequential: bool,
) -> Result<()> {
    // Open and validate everything before any output exists
    let bundle = ModelBundle::load(&model)
        .with_context(|| format!("Failed to load model: {}", model.display()))?;
    let band_rasters = read_bands(&bands)?;
    let refs: Vec<&Raster<f64>> = band_rasters.iter().collect();
    let stack = BandStack::new(refs).context("Band extents differ")?;
    let mask_raster = match &mask {
        Some(path) => Some(read_u8(path, "mask")?),
        None => None,
    };

    let params = ClassifyParams {
        block_size: Some(block_size),
        parallel: !sequential,
    };

    let start = Instant::now();
    let pb = spinner("Classifying...");
    let result = classify(&stack, &bundle, mask_raster.as_ref(), &params)
        .context("Classification failed")?;
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    write_classes(&result, &output)?;
    done("Classification", &output, elapsed);
    Ok(())
}

fn cmd_info(input: PathBuf) -> Result<()> {
    let raster: Raster<f64> = read_geotiff(&input)
        .with_context(|| format!("Failed to read raster: {}", input.display()))?;
    let (rows, cols) = raster.shape();
    let bounds = raster.transform().bounds(cols, rows);
    let stats = raster.statistics();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Cell size: {}", raster.transform().cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(crs) = raster.crs() {
        println!("CRS: {}", crs);
    }
    if let Some(nodata) = raster.nodata() {
        println!("NoData: {}", nodata);
    }
    println!("\nStatistics:");
    if let Some(min) = stats.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = stats.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = stats.mean {
        println!("  Mean: {:.4}", mean);
    }
    println!(
        "  Valid cells: {} ({:.1}%)",
        stats.valid_count,
        100.0 * stats.valid_count as f64 / raster.len() as f64
    );
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Train {
            bands,
            labels,
            output,
            folds,
            tau,
            no_scale,
            holdout,
        } => cmd_train(bands, labels, output, folds, tau, no_scale, holdout),

        Commands::Classify {
            bands,
            model,
            mask,
            output,
            block_size,
            sequential,
            nodata: _,
        } => cmd_classify(bands, model, mask, output, block_size, sequential),

        Commands::Info { input } => cmd_info(input),
    }
}
