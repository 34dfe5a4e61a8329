//! SARFlood CLI - flood mapping from SAR backscatter time series

mod manifest;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sarflood_algorithms::change::{change_score, clip_to_quantiles, BaselineStack};
use sarflood_algorithms::classification::{multiscale_bimodality_mask, ThresholdMethod};
use sarflood_algorithms::pipeline::{
    ChangeConfig, FloodConfig, FloodPipeline, PipelineInputs, PipelineStage, ProgressReporter,
};
use sarflood_core::io::{read_geotiff, write_geotiff, write_mask_geotiff};
use sarflood_core::Raster;
use sarflood_parallel::ProcessingMode;

use manifest::Manifest;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "sarflood")]
#[command(author, version, about = "Flood mapping from SAR backscatter time series", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map the flood extent from a baseline stack and a flood acquisition
    Detect {
        /// Pre-event acquisitions (dB)
        #[arg(long, num_args = 1.., required_unless_present = "manifest")]
        baseline: Vec<PathBuf>,
        /// Flood acquisition (dB)
        #[arg(long, required_unless_present = "manifest")]
        flood: Option<PathBuf>,
        /// Local incidence angle in degrees
        #[arg(long)]
        incidence: Option<PathBuf>,
        /// Terrain slope in degrees
        #[arg(long)]
        slope: Option<PathBuf>,
        /// TOML acquisition manifest instead of --baseline/--flood
        #[arg(long, conflicts_with_all = ["baseline", "flood"])]
        manifest: Option<PathBuf>,
        /// TOML pipeline configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Thresholding method: otsu, kittler
        #[arg(short, long)]
        method: Option<String>,
        /// Also run adaptive local thresholding
        #[arg(long)]
        local: bool,
        /// Worker threads (0 = all cores, 1 = sequential)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Output directory
        #[arg(short, long, default_value = "flood_output")]
        output: PathBuf,
    },
    /// Compute the change score of a flood acquisition against a baseline
    ChangeScore {
        /// Pre-event acquisitions (dB)
        #[arg(long, num_args = 1.., required = true)]
        baseline: Vec<PathBuf>,
        /// Flood acquisition (dB)
        #[arg(long)]
        flood: PathBuf,
        /// Local incidence angle in degrees
        #[arg(long)]
        incidence: Option<PathBuf>,
        /// Clip the score to its 1% and 99% quantiles
        #[arg(long)]
        clip: bool,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Multi-scale bimodality mask of a change score
    Bimodality {
        /// Change score raster
        input: PathBuf,
        /// TOML pipeline configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Worker threads (0 = all cores, 1 = sequential)
        #[arg(short, long, default_value = "0")]
        workers: usize,
        /// Output mask file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print or save the default pipeline configuration as TOML
    Config {
        /// Write config to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

/// Shows the running pipeline stage on a spinner
struct SpinnerReporter {
    pb: ProgressBar,
}

impl ProgressReporter for SpinnerReporter {
    fn begin_stage(&self, stage: PipelineStage) {
        self.pb.set_message(format!("{}...", stage));
    }
}

fn read_raster(path: &Path) -> Result<Raster<f32>> {
    let pb = spinner(&format!("Reading {}...", path.display()))?;
    let raster: Raster<f32> =
        read_geotiff(path).with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!(path = %path.display(), rows = raster.rows(), cols = raster.cols(), "input");
    Ok(raster)
}

fn read_optional(path: Option<&Path>) -> Result<Option<Raster<f32>>> {
    path.map(read_raster).transpose()
}

fn read_baseline(paths: &[PathBuf], labels: Vec<String>) -> Result<BaselineStack> {
    let layers = paths
        .iter()
        .map(|p| read_raster(p))
        .collect::<Result<Vec<_>>>()?;
    BaselineStack::with_labels(layers, labels).context("Inconsistent baseline stack")
}

fn file_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn load_config(path: Option<&Path>) -> Result<FloodConfig> {
    let config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&contents).with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => FloodConfig::default(),
    };
    Ok(config)
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Commands ───────────────────────────────────────────────────────────

struct DetectArgs {
    baseline: Vec<PathBuf>,
    flood: Option<PathBuf>,
    incidence: Option<PathBuf>,
    slope: Option<PathBuf>,
    manifest: Option<PathBuf>,
    config: Option<PathBuf>,
    method: Option<String>,
    local: bool,
    workers: Option<usize>,
    output: PathBuf,
}

fn detect(args: DetectArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(method) = &args.method {
        config.thresholding.method = method.parse::<ThresholdMethod>()?;
    }
    if args.local {
        config.local.enabled = true;
    }
    let mode = match args.workers {
        Some(workers) => {
            config.local.workers = workers;
            ProcessingMode::from_workers(workers)
        }
        None => ProcessingMode::Parallel,
    };
    let pipeline = FloodPipeline::new(config)
        .context("Invalid configuration")?
        .with_mode(mode);

    let (baseline_paths, labels, flood_path, incidence_path, slope_path) = match &args.manifest {
        Some(manifest_path) => {
            let manifest = Manifest::load(manifest_path)?;
            let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
            let resolved = manifest.resolve(base_dir)?;
            info!(flood_date = %resolved.flood_date, baseline = resolved.baseline.len(), "manifest");
            let (labels, paths): (Vec<_>, Vec<_>) = resolved.baseline.into_iter().unzip();
            (
                paths,
                labels,
                resolved.flood,
                resolved.incidence.or(args.incidence),
                resolved.slope.or(args.slope),
            )
        }
        None => {
            let flood = args.flood.context("--flood is required without --manifest")?;
            let labels = args.baseline.iter().map(|p| file_label(p)).collect();
            (args.baseline, labels, flood, args.incidence, args.slope)
        }
    };

    let inputs = PipelineInputs {
        baseline: read_baseline(&baseline_paths, labels)?,
        flood: read_raster(&flood_path)?,
        incidence: read_optional(incidence_path.as_deref())?,
        slope: read_optional(slope_path.as_deref())?,
    };

    let start = Instant::now();
    let reporter = SpinnerReporter {
        pb: spinner("Starting...")?,
    };
    let result = pipeline.run_reported(&inputs, &reporter);
    reporter.pb.finish_and_clear();
    let output = result.context("Flood mapping failed")?;
    let elapsed = start.elapsed();

    let pb = spinner("Writing output...")?;
    let written = output
        .write_all(&args.output)
        .with_context(|| format!("Failed to write products to {}", args.output.display()))?;
    pb.finish_and_clear();

    match output.threshold {
        Some(t) => println!("Threshold ({}): {:.4}", pipeline.config().thresholding.method, t),
        None => println!("Threshold: undefined (no bimodal population)"),
    }
    println!("Seed pixels: {}", output.seed.count_set());
    println!(
        "Flooded pixels: {} ({:.4} km²)",
        output.flood_mask.count_set(),
        output.flooded_area_m2() / 1e6
    );
    if let Some(local) = &output.local {
        println!("Local flood pixels: {}", local.flood_mask.count_set());
    }
    for path in &written {
        println!("  {}", path.display());
    }
    println!("  Processing time: {:.2?}", elapsed);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Detect {
            baseline,
            flood,
            incidence,
            slope,
            manifest,
            config,
            method,
            local,
            workers,
            output,
        } => detect(DetectArgs {
            baseline,
            flood,
            incidence,
            slope,
            manifest,
            config,
            method,
            local,
            workers,
            output,
        })?,

        Commands::ChangeScore {
            baseline,
            flood,
            incidence,
            clip,
            output,
        } => {
            let labels = baseline.iter().map(|p| file_label(p)).collect();
            let stack = read_baseline(&baseline, labels)?;
            let flood = read_raster(&flood)?;
            let incidence = read_optional(incidence.as_deref())?;

            let start = Instant::now();
            let change = change_score(&stack, &flood, incidence.as_ref())
                .context("Failed to compute change score")?;
            let score = if clip {
                let bounds = ChangeConfig::default();
                clip_to_quantiles(&change.score, bounds.clip_low_quantile, bounds.clip_high_quantile)?
            } else {
                change.score
            };
            let elapsed = start.elapsed();
            write_geotiff(&score, &output, None).context("Failed to write output")?;
            done("Change score", &output, elapsed);
        }

        Commands::Bimodality {
            input,
            config,
            workers,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            let score = read_raster(&input)?;
            let start = Instant::now();
            let result = multiscale_bimodality_mask(
                &score,
                &config.bimodality,
                ProcessingMode::from_workers(workers),
            )
            .context("Failed to compute bimodality mask")?;
            let elapsed = start.elapsed();
            write_mask_geotiff(&result.mask, &output).context("Failed to write output")?;
            if result.fell_back {
                println!("No bimodal tiles found; mask covers every valid pixel");
            }
            println!("Selected pixels: {}", result.mask.count_set());
            done("Bimodality mask", &output, elapsed);
        }

        Commands::Config { output } => {
            let text = toml::to_string_pretty(&FloodConfig::default())?;
            if let Some(path) = output {
                std::fs::write(&path, &text)
                    .with_context(|| format!("Failed to write config to {}", path.display()))?;
                println!("Default config saved to {}", path.display());
            } else {
                print!("{}", text);
            }
        }

        Commands::Info { input } => {
            let raster = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
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
        }
    }

    Ok(())
}
