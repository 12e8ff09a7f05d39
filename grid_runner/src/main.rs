mod frame_writer;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use color_grid::export::{FileSink, OutputLayout, write_video_script};
use color_grid::pipeline::{CellMetric, DEFAULT_SNAPSHOT_INTERVAL, NeighborTopology};
use color_grid::{ClusterPipeline, RasterFormat, RunReport, SimulationConfig};
use env_logger::Env;
use frame_writer::FrameWriter;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

/// Frames allowed to wait for the encoder before the simulation blocks.
const FRAME_QUEUE_DEPTH: usize = 4;
const PROGRESS_TEMPLATE: &str =
    "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} iterations ({percent}%) [{eta}]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Png,
    Ppm,
}

impl From<OutputFormat> for RasterFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Png => RasterFormat::Png,
            OutputFormat::Ppm => RasterFormat::Ppm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TopologyArg {
    /// Every cell within `--radius` steps along both axes
    Block,
    /// The cell itself and its eight compass neighbors
    Compass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MetricArg {
    Manhattan,
    Euclidean,
}

impl From<MetricArg> for CellMetric {
    fn from(metric: MetricArg) -> Self {
        match metric {
            MetricArg::Manhattan => CellMetric::Manhattan,
            MetricArg::Euclidean => CellMetric::Euclidean,
        }
    }
}

/// Clusters a grid of random colors by repeatedly swapping pixels toward similar ones
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of swap steps to run
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    iterations: u64,

    /// Side length of the square grid in pixels
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    size: u32,

    /// Write a snapshot every 100000 iterations, plus a script to turn them into a video
    #[arg(short, long)]
    movie: bool,

    /// Write a snapshot every N iterations (implies --movie)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    snapshot_interval: Option<u64>,

    /// Colors closer than this (sum of channel differences) count as similar
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
    threshold: u32,

    /// Image format of every written frame
    #[arg(long, value_enum, default_value_t = OutputFormat::Png)]
    format: OutputFormat,

    /// Directory that receives the images
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Seed for the random source; derived from the clock when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Cells a sampled pixel may swap with
    #[arg(long, value_enum, default_value_t = TopologyArg::Block)]
    topology: TopologyArg,

    /// Window radius of the block topology
    #[arg(long, default_value_t = 1)]
    radius: usize,

    /// Distance used to pick the cell closest to the centroid
    #[arg(long, value_enum, default_value_t = MetricArg::Manhattan)]
    metric: MetricArg,
}

impl Args {
    fn snapshot_interval(&self) -> Option<u64> {
        self.snapshot_interval
            .or_else(|| self.movie.then_some(DEFAULT_SNAPSHOT_INTERVAL))
    }

    fn simulation_config(&self) -> SimulationConfig {
        let topology = match self.topology {
            TopologyArg::Block => NeighborTopology::Block {
                radius: self.radius,
            },
            TopologyArg::Compass => NeighborTopology::Compass,
        };
        SimulationConfig {
            size: self.size as usize,
            iterations: self.iterations,
            threshold: self.threshold,
            topology,
            metric: self.metric.into(),
            snapshot_interval: self.snapshot_interval(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // --help and --version are reported through the same path.
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.simulation_config();
    // Nothing touches the output directory until the configuration is known to be good.
    config.validate().context("invalid configuration")?;
    let seed = args.seed.unwrap_or_else(seed_from_clock);
    info!(
        "clustering a {0}x{0} grid over {1} iterations (threshold {2}, {3:?}, {4:?})",
        config.size, config.iterations, config.threshold, config.topology, config.metric
    );
    info!("seed {seed}; pass --seed {seed} to reproduce this run");

    let output_dir = &args.output_dir;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let layout = OutputLayout::new(
        &args.output_dir,
        args.format.into(),
        config.size,
        config.iterations,
    );

    let writer = FrameWriter::spawn(FileSink::new(layout.clone()), FRAME_QUEUE_DEPTH);
    let progress = progress_bar(config.iterations)?;

    let mut sink = writer.sink();
    let bar = progress.clone();
    let snapshots = config.snapshot_interval.is_some();
    let simulation = tokio::task::spawn_blocking(move || {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pipeline = ClusterPipeline::new(config, &mut rng)?;
        pipeline.run_with_progress(&mut rng, &mut sink, |steps| bar.inc(steps))
    });

    let outcome = simulation.await.context("simulation task panicked")?;
    progress.finish_and_clear();
    // Drain the writer even when the run failed so queued snapshots are not lost.
    let written = writer.shutdown().await;
    let report = outcome.context("simulation failed")?;
    let written = written.context("writing the final image")?;

    if snapshots {
        let script = write_video_script(&layout)
            .context("writing the video script")?;
        info!("run {} to assemble the snapshots into a video", script.display());
    }

    summarize(&report);
    info!(
        "{} frame(s) written, {} failed",
        written.written, written.failed
    );
    if let Some(path) = written.final_path {
        info!("final image: {}", path.display());
    }
    Ok(())
}

fn summarize(report: &RunReport) {
    info!(
        "{} swaps in {} iterations ({:.2?})",
        report.swaps, report.iterations, report.elapsed
    );
    info!(
        "mean adjacent color distance {:.2} -> {:.2}",
        report.initial_adjacent_distance, report.final_adjacent_distance
    );
}

fn progress_bar(iterations: u64) -> Result<ProgressBar> {
    let bar = ProgressBar::new(iterations);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .context("invalid progress bar template")?
            .progress_chars("#>-"),
    );
    Ok(bar)
}

fn seed_from_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}
