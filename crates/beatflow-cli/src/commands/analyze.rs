use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use beatflow_core::cancel::Outcome;
use beatflow_core::error::BeatflowError;
use beatflow_core::frame::{FrameStack, VideoMeta};
use beatflow_core::io::load_frame_directory;
use beatflow_core::motion::filter::FilterConfig;
use beatflow_core::motion::AnalysisParameters;
use beatflow_core::peaks::{PeakConfig, PeakDetector, PeakMode, PeakStatistics};
use beatflow_core::pipeline::{AnalysisConfig, AnalysisTask};

use crate::export::{write_json, AnalysisExport};
use crate::summary::{print_analysis_summary, print_results};

use super::parse_roi;

#[derive(Clone, Copy, ValueEnum)]
pub enum PeakModeArg {
    Alternating,
    High,
}

impl From<PeakModeArg> for PeakMode {
    fn from(arg: PeakModeArg) -> Self {
        match arg {
            PeakModeArg::Alternating => PeakMode::Alternating,
            PeakModeArg::High => PeakMode::High,
        }
    }
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Folder of grayscale frames (tif/tiff/png), sorted by name
    pub dir: PathBuf,

    /// Recording frame rate
    #[arg(long)]
    pub fps: f64,

    /// Physical pixel size in µm
    #[arg(long, default_value = "1.0")]
    pub microns_per_pixel: f64,

    /// Analysis config file (TOML); replaces the analysis flags below
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Block size in pixels (even, 2-128)
    #[arg(long, default_value = "16")]
    pub blockwidth: usize,

    /// Frames between the two frames of a pair
    #[arg(long, default_value = "2")]
    pub delay: usize,

    /// Search radius in pixels
    #[arg(long, default_value = "7")]
    pub max_shift: usize,

    /// Downscale so the longest side is at most this many pixels
    #[arg(long)]
    pub max_size: Option<usize>,

    /// Region of interest as x,y,width,height in frame pixels
    #[arg(long)]
    pub roi: Option<String>,

    /// Mask isolated single-block motion
    #[arg(long)]
    pub suppress_outliers: bool,

    /// Drop vectors longer than this (µm/s)
    #[arg(long)]
    pub max_length: Option<f32>,

    /// Peak threshold as a fraction of the signal range
    #[arg(long, default_value = "0.05")]
    pub ratio: f64,

    /// Neighbouring samples compared for extrema (even)
    #[arg(long, default_value = "4")]
    pub neighbours: usize,

    /// Peak assignment mode
    #[arg(long, value_enum, default_value = "alternating")]
    pub peak_mode: PeakModeArg,

    /// Skip peak detection
    #[arg(long)]
    pub no_peaks: bool,

    /// Output JSON file
    #[arg(short, long, default_value = "beatflow.json")]
    pub output: PathBuf,
}

pub fn run(args: &AnalyzeArgs) -> Result<()> {
    let config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid analysis config")?
    } else {
        build_config_from_args(args)?
    };

    let frames = load_frame_directory(&args.dir)
        .with_context(|| format!("Failed to load frames from {}", args.dir.display()))?;
    let meta = VideoMeta::new(args.fps, args.microns_per_pixel)?.with_auto_levels(&frames[0]);
    let stack = Arc::new(FrameStack::new(frames, meta)?);

    print_analysis_summary(&args.dir, &stack, &config);

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:20} [{bar:40}] {pos}%")?
            .progress_chars("=> "),
    );

    let handle = AnalysisTask::new(config.clone()).start(Arc::clone(&stack))?;
    for event in handle.events().iter() {
        pb.set_message(event.stage.to_string());
        pb.set_position((event.fraction * 100.0) as u64);
    }
    let Outcome::Completed(mut analysis) = handle.join()? else {
        pb.abandon_with_message("Cancelled");
        bail!("Analysis was cancelled");
    };
    pb.finish_with_message("Done");

    let statistics = peak_statistics(&mut analysis.result.detector)?;
    print_results(&analysis.result, statistics.as_ref());

    let export = AnalysisExport::new(&args.dir, Some(&config), &analysis.result.signal)
        .with_motion(analysis.scaling_factor, analysis.result.display_scale)
        .with_peaks(&analysis.result.detector);
    write_json(&args.output, &export)?;
    println!("\nResults saved to {}", args.output.display());

    Ok(())
}

/// Statistics of detected peaks; `None` when detection was skipped or found
/// too few peaks.
pub fn peak_statistics(detector: &mut PeakDetector) -> Result<Option<PeakStatistics>> {
    if detector.peaks().is_none() {
        return Ok(None);
    }
    match detector.calc_peakstatistics() {
        Ok(stats) => Ok(Some(stats)),
        Err(BeatflowError::NoPeaksDetected) => {
            warn!("Too few peaks for beat statistics");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn build_config_from_args(args: &AnalyzeArgs) -> Result<AnalysisConfig> {
    let roi = args.roi.as_deref().map(parse_roi).transpose()?;
    let peaks = (!args.no_peaks).then(|| PeakConfig {
        ratio: args.ratio,
        neighbours: args.neighbours,
        mode: args.peak_mode.into(),
    });

    Ok(AnalysisConfig {
        max_size: args.max_size,
        parameters: AnalysisParameters::new(args.blockwidth, args.delay, args.max_shift)?,
        roi,
        filter: FilterConfig {
            suppress_outliers: args.suppress_outliers,
            max_length: args.max_length,
            ..FilterConfig::default()
        },
        peaks,
    })
}
