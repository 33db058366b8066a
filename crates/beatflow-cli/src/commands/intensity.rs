use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use beatflow_core::io::load_frame_directory;
use beatflow_core::motion::aggregate::intensity_signal;
use beatflow_core::peaks::{PeakDetector, PeakMode};

use crate::export::{write_json, AnalysisExport};
use crate::summary::print_peak_results;

use super::analyze::peak_statistics;
use super::parse_roi;

#[derive(Args)]
pub struct IntensityArgs {
    /// Folder of grayscale frames (tif/tiff/png), sorted by name
    pub dir: PathBuf,

    /// Recording frame rate
    #[arg(long)]
    pub fps: f64,

    /// Region of interest as x,y,width,height in frame pixels
    #[arg(long)]
    pub roi: Option<String>,

    /// Peak threshold as a fraction of the signal range
    #[arg(long, default_value = "0.05")]
    pub ratio: f64,

    /// Neighbouring samples compared for extrema (even)
    #[arg(long, default_value = "4")]
    pub neighbours: usize,

    /// Output JSON file
    #[arg(short, long, default_value = "beatflow-intensity.json")]
    pub output: PathBuf,
}

pub fn run(args: &IntensityArgs) -> Result<()> {
    let roi = args.roi.as_deref().map(parse_roi).transpose()?;
    let frames = load_frame_directory(&args.dir)
        .with_context(|| format!("Failed to load frames from {}", args.dir.display()))?;

    let signal = intensity_signal(&frames, roi.as_ref(), args.fps)?;
    let mut detector = PeakDetector::with_mode(PeakMode::High);
    detector.set_data(signal.clone());
    detector
        .detect_peaks(args.ratio, args.neighbours)
        .context("Peak detection failed")?;
    let statistics = peak_statistics(&mut detector)?;

    print_peak_results(&signal, &detector, statistics.as_ref());

    let export = AnalysisExport::new(&args.dir, None, &signal).with_peaks(&detector);
    write_json(&args.output, &export)?;
    println!("\nResults saved to {}", args.output.display());

    Ok(())
}
