use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use beatflow_core::consts::{AUTO_BLACK_PERCENTILE, AUTO_WHITE_PERCENTILE};
use beatflow_core::io::{frame_paths, load_image};
use beatflow_core::stats::nan_percentile;

#[derive(Args)]
pub struct InfoArgs {
    /// Folder of grayscale frames (tif/tiff/png)
    pub dir: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let paths = frame_paths(&args.dir)
        .with_context(|| format!("Failed to list {}", args.dir.display()))?;
    let Some(first_path) = paths.first() else {
        anyhow::bail!("No frames found in {}", args.dir.display());
    };
    let first = load_image(first_path)
        .with_context(|| format!("Failed to read {}", first_path.display()))?;

    println!("Folder:      {}", args.dir.display());
    println!("Frames:      {}", paths.len());
    println!("Dimensions:  {}x{}", first.width(), first.height());
    println!("Bit depth:   {}", first.original_bit_depth);

    let black = nan_percentile(first.data.iter().copied(), AUTO_BLACK_PERCENTILE).unwrap_or(0.0);
    let white = nan_percentile(first.data.iter().copied(), AUTO_WHITE_PERCENTILE).unwrap_or(1.0);
    println!("Levels:      {black:.4} .. {white:.4}");

    let frame_bytes = first.width() * first.height() * std::mem::size_of::<f32>();
    let total_mb = (frame_bytes * paths.len()) as f64 / (1024.0 * 1024.0);
    println!("Decoded:     {:.1} MB", total_mb);

    Ok(())
}
