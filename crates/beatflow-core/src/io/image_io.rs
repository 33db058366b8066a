use std::path::{Path, PathBuf};

use image::DynamicImage;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::info;

use crate::error::{BeatflowError, Result};
use crate::frame::Frame;

const FRAME_EXTENSIONS: &[&str] = &["tif", "tiff", "png"];

/// Load a grayscale image file into a Frame, normalized to [0, 1].
pub fn load_image(path: &Path) -> Result<Frame> {
    let img = image::open(path)?;
    let bit_depth = match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => 8,
        _ => 16,
    };
    let gray = img.to_luma16();
    let (w, h) = gray.dimensions();
    let mut data = Array2::<f32>::zeros((h as usize, w as usize));

    for (col, row, pixel) in gray.enumerate_pixels() {
        data[[row as usize, col as usize]] = pixel.0[0] as f32 / 65535.0;
    }

    Ok(Frame::new(data, bit_depth))
}

/// Image files of a frame folder, sorted by file name.
pub fn frame_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if path.is_file() && is_frame {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Load every frame of a folder in file-name order.
pub fn load_frame_directory(dir: &Path) -> Result<Vec<Frame>> {
    let paths = frame_paths(dir)?;
    if paths.is_empty() {
        return Err(BeatflowError::EmptySequence);
    }
    info!(dir = %dir.display(), frames = paths.len(), "Loading frame folder");
    paths.par_iter().map(|p| load_image(p)).collect()
}
