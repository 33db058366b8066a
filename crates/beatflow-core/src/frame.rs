use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{AUTO_BLACK_PERCENTILE, AUTO_WHITE_PERCENTILE};
use crate::error::{BeatflowError, Result};
use crate::stats::nan_percentile;

/// A single grayscale image frame.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data, row-major, shape = (height, width)
    pub data: Array2<f32>,
    /// Original bit depth before conversion (8 or 16)
    pub original_bit_depth: u8,
}

impl Frame {
    pub fn new(data: Array2<f32>, bit_depth: u8) -> Self {
        Self {
            data,
            original_bit_depth: bit_depth,
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Resample to `(height, width)` with bilinear interpolation on pixel centres.
    pub fn resized(&self, height: usize, width: usize) -> Frame {
        let (h, w) = self.data.dim();
        self.resample(height, width, h as f64 / height as f64, w as f64 / width as f64)
    }

    /// Resample by `factor` on both axes into a `(height, width)` grid.
    ///
    /// Output pixel centres map to `(centre / factor)` in the source, so the
    /// geometry is exact even when the output size had to be rounded.
    pub fn scaled(&self, factor: f64, height: usize, width: usize) -> Frame {
        self.resample(height, width, 1.0 / factor, 1.0 / factor)
    }

    fn resample(&self, height: usize, width: usize, sy: f64, sx: f64) -> Frame {
        let data = Array2::from_shape_fn((height, width), |(row, col)| {
            let src_y = (row as f64 + 0.5) * sy - 0.5;
            let src_x = (col as f64 + 0.5) * sx - 0.5;
            bilinear_sample_clamped(&self.data, src_y, src_x)
        });
        Frame::new(data, self.original_bit_depth)
    }
}

/// Bilinear sample with coordinates clamped to the image border.
fn bilinear_sample_clamped(data: &Array2<f32>, y: f64, x: f64) -> f32 {
    let (h, w) = data.dim();
    let y = y.clamp(0.0, (h - 1) as f64);
    let x = x.clamp(0.0, (w - 1) as f64);

    let y0 = y.floor() as usize;
    let x0 = x.floor() as usize;
    let y1 = (y0 + 1).min(h - 1);
    let x1 = (x0 + 1).min(w - 1);
    let fy = (y - y0 as f64) as f32;
    let fx = (x - x0 as f64) as f32;

    data[[y0, x0]] * (1.0 - fx) * (1.0 - fy)
        + data[[y0, x1]] * fx * (1.0 - fy)
        + data[[y1, x0]] * (1.0 - fx) * fy
        + data[[y1, x1]] * fx * fy
}

/// Acquisition metadata of a frame sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoMeta {
    /// Frames per second, > 0.
    pub fps: f64,
    /// Physical size of one original-resolution pixel.
    pub microns_per_pixel: f64,
    /// Display clipping bounds, black <= white.
    pub black_level: f32,
    pub white_level: f32,
}

impl VideoMeta {
    pub fn new(fps: f64, microns_per_pixel: f64) -> Result<Self> {
        let meta = Self {
            fps,
            microns_per_pixel,
            black_level: 0.0,
            white_level: 1.0,
        };
        meta.validate()?;
        Ok(meta)
    }

    /// Set display levels from the 0.1 / 99.9 percentiles of `frame`.
    pub fn with_auto_levels(mut self, frame: &Frame) -> Self {
        let black = nan_percentile(frame.data.iter().copied(), AUTO_BLACK_PERCENTILE);
        let white = nan_percentile(frame.data.iter().copied(), AUTO_WHITE_PERCENTILE);
        if let (Some(black), Some(white)) = (black, white) {
            self.black_level = black as f32;
            self.white_level = white as f32;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(BeatflowError::InvalidParameters(format!(
                "fps must be > 0, got {}",
                self.fps
            )));
        }
        if !(self.microns_per_pixel.is_finite() && self.microns_per_pixel > 0.0) {
            return Err(BeatflowError::InvalidParameters(format!(
                "microns_per_pixel must be > 0, got {}",
                self.microns_per_pixel
            )));
        }
        if self.black_level > self.white_level {
            return Err(BeatflowError::InvalidParameters(format!(
                "black level {} exceeds white level {}",
                self.black_level, self.white_level
            )));
        }
        Ok(())
    }
}

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Roi {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole `(height, width)` frame.
    pub fn full(height: usize, width: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Scale original-resolution coordinates into analysis resolution.
    pub fn to_analysis(&self, scaling_factor: f64) -> Roi {
        let scale = |v: usize| (v as f64 * scaling_factor).round() as usize;
        Roi::new(
            scale(self.x),
            scale(self.y),
            scale(self.width),
            scale(self.height),
        )
    }

    /// Whether the point lies in the half-open rectangle.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x as f64
            && x < self.x.saturating_add(self.width) as f64
            && y >= self.y as f64
            && y < self.y.saturating_add(self.height) as f64
    }
}

/// Ordered, same-shape frames plus metadata. Read-only for the pipeline.
#[derive(Debug)]
pub struct FrameStack {
    frames: Vec<Frame>,
    meta: VideoMeta,
    scaling_factor: f64,
    busy: AtomicBool,
}

impl FrameStack {
    pub fn new(frames: Vec<Frame>, meta: VideoMeta) -> Result<Self> {
        Self::with_scaling(frames, meta, 1.0)
    }

    fn with_scaling(frames: Vec<Frame>, meta: VideoMeta, scaling_factor: f64) -> Result<Self> {
        meta.validate()?;
        let first = frames.first().ok_or(BeatflowError::EmptySequence)?;
        let expected = first.data.dim();
        if expected.0 == 0 || expected.1 == 0 {
            return Err(BeatflowError::InvalidParameters(
                "frames must not be empty".into(),
            ));
        }
        for (index, frame) in frames.iter().enumerate() {
            let found = frame.data.dim();
            if found != expected {
                return Err(BeatflowError::ShapeMismatch {
                    index,
                    expected,
                    found,
                });
            }
        }
        Ok(Self {
            frames,
            meta,
            scaling_factor,
            busy: AtomicBool::new(false),
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Frame dimensions as (height, width).
    pub fn dim(&self) -> (usize, usize) {
        self.frames[0].data.dim()
    }

    pub fn meta(&self) -> &VideoMeta {
        &self.meta
    }

    /// Analysis-resolution pixels per original-resolution pixel.
    pub fn scaling_factor(&self) -> f64 {
        self.scaling_factor
    }

    /// Downscale so the longest side is at most `max_size`, keeping aspect ratio.
    ///
    /// Returns a copy at the same resolution when the frames already fit.
    pub fn downscaled(&self, max_size: usize) -> Result<FrameStack> {
        if max_size == 0 {
            return Err(BeatflowError::InvalidParameters(
                "max_size must be > 0".into(),
            ));
        }
        let (h, w) = self.dim();
        let longest = h.max(w);
        if longest <= max_size {
            return Self::with_scaling(self.frames.clone(), self.meta.clone(), self.scaling_factor);
        }

        let factor = max_size as f64 / longest as f64;
        let new_h = ((h as f64 * factor).round() as usize).max(1);
        let new_w = ((w as f64 * factor).round() as usize).max(1);
        debug!(from = ?(h, w), to = ?(new_h, new_w), factor, "Downscaling frame stack");

        let frames = self
            .frames
            .iter()
            .map(|f| f.scaled(factor, new_h, new_w))
            .collect();
        Self::with_scaling(frames, self.meta.clone(), self.scaling_factor * factor)
    }

    /// Mark the stack busy; `None` if a task already holds it.
    pub(crate) fn try_lease(stack: &Arc<FrameStack>) -> Option<StackLease> {
        stack
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| StackLease {
                stack: Arc::clone(stack),
            })
    }

    /// Whether an analysis task currently runs on this stack.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Exclusive claim on a stack for one task. Releases the busy flag on drop.
pub(crate) struct StackLease {
    stack: Arc<FrameStack>,
}

impl StackLease {
    pub(crate) fn stack(&self) -> &FrameStack {
        &self.stack
    }
}

impl Drop for StackLease {
    fn drop(&mut self) {
        self.stack.busy.store(false, Ordering::Release);
    }
}
