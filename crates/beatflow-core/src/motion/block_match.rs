use std::ops::ControlFlow;

use ndarray::{s, Array4, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cancel::{CancelToken, Outcome};
use crate::consts::{
    DEFAULT_BLOCKWIDTH, DEFAULT_DELAY, DEFAULT_MAX_SHIFT, MAX_BLOCKWIDTH, MIN_BLOCKWIDTH,
    PARALLEL_BLOCK_THRESHOLD,
};
use crate::error::{BeatflowError, Result};
use crate::frame::FrameStack;

use super::field::VectorField;

/// Block matching parameters. Fixed for the duration of one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParameters {
    /// Side length of the square blocks, even, in 2..=128.
    pub blockwidth: usize,
    /// Frames between the two frames of a matched pair, >= 1.
    pub delay: usize,
    /// Search radius in pixels.
    pub max_shift: usize,
}

impl Default for AnalysisParameters {
    fn default() -> Self {
        Self {
            blockwidth: DEFAULT_BLOCKWIDTH,
            delay: DEFAULT_DELAY,
            max_shift: DEFAULT_MAX_SHIFT,
        }
    }
}

impl AnalysisParameters {
    pub fn new(blockwidth: usize, delay: usize, max_shift: usize) -> Result<Self> {
        let params = Self {
            blockwidth,
            delay,
            max_shift,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.blockwidth % 2 != 0
            || !(MIN_BLOCKWIDTH..=MAX_BLOCKWIDTH).contains(&self.blockwidth)
        {
            return Err(BeatflowError::InvalidParameters(format!(
                "blockwidth must be even and within {MIN_BLOCKWIDTH}..={MAX_BLOCKWIDTH}, got {}",
                self.blockwidth
            )));
        }
        if self.delay == 0 {
            return Err(BeatflowError::InvalidParameters(
                "delay must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Validate against a concrete stack: block size and frame count.
    pub fn validate_for(&self, stack: &FrameStack) -> Result<()> {
        self.validate()?;
        let (h, w) = stack.dim();
        if self.blockwidth > h || self.blockwidth > w {
            return Err(BeatflowError::InvalidParameters(format!(
                "blockwidth {} exceeds frame size {w}x{h}",
                self.blockwidth
            )));
        }
        if stack.len() <= self.delay {
            return Err(BeatflowError::InsufficientFrames {
                frames: stack.len(),
                delay: self.delay,
            });
        }
        Ok(())
    }
}

/// Block grid shape `(rows, cols)` for a frame; partial blocks are dropped.
pub fn grid_dim(height: usize, width: usize, blockwidth: usize) -> Result<(usize, usize)> {
    if blockwidth == 0 || blockwidth > height || blockwidth > width {
        return Err(BeatflowError::InvalidParameters(format!(
            "blockwidth {blockwidth} does not fit into {width}x{height} frames"
        )));
    }
    Ok((height / blockwidth, width / blockwidth))
}

/// Estimate one displacement grid per frame pair `(i, i + delay)`.
pub fn estimate(stack: &FrameStack, params: &AnalysisParameters) -> Result<VectorField> {
    match run_pairs(stack, params, |_, _| ControlFlow::Continue(()))? {
        Outcome::Completed(field) => Ok(field),
        Outcome::Cancelled => unreachable!("estimate never requests cancellation"),
    }
}

/// Like [`estimate`], reporting `(pairs_done / pairs)` after every pair and
/// polling `cancel` before each one.
pub fn estimate_with_progress(
    stack: &FrameStack,
    params: &AnalysisParameters,
    mut on_progress: impl FnMut(f32),
    cancel: &CancelToken,
) -> Result<Outcome<VectorField>> {
    if cancel.is_cancelled() {
        return Ok(Outcome::Cancelled);
    }
    run_pairs(stack, params, |done, total| {
        on_progress(done as f32 / total as f32);
        if cancel.is_cancelled() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })
}

fn run_pairs(
    stack: &FrameStack,
    params: &AnalysisParameters,
    mut after_pair: impl FnMut(usize, usize) -> ControlFlow<()>,
) -> Result<Outcome<VectorField>> {
    params.validate_for(stack)?;

    let (h, w) = stack.dim();
    let (rows, cols) = grid_dim(h, w, params.blockwidth)?;
    let pairs = stack.len() - params.delay;
    info!(
        pairs,
        rows,
        cols,
        blockwidth = params.blockwidth,
        delay = params.delay,
        max_shift = params.max_shift,
        "Block matching"
    );

    let frames = stack.frames();
    let mut data = Array4::<f32>::zeros((pairs, 2, rows, cols));

    for i in 0..pairs {
        let reference = frames[i].data.view();
        let target = frames[i + params.delay].data.view();
        let vectors = match_pair(reference, target, rows, cols, params);

        for (idx, (dx, dy)) in vectors.into_iter().enumerate() {
            let (row, col) = (idx / cols, idx % cols);
            data[[i, 0, row, col]] = dx;
            data[[i, 1, row, col]] = dy;
        }
        debug!(pair = i, "Frame pair matched");

        if after_pair(i + 1, pairs).is_break() {
            info!(pairs_done = i + 1, pairs, "Block matching cancelled");
            return Ok(Outcome::Cancelled);
        }
    }

    Ok(Outcome::Completed(VectorField::new(data)))
}

/// Displacements of all blocks of one pair, row-major.
fn match_pair(
    reference: ArrayView2<f32>,
    target: ArrayView2<f32>,
    rows: usize,
    cols: usize,
    params: &AnalysisParameters,
) -> Vec<(f32, f32)> {
    let bw = params.blockwidth;
    let search = |idx: usize| {
        let (row, col) = (idx / cols, idx % cols);
        match_block(reference, target, row * bw, col * bw, bw, params.max_shift)
    };

    if rows * cols >= PARALLEL_BLOCK_THRESHOLD {
        (0..rows * cols).into_par_iter().map(search).collect()
    } else {
        (0..rows * cols).map(search).collect()
    }
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    ssd: f64,
    dx: isize,
    dy: isize,
}

impl Candidate {
    fn magnitude_sq(&self) -> isize {
        self.dx * self.dx + self.dy * self.dy
    }

    /// Lower SSD wins; ties go to the shorter offset, then smaller dx, then smaller dy.
    fn beats(&self, other: &Candidate) -> bool {
        if self.ssd != other.ssd {
            return self.ssd < other.ssd;
        }
        (self.magnitude_sq(), self.dx, self.dy) < (other.magnitude_sq(), other.dx, other.dy)
    }
}

/// Search the best offset of the block at `(y0, x0)` within `max_shift`.
///
/// Offsets that would move the block outside the target are skipped, so the
/// window shrinks near the border. Returns `(dx, dy)`.
pub fn match_block(
    reference: ArrayView2<f32>,
    target: ArrayView2<f32>,
    y0: usize,
    x0: usize,
    blockwidth: usize,
    max_shift: usize,
) -> (f32, f32) {
    let (h, w) = target.dim();
    let block = reference.slice(s![y0..y0 + blockwidth, x0..x0 + blockwidth]);

    let shift = max_shift as isize;
    let dy_range = -shift.min(y0 as isize)..=shift.min((h - blockwidth - y0) as isize);
    let dx_range = -shift.min(x0 as isize)..=shift.min((w - blockwidth - x0) as isize);

    let mut best: Option<Candidate> = None;
    for dy in dy_range {
        for dx in dx_range.clone() {
            let ty = (y0 as isize + dy) as usize;
            let tx = (x0 as isize + dx) as usize;
            let window = target.slice(s![ty..ty + blockwidth, tx..tx + blockwidth]);

            let Some(ssd) = bounded_ssd(block, window, best.map(|b| b.ssd)) else {
                continue;
            };
            let candidate = Candidate { ssd, dx, dy };
            if best.map_or(true, |b| candidate.beats(&b)) {
                best = Some(candidate);
            }
        }
    }

    best.map_or((0.0, 0.0), |b| (b.dx as f32, b.dy as f32))
}

/// Sum of squared differences; `None` once the running sum exceeds `limit`.
fn bounded_ssd(a: ArrayView2<f32>, b: ArrayView2<f32>, limit: Option<f64>) -> Option<f64> {
    let mut sum = 0.0f64;
    for (row_a, row_b) in a.outer_iter().zip(b.outer_iter()) {
        for (&va, &vb) in row_a.iter().zip(row_b.iter()) {
            let d = (va - vb) as f64;
            sum += d * d;
        }
        if limit.is_some_and(|l| sum > l) {
            return None;
        }
    }
    Some(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn tie_prefers_shortest_offset() {
        let flat = Array2::<f32>::from_elem((16, 16), 0.5);
        let v = match_block(flat.view(), flat.view(), 4, 4, 4, 3);
        assert_eq!(v, (0.0, 0.0));
    }

    #[test]
    fn candidate_ordering() {
        let a = Candidate { ssd: 1.0, dx: -1, dy: 0 };
        let b = Candidate { ssd: 1.0, dx: 1, dy: 0 };
        let c = Candidate { ssd: 1.0, dx: 0, dy: 1 };
        assert!(a.beats(&b));
        assert!(a.beats(&c));
        assert!(c.beats(&b));
        assert!(!b.beats(&b));
    }

    #[test]
    fn grid_rejects_unusable_blockwidth() {
        assert!(matches!(
            grid_dim(16, 16, 0),
            Err(BeatflowError::InvalidParameters(_))
        ));
        assert!(matches!(
            grid_dim(8, 64, 16),
            Err(BeatflowError::InvalidParameters(_))
        ));
    }

    #[test]
    fn grid_drops_partial_blocks() {
        assert_eq!(grid_dim(100, 64, 16).unwrap(), (6, 4));
        assert_eq!(grid_dim(16, 17, 16).unwrap(), (1, 1));
    }
}
