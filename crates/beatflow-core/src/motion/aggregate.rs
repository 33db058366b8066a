use ndarray::{Array2, Array3, Axis, Zip};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::consts::PARALLEL_FRAME_THRESHOLD;
use crate::error::{BeatflowError, Result};
use crate::frame::{Frame, Roi};
use crate::signal::Signal1D;
use crate::stats::{nan_max, nan_mean};

use super::field::{ScalarField, VectorField};

pub const MOTION_DESCRIPTION: &str = "Mean Absolute Motion [µm/s]";
pub const INTENSITY_DESCRIPTION: &str = "Fluorescence Intensity [a.u.]";

/// Time-averaged motion maps over all frame pairs.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeAveragedMotion {
    /// Mean magnitude per block.
    pub total: Array2<f32>,
    /// Mean |x| per block.
    pub x: Array2<f32>,
    /// Mean |y| per block.
    pub y: Array2<f32>,
    /// Joint maximum of the three maps, for display scaling.
    pub max: Option<f32>,
}

/// Euclidean norm of every vector; no-data stays NaN.
pub fn magnitude(field: &VectorField) -> ScalarField {
    let mut out = Array3::<f32>::zeros((field.len(), field.grid_dim().0, field.grid_dim().1));
    Zip::from(&mut out)
        .and(field.x())
        .and(field.y())
        .for_each(|m, &x, &y| *m = x.hypot(y));
    ScalarField::new(out)
}

/// Positions whose magnitude is zero or NaN in every frame.
pub fn static_mask(scalars: &ScalarField) -> Array2<bool> {
    let (rows, cols) = scalars.grid_dim();
    let mut mask = Array2::from_elem((rows, cols), true);
    for frame in scalars.data.axis_iter(Axis(0)) {
        Zip::from(&mut mask).and(frame).for_each(|m, &v| {
            if v.is_finite() && v != 0.0 {
                *m = false;
            }
        });
    }
    mask
}

/// Mean magnitude per frame over moving positions.
///
/// Positions that never move are excluded from every frame; remaining NaN
/// values are ignored. A completely static field yields an all-NaN signal.
pub fn reduce_to_signal(scalars: &ScalarField, fps: f64) -> Result<Signal1D> {
    let mask = static_mask(scalars);
    let moving = mask.iter().filter(|s| !**s).count();
    if moving == 0 {
        warn!("No moving blocks found, motion signal is empty");
    }
    debug!(moving, total = mask.len(), "Static mask computed");

    let frame_mean = |frame: ndarray::ArrayView2<f32>| -> f64 {
        let values = frame
            .iter()
            .zip(mask.iter())
            .filter(|(_, is_static)| !**is_static)
            .map(|(&v, _)| v as f64);
        nan_mean(values).unwrap_or(f64::NAN)
    };

    let values: Vec<f64> = if scalars.len() >= PARALLEL_FRAME_THRESHOLD {
        (0..scalars.len())
            .into_par_iter()
            .map(|i| frame_mean(scalars.frame(i)))
            .collect()
    } else {
        scalars.data.axis_iter(Axis(0)).map(frame_mean).collect()
    };

    Signal1D::from_values(values, fps, MOTION_DESCRIPTION)
}

/// Mean magnitude, mean |x| and mean |y| over time, ignoring NaN.
pub fn time_average(field: &VectorField, scalars: &ScalarField) -> TimeAveragedMotion {
    let mean_over_time = |data: ndarray::ArrayView3<f32>, abs: bool| -> Array2<f32> {
        data.map_axis(Axis(0), |lane| {
            let values = lane.iter().map(|&v| if abs { v.abs() } else { v });
            nan_mean(values).unwrap_or(f32::NAN)
        })
    };

    let total = mean_over_time(scalars.data.view(), false);
    let x = mean_over_time(field.x(), true);
    let y = mean_over_time(field.y(), true);
    let max = nan_max(total.iter().chain(x.iter()).chain(y.iter()).copied());

    TimeAveragedMotion { total, x, y, max }
}

/// Mean intensity per frame inside `roi` (whole frame when `None`).
pub fn intensity_signal(frames: &[Frame], roi: Option<&Roi>, fps: f64) -> Result<Signal1D> {
    let first = frames.first().ok_or(BeatflowError::EmptySequence)?;
    let (h, w) = first.data.dim();
    let roi = roi.copied().unwrap_or_else(|| Roi::full(h, w));
    let fits = roi.x.checked_add(roi.width).is_some_and(|end| end <= w)
        && roi.y.checked_add(roi.height).is_some_and(|end| end <= h);
    if roi.width == 0 || roi.height == 0 || !fits {
        return Err(BeatflowError::InvalidParameters(format!(
            "ROI {roi:?} does not fit into {w}x{h} frames"
        )));
    }

    let values = frames
        .iter()
        .map(|f| {
            let region = f.data.slice(ndarray::s![
                roi.y..roi.y + roi.height,
                roi.x..roi.x + roi.width
            ]);
            region.iter().map(|&v| v as f64).sum::<f64>() / region.len() as f64
        })
        .collect();

    Signal1D::from_values(values, fps, INTENSITY_DESCRIPTION)
}
