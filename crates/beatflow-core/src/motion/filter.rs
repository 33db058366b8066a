use ndarray::{s, Array4, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{
    DEFAULT_OUTLIER_MIN_SUPPORT, DISPLAY_SCALE_PERCENTILE, MAX_OUTLIER_MIN_SUPPORT,
};
use crate::error::{BeatflowError, Result};
use crate::frame::Roi;
use crate::signal::Signal1D;
use crate::stats::nan_percentile;

use super::field::{ScalarField, VectorField};

/// Optional filters applied to the unit vector field before aggregation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Mask isolated single-block motion.
    pub suppress_outliers: bool,
    /// Moving 8-neighbours a vector needs to survive outlier suppression.
    pub outlier_min_support: usize,
    /// Drop vectors longer than this (µm/s) before aggregation.
    pub max_length: Option<f32>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            suppress_outliers: false,
            outlier_min_support: DEFAULT_OUTLIER_MIN_SUPPORT,
            max_length: None,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.outlier_min_support > MAX_OUTLIER_MIN_SUPPORT {
            return Err(BeatflowError::InvalidParameters(format!(
                "outlier support must be at most {MAX_OUTLIER_MIN_SUPPORT}, got {}",
                self.outlier_min_support
            )));
        }
        if let Some(max_length) = self.max_length {
            if !(max_length.is_finite() && max_length > 0.0) {
                return Err(BeatflowError::InvalidParameters(format!(
                    "max vector length must be > 0, got {max_length}"
                )));
            }
        }
        Ok(())
    }
}

/// Keep the blocks whose centres fall inside `roi` (analysis-resolution pixels).
pub fn apply_roi(field: &VectorField, roi: &Roi, blockwidth: usize) -> Result<VectorField> {
    let (rows, cols) = field.grid_dim();
    let half = blockwidth as f64 / 2.0;
    let centre = |i: usize| (i * blockwidth) as f64 + half;
    let inside = |v: f64, start: usize, len: usize| {
        v >= start as f64 && v < start.saturating_add(len) as f64
    };

    let selected_rows: Vec<usize> = (0..rows)
        .filter(|&r| inside(centre(r), roi.y, roi.height))
        .collect();
    let selected_cols: Vec<usize> = (0..cols)
        .filter(|&c| inside(centre(c), roi.x, roi.width))
        .collect();

    let (Some(&r0), Some(&c0)) = (selected_rows.first(), selected_cols.first()) else {
        return Err(BeatflowError::EmptyRoi);
    };
    let r1 = r0 + selected_rows.len();
    let c1 = c0 + selected_cols.len();
    debug!(rows = ?(r0..r1), cols = ?(c0..c1), "ROI block selection");

    Ok(VectorField::new(
        field.data.slice(s![.., .., r0..r1, c0..c1]).to_owned(),
    ))
}

/// Mark vectors whose both components are exactly zero as no-data.
pub fn mask_zero_motion(field: &VectorField) -> VectorField {
    map_vectors(field, |x, y| {
        if x == 0.0 && y == 0.0 {
            (f32::NAN, f32::NAN)
        } else {
            (x, y)
        }
    })
}

/// Drop (mark as no-data) every vector longer than `max_length`.
pub fn cutoff_by_length(field: &VectorField, max_length: f32) -> VectorField {
    map_vectors(field, |x, y| {
        if x.hypot(y) > max_length {
            (f32::NAN, f32::NAN)
        } else {
            (x, y)
        }
    })
}

/// Mask isolated motion.
///
/// A finite, non-zero vector is masked when fewer than `min_support` of its
/// 8-neighbours in the same frame carry finite, non-zero motion. Neighbours
/// are read from the input, so the result does not depend on visiting order.
pub fn suppress_outliers(field: &VectorField, min_support: usize) -> VectorField {
    let (pairs, _, rows, cols) = field.data.dim();
    let moving = |p: usize, r: usize, c: usize| {
        let (x, y) = field.vector(p, r, c);
        x.is_finite() && y.is_finite() && (x != 0.0 || y != 0.0)
    };

    let mut out = field.data.clone();
    let mut masked = 0usize;
    for p in 0..pairs {
        for r in 0..rows {
            for c in 0..cols {
                if !moving(p, r, c) {
                    continue;
                }
                let support = neighbours(r, c, rows, cols)
                    .filter(|&(nr, nc)| moving(p, nr, nc))
                    .count();
                if support < min_support {
                    out[[p, 0, r, c]] = f32::NAN;
                    out[[p, 1, r, c]] = f32::NAN;
                    masked += 1;
                }
            }
        }
    }
    debug!(masked, "Isolated vectors suppressed");
    VectorField::new(out)
}

/// In-grid 8-neighbourhood of `(r, c)`.
fn neighbours(
    r: usize,
    c: usize,
    rows: usize,
    cols: usize,
) -> impl Iterator<Item = (usize, usize)> {
    (-1isize..=1)
        .flat_map(|dr| (-1isize..=1).map(move |dc| (dr, dc)))
        .filter(|&(dr, dc)| dr != 0 || dc != 0)
        .map(move |(dr, dc)| (r as isize + dr, c as isize + dc))
        .filter(move |&(nr, nc)| {
            (0..rows as isize).contains(&nr) && (0..cols as isize).contains(&nc)
        })
        .map(|(nr, nc)| (nr as usize, nc as usize))
}

/// Apply the configured filters in order: outliers, then length cutoff.
pub fn apply_filters(field: &VectorField, config: &FilterConfig) -> VectorField {
    let mut filtered = if config.suppress_outliers {
        suppress_outliers(field, config.outlier_min_support)
    } else {
        field.clone()
    };
    if let Some(max_length) = config.max_length {
        filtered = cutoff_by_length(&filtered, max_length);
    }
    filtered
}

/// Display scale: 95th percentile of the magnitudes in the frame with the
/// largest mean motion. `None` when the signal has no data.
pub fn scale_max_motion(magnitudes: &ScalarField, signal: &Signal1D) -> Option<f32> {
    let busiest = signal.argmax()?;
    let frame = magnitudes.frame(busiest);
    nan_percentile(frame.iter().copied(), DISPLAY_SCALE_PERCENTILE).map(|v| v as f32)
}

/// Zero-masked, length-limited copy of `field` for quiver display.
pub fn display_field(field: &VectorField, max_length: Option<f32>) -> VectorField {
    let masked = mask_zero_motion(field);
    match max_length {
        Some(max) => cutoff_by_length(&masked, max),
        None => masked,
    }
}

fn map_vectors(field: &VectorField, f: impl Fn(f32, f32) -> (f32, f32)) -> VectorField {
    let mut out: Array4<f32> = field.data.clone();
    for pair in out.axis_iter_mut(Axis(0)) {
        let (mut xs, mut ys) = pair.split_at(Axis(0), 1);
        for (x, y) in xs.iter_mut().zip(ys.iter_mut()) {
            let (nx, ny) = f(*x, *y);
            *x = nx;
            *y = ny;
        }
    }
    VectorField::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbours_are_clipped_at_corners() {
        assert_eq!(neighbours(0, 0, 3, 3).count(), 3);
        assert_eq!(neighbours(1, 1, 3, 3).count(), 8);
        assert_eq!(neighbours(0, 1, 1, 3).count(), 2);
    }
}
