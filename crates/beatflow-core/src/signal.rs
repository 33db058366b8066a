use serde::Serialize;

use crate::error::{BeatflowError, Result};

/// A one-dimensional trace sampled once per frame (pair).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Signal1D {
    /// Seconds, strictly increasing, `time[i] = i / fps`.
    pub time: Vec<f64>,
    /// Sample values; NaN where no data exists.
    pub values: Vec<f64>,
    /// Human-readable quantity, e.g. "Mean Absolute Motion [µm/s]".
    pub description: String,
}

impl Signal1D {
    /// Build a signal with the frame-index time base `i / fps`.
    pub fn from_values(values: Vec<f64>, fps: f64, description: impl Into<String>) -> Result<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(BeatflowError::InvalidParameters(format!(
                "fps must be > 0, got {fps}"
            )));
        }
        let time = (0..values.len()).map(|i| i as f64 / fps).collect();
        Ok(Self {
            time,
            values,
            description: description.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// False when every sample is NaN, e.g. when nothing in the frame moved.
    pub fn has_data(&self) -> bool {
        self.values.iter().any(|v| v.is_finite())
    }

    /// Index of the largest finite sample (earliest on ties).
    pub fn argmax(&self) -> Option<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
                Some((_, b)) if b >= v => best,
                _ => Some((i, v)),
            })
            .map(|(i, _)| i)
    }
}
