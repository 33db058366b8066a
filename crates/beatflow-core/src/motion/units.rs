use crate::error::{BeatflowError, Result};
use crate::frame::FrameStack;

use super::field::VectorField;

/// Factors converting pixel displacements per frame pair into µm/s.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitScale {
    pub microns_per_pixel: f64,
    pub scaling_factor: f64,
    pub fps: f64,
    pub delay: usize,
}

impl UnitScale {
    pub fn new(
        microns_per_pixel: f64,
        scaling_factor: f64,
        fps: f64,
        delay: usize,
    ) -> Result<Self> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(BeatflowError::InvalidParameters(format!(
                    "{name} must be a positive number, got {v}"
                )))
            }
        };
        positive("microns_per_pixel", microns_per_pixel)?;
        positive("scaling_factor", scaling_factor)?;
        positive("fps", fps)?;
        if delay == 0 {
            return Err(BeatflowError::InvalidParameters(
                "delay must be at least 1".into(),
            ));
        }
        Ok(Self {
            microns_per_pixel,
            scaling_factor,
            fps,
            delay,
        })
    }

    /// Scale for a stack analysed with the given delay.
    pub fn for_stack(stack: &FrameStack, delay: usize) -> Result<Self> {
        let meta = stack.meta();
        Self::new(meta.microns_per_pixel, stack.scaling_factor(), meta.fps, delay)
    }

    /// Multiplier applied to raw pixel displacements.
    pub fn factor(&self) -> f64 {
        self.microns_per_pixel / self.scaling_factor * (self.fps / self.delay as f64)
    }
}

/// `raw / scaling_factor * microns_per_pixel * (fps / delay)`.
pub fn to_units(raw: &VectorField, scale: &UnitScale) -> VectorField {
    let factor = scale.factor();
    VectorField::new(raw.data.mapv(|v| (v as f64 * factor) as f32))
}

/// Inverse of [`to_units`].
pub fn from_units(units: &VectorField, scale: &UnitScale) -> VectorField {
    let factor = scale.factor();
    VectorField::new(units.data.mapv(|v| (v as f64 / factor) as f32))
}
