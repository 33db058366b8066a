#![allow(dead_code)]

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::Array2;

use beatflow_core::frame::{Frame, FrameStack, VideoMeta};
use beatflow_core::signal::Signal1D;

/// Deterministic pseudo-random texture value in [0, 1) for any pixel position.
pub fn noise(row: i64, col: i64) -> f32 {
    let mut x = (row as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (col as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    x ^= x >> 33;
    x = x.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    x ^= x >> 33;
    (x >> 40) as f32 / (1u64 << 24) as f32
}

/// Texture frame whose content is moved by `(dx, dy)` pixels.
///
/// Content at `(row, col)` of the unshifted texture appears at
/// `(row + dy, col + dx)`.
pub fn textured_frame(height: usize, width: usize, dx: i64, dy: i64) -> Frame {
    let data = Array2::from_shape_fn((height, width), |(r, c)| {
        noise(r as i64 - dy, c as i64 - dx)
    });
    Frame::new(data, 16)
}

/// `count` texture frames, frame `i` moved by `i * (step_x, step_y)`.
pub fn translating_frames(
    count: usize,
    height: usize,
    width: usize,
    step_x: i64,
    step_y: i64,
) -> Vec<Frame> {
    (0..count as i64)
        .map(|i| textured_frame(height, width, i * step_x, i * step_y))
        .collect()
}

pub fn meta(fps: f64, microns_per_pixel: f64) -> VideoMeta {
    VideoMeta::new(fps, microns_per_pixel).unwrap()
}

pub fn translating_stack(
    count: usize,
    height: usize,
    width: usize,
    step_x: i64,
    step_y: i64,
) -> FrameStack {
    FrameStack::new(
        translating_frames(count, height, width, step_x, step_y),
        meta(10.0, 1.0),
    )
    .unwrap()
}

pub fn static_stack(count: usize, height: usize, width: usize) -> FrameStack {
    translating_stack(count, height, width, 0, 0)
}

pub fn shared(stack: FrameStack) -> Arc<FrameStack> {
    Arc::new(stack)
}

/// `sin(2π t / period)` sampled at `fps`.
pub fn sine_signal(samples: usize, fps: f64, period: f64) -> Signal1D {
    let values = (0..samples)
        .map(|i| (2.0 * PI * (i as f64 / fps) / period).sin())
        .collect();
    Signal1D::from_values(values, fps, "Test Signal [a.u.]").unwrap()
}
