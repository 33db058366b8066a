mod common;

use approx::assert_relative_eq;
use ndarray::Array4;

use beatflow_core::error::BeatflowError;
use beatflow_core::motion::{from_units, to_units, UnitScale, VectorField};

fn sample_field() -> VectorField {
    VectorField::new(Array4::from_shape_fn((3, 2, 2, 4), |(p, k, r, c)| {
        (p as f32 - 1.0) * (k as f32 + 1.0) + r as f32 * 0.5 - c as f32
    }))
}

#[test]
fn test_factor_combines_all_terms() {
    let scale = UnitScale::new(0.5, 1.0, 20.0, 2).unwrap();
    assert_relative_eq!(scale.factor(), 5.0);

    let downscaled = UnitScale::new(0.5, 0.5, 20.0, 2).unwrap();
    assert_relative_eq!(downscaled.factor(), 10.0);
}

#[test]
fn test_to_units_scales_pixels() {
    let scale = UnitScale::new(0.5, 1.0, 20.0, 2).unwrap();
    let raw = VectorField::new(Array4::from_elem((1, 2, 1, 1), 2.0));
    let units = to_units(&raw, &scale);
    assert_relative_eq!(units.data[[0, 0, 0, 0]], 10.0);
    assert_relative_eq!(units.data[[0, 1, 0, 0]], 10.0);
}

#[test]
fn test_round_trip_restores_field() {
    let scale = UnitScale::new(0.37, 0.8, 33.3, 3).unwrap();
    let raw = sample_field();
    let back = from_units(&to_units(&raw, &scale), &scale);
    for (&a, &b) in raw.data.iter().zip(back.data.iter()) {
        assert_relative_eq!(a, b, epsilon = 1e-5);
    }
}

#[test]
fn test_nan_stays_nan() {
    let scale = UnitScale::new(1.0, 1.0, 10.0, 1).unwrap();
    let mut raw = sample_field();
    raw.data[[0, 0, 0, 0]] = f32::NAN;
    assert!(to_units(&raw, &scale).data[[0, 0, 0, 0]].is_nan());
}

#[test]
fn test_rejects_invalid_factors() {
    for (mpp, sf, fps, delay) in [
        (0.0, 1.0, 10.0, 1),
        (1.0, -1.0, 10.0, 1),
        (1.0, 1.0, f64::NAN, 1),
        (1.0, 1.0, 10.0, 0),
    ] {
        assert!(matches!(
            UnitScale::new(mpp, sf, fps, delay),
            Err(BeatflowError::InvalidParameters(_))
        ));
    }
}

#[test]
fn test_scale_for_stack_uses_metadata() {
    let stack = common::translating_stack(4, 32, 32, 0, 0);
    let scale = UnitScale::for_stack(&stack, 2).unwrap();
    assert_relative_eq!(scale.factor(), 1.0 * (10.0 / 2.0));
}
