//! Small NaN-aware reductions shared by the aggregation and peak stages.

use num_traits::Float;
use serde::Serialize;

/// Mean and population standard deviation of a set of samples.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MeanStd {
    pub mean: f64,
    pub std: f64,
}

/// Mean over the finite values of `values`, or `None` if there are none.
pub fn nan_mean<T: Float>(values: impl IntoIterator<Item = T>) -> Option<T> {
    let mut sum = T::zero();
    let mut count = 0usize;
    for v in values {
        if v.is_finite() {
            sum = sum + v;
            count += 1;
        }
    }
    if count == 0 {
        None
    } else {
        T::from(count).map(|n| sum / n)
    }
}

/// Largest finite value, ignoring NaN.
pub fn nan_max<T: Float>(values: impl IntoIterator<Item = T>) -> Option<T> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            Some(m) if m >= v => Some(m),
            _ => Some(v),
        })
}

/// Smallest finite value, ignoring NaN.
pub fn nan_min<T: Float>(values: impl IntoIterator<Item = T>) -> Option<T> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            Some(m) if m <= v => Some(m),
            _ => Some(v),
        })
}

/// Mean and population standard deviation (ddof = 0).
pub fn mean_std(values: &[f64]) -> Option<MeanStd> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Some(MeanStd {
        mean,
        std: var.sqrt(),
    })
}

/// Percentile with linear interpolation between closest ranks, ignoring NaN.
///
/// `p` is in percent (0..=100).
pub fn nan_percentile<T: Float>(values: impl IntoIterator<Item = T>, p: f64) -> Option<f64> {
    let mut finite: Vec<f64> = values
        .into_iter()
        .filter(|v| v.is_finite())
        .filter_map(|v| v.to_f64())
        .collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.total_cmp(b));

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (finite.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(finite[lo] + (finite[hi] - finite[lo]) * frac)
}
