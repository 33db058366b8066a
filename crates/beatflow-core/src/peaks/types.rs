use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_PEAK_NEIGHBOURS, DEFAULT_PEAK_RATIO};
use crate::error::{BeatflowError, Result};
use crate::stats::MeanStd;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakKind {
    High,
    Low,
}

/// A detected extremum of a [`crate::signal::Signal1D`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub index: usize,
    pub time: f64,
    pub value: f64,
    pub kind: PeakKind,
}

/// How detected extrema are turned into beats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakMode {
    /// Contraction (high) and relaxation (low) alternate; lows are kept.
    #[default]
    Alternating,
    /// Only highs are used, e.g. for intensity traces.
    High,
}

impl std::fmt::Display for PeakMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alternating => write!(f, "alternating"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Highs and lows, each ordered by time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PeakSet {
    pub highs: Vec<Peak>,
    pub lows: Vec<Peak>,
}

impl PeakSet {
    /// Build a set from peaks in any order.
    pub fn from_peaks(peaks: impl IntoIterator<Item = Peak>) -> Self {
        let (mut highs, mut lows): (Vec<Peak>, Vec<Peak>) =
            peaks.into_iter().partition(|p| p.kind == PeakKind::High);
        highs.sort_by_key(|p| p.index);
        lows.sort_by_key(|p| p.index);
        Self { highs, lows }
    }

    /// All peaks merged by time.
    pub fn sorted(&self) -> Vec<Peak> {
        let mut all: Vec<Peak> = self.highs.iter().chain(self.lows.iter()).copied().collect();
        all.sort_by_key(|p| p.index);
        all
    }

    pub fn len(&self) -> usize {
        self.highs.len() + self.lows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.highs.is_empty() && self.lows.is_empty()
    }
}

/// Peak detection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    /// Threshold as a fraction of the signal range, in (0, 1).
    pub ratio: f64,
    /// Samples compared on both sides together, even and >= 2.
    pub neighbours: usize,
    pub mode: PeakMode,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            ratio: DEFAULT_PEAK_RATIO,
            neighbours: DEFAULT_PEAK_NEIGHBOURS,
            mode: PeakMode::default(),
        }
    }
}

impl PeakConfig {
    pub fn validate(&self) -> Result<()> {
        validate_settings(self.ratio, self.neighbours)
    }
}

/// Ratio in (0, 1), neighbours even and at least 2.
pub(crate) fn validate_settings(ratio: f64, neighbours: usize) -> Result<()> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(BeatflowError::InvalidParameters(format!(
            "peak ratio must be within (0, 1), got {ratio}"
        )));
    }
    if neighbours < 2 || neighbours % 2 != 0 {
        return Err(BeatflowError::InvalidParameters(format!(
            "peak neighbours must be even and at least 2, got {neighbours}"
        )));
    }
    Ok(())
}

/// Interval series in seconds.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TimeIntervals {
    /// High to the following low.
    pub contraction: Vec<f64>,
    /// Low to the next high.
    pub relaxation: Vec<f64>,
    /// High to high.
    pub beat: Vec<f64>,
}

/// Mean ± population standard deviation of the beat intervals.
///
/// The contraction-related entries are `None` in [`PeakMode::High`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PeakStatistics {
    pub contraction_interval: Option<MeanStd>,
    pub relaxation_interval: Option<MeanStd>,
    pub contraction_relaxation_delta: Option<MeanStd>,
    pub bpm: MeanStd,
}

/// One row of the statistics export.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatisticRow {
    pub name: &'static str,
    pub mean: f64,
    pub std: f64,
    pub unit: String,
}
