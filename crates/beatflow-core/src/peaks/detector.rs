use tracing::{debug, info};

use crate::consts::SECONDS_PER_MINUTE;
use crate::error::{BeatflowError, Result};
use crate::signal::Signal1D;
use crate::stats::{mean_std, nan_max, nan_mean, nan_min, MeanStd};

use super::types::{
    validate_settings, Peak, PeakKind, PeakMode, PeakSet, PeakStatistics, StatisticRow,
    TimeIntervals,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorState {
    Empty,
    DataLoaded,
    PeaksDetected,
    Analyzed,
}

/// Extrema detection, beat assignment and interval statistics on a signal.
#[derive(Clone, Debug, Default)]
pub struct PeakDetector {
    signal: Option<Signal1D>,
    mode: PeakMode,
    /// Extrema as found (or set manually), before assignment.
    candidates: Option<PeakSet>,
    /// Extrema after assignment for the current mode.
    peaks: Option<PeakSet>,
    statistics: Option<PeakStatistics>,
}

impl PeakDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: PeakMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn state(&self) -> DetectorState {
        if self.statistics.is_some() {
            DetectorState::Analyzed
        } else if self.peaks.is_some() {
            DetectorState::PeaksDetected
        } else if self.signal.is_some() {
            DetectorState::DataLoaded
        } else {
            DetectorState::Empty
        }
    }

    pub fn signal(&self) -> Option<&Signal1D> {
        self.signal.as_ref()
    }

    pub fn mode(&self) -> PeakMode {
        self.mode
    }

    pub fn peaks(&self) -> Option<&PeakSet> {
        self.peaks.as_ref()
    }

    pub fn statistics(&self) -> Option<&PeakStatistics> {
        self.statistics.as_ref()
    }

    /// Load a new signal, discarding peaks and statistics.
    pub fn set_data(&mut self, signal: Signal1D) {
        self.signal = Some(signal);
        self.candidates = None;
        self.peaks = None;
        self.statistics = None;
    }

    /// Switch the peak mode; detected peaks are re-assigned.
    pub fn set_peak_mode(&mut self, mode: PeakMode) {
        self.mode = mode;
        if self.candidates.is_some() {
            self.assign_from_candidates();
        }
    }

    /// Find local extrema that stand out from their neighbourhood.
    ///
    /// Sample `i` (never the first or last) is a candidate high (low) when it
    /// is strictly greater (smaller) than every finite sample within
    /// `neighbours / 2` positions. It is kept when it differs from the mean of
    /// those samples by more than `ratio * (max - min)` of the whole signal.
    pub fn detect_peaks(&mut self, ratio: f64, neighbours: usize) -> Result<&PeakSet> {
        validate_settings(ratio, neighbours)?;
        let signal = self.signal.as_ref().ok_or(BeatflowError::NoSignal)?;
        if signal.len() < neighbours + 1 {
            return Err(BeatflowError::InsufficientSamples {
                samples: signal.len(),
                required: neighbours + 1,
            });
        }

        let values = &signal.values;
        let range = match (
            nan_max(values.iter().copied()),
            nan_min(values.iter().copied()),
        ) {
            (Some(max), Some(min)) => max - min,
            _ => 0.0,
        };
        let threshold = ratio * range;
        let k = neighbours / 2;

        let mut found = Vec::new();
        for i in 1..values.len() - 1 {
            let v = values[i];
            if !v.is_finite() {
                continue;
            }
            let lo = i.saturating_sub(k);
            let hi = (i + k).min(values.len() - 1);
            let around: Vec<f64> = (lo..=hi)
                .filter(|&j| j != i)
                .map(|j| values[j])
                .filter(|n| n.is_finite())
                .collect();
            let Some(mean) = nan_mean(around.iter().copied()) else {
                continue;
            };

            let kind = if around.iter().all(|&n| v > n) {
                PeakKind::High
            } else if around.iter().all(|&n| v < n) {
                PeakKind::Low
            } else {
                continue;
            };
            if (v - mean).abs() > threshold {
                found.push(Peak {
                    index: i,
                    time: signal.time[i],
                    value: v,
                    kind,
                });
            }
        }

        let candidates = PeakSet::from_peaks(found);
        info!(
            highs = candidates.highs.len(),
            lows = candidates.lows.len(),
            ratio,
            neighbours,
            "Peaks detected"
        );
        self.candidates = Some(candidates);
        Ok(self.assign_from_candidates())
    }

    /// Replace the detected peaks, e.g. after manual editing.
    pub fn set_peaks(&mut self, peaks: PeakSet) -> Result<&PeakSet> {
        let signal = self.signal.as_ref().ok_or(BeatflowError::NoSignal)?;
        if let Some(bad) = peaks.sorted().iter().find(|p| p.index >= signal.len()) {
            return Err(BeatflowError::InvalidParameters(format!(
                "peak index {} outside signal of {} samples",
                bad.index,
                signal.len()
            )));
        }
        self.candidates = Some(PeakSet::from_peaks(peaks.sorted()));
        Ok(self.assign_from_candidates())
    }

    /// Re-run the assignment of the current candidates for the current mode.
    pub fn assign_peaks(&mut self) -> Result<&PeakSet> {
        if self.candidates.is_none() {
            return Err(BeatflowError::PeaksNotDetected);
        }
        Ok(self.assign_from_candidates())
    }

    fn assign_from_candidates(&mut self) -> &PeakSet {
        let candidates = self.candidates.clone().unwrap_or_default();
        let assigned = match self.mode {
            PeakMode::High => PeakSet {
                highs: candidates.highs,
                lows: Vec::new(),
            },
            PeakMode::Alternating => assign_alternating(&candidates),
        };
        debug!(
            mode = %self.mode,
            highs = assigned.highs.len(),
            lows = assigned.lows.len(),
            "Peaks assigned"
        );
        self.statistics = None;
        self.peaks.insert(assigned)
    }

    pub fn calculate_time_intervals(&self) -> Result<TimeIntervals> {
        let peaks = self.peaks.as_ref().ok_or(BeatflowError::PeaksNotDetected)?;
        let beat = peaks
            .highs
            .windows(2)
            .map(|w| w[1].time - w[0].time)
            .collect();

        if self.mode == PeakMode::High {
            return Ok(TimeIntervals {
                beat,
                ..TimeIntervals::default()
            });
        }

        let contraction = peaks
            .highs
            .iter()
            .zip(&peaks.lows)
            .map(|(h, l)| l.time - h.time)
            .collect();
        let relaxation = peaks
            .lows
            .iter()
            .zip(peaks.highs.iter().skip(1))
            .map(|(l, h)| h.time - l.time)
            .collect();

        Ok(TimeIntervals {
            contraction,
            relaxation,
            beat,
        })
    }

    /// Interval statistics and beating rate of the assigned peaks.
    pub fn calc_peakstatistics(&mut self) -> Result<PeakStatistics> {
        let intervals = self.calculate_time_intervals()?;
        let peaks = self.peaks.as_ref().ok_or(BeatflowError::PeaksNotDetected)?;

        let beat = mean_std(&intervals.beat).ok_or(BeatflowError::NoPeaksDetected)?;
        let rates: Vec<f64> = intervals
            .beat
            .iter()
            .map(|dt| SECONDS_PER_MINUTE / dt)
            .collect();
        let bpm = MeanStd {
            mean: SECONDS_PER_MINUTE / beat.mean,
            std: mean_std(&rates).map_or(0.0, |r| r.std),
        };

        let statistics = match self.mode {
            PeakMode::High => PeakStatistics {
                contraction_interval: None,
                relaxation_interval: None,
                contraction_relaxation_delta: None,
                bpm,
            },
            PeakMode::Alternating => {
                let deltas: Vec<f64> = peaks
                    .highs
                    .iter()
                    .zip(&peaks.lows)
                    .map(|(h, l)| h.value - l.value)
                    .collect();
                let required = |v: &[f64]| mean_std(v).ok_or(BeatflowError::NoPeaksDetected);
                PeakStatistics {
                    contraction_interval: Some(required(&intervals.contraction[..])?),
                    relaxation_interval: Some(required(&intervals.relaxation[..])?),
                    contraction_relaxation_delta: Some(required(&deltas[..])?),
                    bpm,
                }
            }
        };

        info!(
            bpm = statistics.bpm.mean,
            bpm_std = statistics.bpm.std,
            beats = intervals.beat.len(),
            "Peak statistics"
        );
        self.statistics = Some(statistics);
        Ok(statistics)
    }

    /// One row per assigned peak, ordered by time.
    pub fn peak_table(&self) -> Vec<Peak> {
        self.peaks.as_ref().map(PeakSet::sorted).unwrap_or_default()
    }

    /// One row per available statistic.
    pub fn statistics_table(&self) -> Result<Vec<StatisticRow>> {
        let stats = self.statistics.ok_or(BeatflowError::PeaksNotDetected)?;
        let value_unit = self
            .signal
            .as_ref()
            .and_then(|s| unit_of(&s.description))
            .unwrap_or_default();

        let rows = [
            ("contraction interval", stats.contraction_interval, "s".to_string()),
            ("relaxation interval", stats.relaxation_interval, "s".to_string()),
            (
                "contraction-relaxation delta",
                stats.contraction_relaxation_delta,
                value_unit,
            ),
            ("bpm", Some(stats.bpm), "1/min".to_string()),
        ];
        Ok(rows
            .into_iter()
            .filter_map(|(name, value, unit)| {
                value.map(|v| StatisticRow {
                    name,
                    mean: v.mean,
                    std: v.std,
                    unit,
                })
            })
            .collect())
    }
}

/// Force a strict high/low alternation starting with a high and ending with a low.
fn assign_alternating(candidates: &PeakSet) -> PeakSet {
    let mut chain: Vec<Peak> = Vec::new();
    for peak in candidates.sorted() {
        match chain.last_mut() {
            Some(last) if last.kind == peak.kind => {
                let more_extreme = match peak.kind {
                    PeakKind::High => peak.value > last.value,
                    PeakKind::Low => peak.value < last.value,
                };
                if more_extreme {
                    *last = peak;
                }
            }
            _ => chain.push(peak),
        }
    }

    if chain.first().is_some_and(|p| p.kind == PeakKind::Low) {
        chain.remove(0);
    }
    if chain.last().is_some_and(|p| p.kind == PeakKind::High) {
        chain.pop();
    }
    PeakSet::from_peaks(chain)
}

/// Text between the last pair of square brackets, e.g. "µm/s".
fn unit_of(description: &str) -> Option<String> {
    let start = description.rfind('[')?;
    let end = description[start..].find(']')? + start;
    Some(description[start + 1..end].to_string())
}
