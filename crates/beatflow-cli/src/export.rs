use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use beatflow_core::peaks::{Peak, PeakDetector, StatisticRow};
use beatflow_core::pipeline::AnalysisConfig;
use beatflow_core::signal::Signal1D;

/// JSON document written by the `analyze` and `intensity` commands.
#[derive(Serialize)]
pub struct AnalysisExport<'a> {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<&'a AnalysisConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaling_factor: Option<f64>,
    /// Display cutoff in µm/s; `null` without motion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_motion: Option<Option<f32>>,
    pub signal: &'a Signal1D,
    pub peaks: Vec<Peak>,
    pub statistics: Vec<StatisticRow>,
}

impl<'a> AnalysisExport<'a> {
    pub fn new(source: &Path, config: Option<&'a AnalysisConfig>, signal: &'a Signal1D) -> Self {
        Self {
            source: source.display().to_string(),
            config,
            scaling_factor: None,
            max_motion: None,
            signal,
            peaks: Vec::new(),
            statistics: Vec::new(),
        }
    }

    pub fn with_motion(mut self, scaling_factor: f64, max_motion: Option<f32>) -> Self {
        self.scaling_factor = Some(scaling_factor);
        self.max_motion = Some(max_motion);
        self
    }

    /// Attach the peak table and, if computed, the statistics table.
    pub fn with_peaks(mut self, detector: &PeakDetector) -> Self {
        self.peaks = detector.peak_table();
        self.statistics = detector.statistics_table().unwrap_or_default();
        self
    }
}

pub fn write_json(path: &Path, export: &AnalysisExport<'_>) -> Result<()> {
    let json = serde_json::to_string_pretty(export)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write results to {}", path.display()))?;
    Ok(())
}
