use serde::{Deserialize, Serialize};

use crate::error::{BeatflowError, Result};
use crate::frame::Roi;
use crate::motion::filter::FilterConfig;
use crate::motion::AnalysisParameters;
use crate::peaks::PeakConfig;

/// Everything an analysis run needs besides the frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Longest frame side used for block matching; `None` analyses at full size.
    pub max_size: Option<usize>,
    pub parameters: AnalysisParameters,
    /// Region of interest in original-frame pixels; `None` is the whole frame.
    pub roi: Option<Roi>,
    pub filter: FilterConfig,
    /// Peak detection settings; `None` skips detection.
    pub peaks: Option<PeakConfig>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_size: None,
            parameters: AnalysisParameters::default(),
            roi: None,
            filter: FilterConfig::default(),
            peaks: Some(PeakConfig::default()),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        self.parameters.validate()?;
        if self.max_size == Some(0) {
            return Err(BeatflowError::InvalidParameters(
                "max_size must be > 0".into(),
            ));
        }
        if let Some(roi) = &self.roi {
            if roi.width == 0 || roi.height == 0 {
                return Err(BeatflowError::EmptyRoi);
            }
        }
        self.filter.validate()?;
        if let Some(peaks) = &self.peaks {
            peaks.validate()?;
        }
        Ok(())
    }
}
