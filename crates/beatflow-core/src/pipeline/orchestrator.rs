use std::sync::Arc;

use tracing::{info, warn};

use crate::cancel::{CancelToken, Outcome};
use crate::error::{BeatflowError, Result};
use crate::frame::{FrameStack, Roi, VideoMeta};
use crate::motion::aggregate::{magnitude, reduce_to_signal, time_average, TimeAveragedMotion};
use crate::motion::filter::{
    apply_filters, apply_roi, display_field, scale_max_motion, FilterConfig,
};
use crate::motion::{
    estimate_with_progress, to_units, AnalysisParameters, ScalarField, UnitScale, VectorField,
};
use crate::peaks::{PeakConfig, PeakDetector};
use crate::signal::Signal1D;

use super::config::AnalysisConfig;
use super::types::{NoOpReporter, PipelineStage, ProgressReporter};

/// Output of a complete analysis run.
#[derive(Clone, Debug)]
pub struct MotionAnalysis {
    pub parameters: AnalysisParameters,
    /// Analysis-resolution pixels per original pixel.
    pub scaling_factor: f64,
    pub meta: VideoMeta,
    /// Block-matching displacements in pixels per frame pair.
    pub raw_field: VectorField,
    pub result: RoiAnalysis,
}

/// Post-processing of the raw field for one region of interest.
#[derive(Clone, Debug)]
pub struct RoiAnalysis {
    /// Region in original-frame pixels; `None` is the whole frame.
    pub roi: Option<Roi>,
    /// Filtered displacements in µm/s.
    pub unit_field: VectorField,
    /// Zero-masked, length-limited field for quiver display.
    pub display_field: VectorField,
    /// Display cutoff length in µm/s, if the signal has data.
    pub display_scale: Option<f32>,
    pub magnitudes: ScalarField,
    pub signal: Signal1D,
    pub time_averaged: TimeAveragedMotion,
    pub detector: PeakDetector,
}

impl MotionAnalysis {
    pub fn unit_scale(&self) -> Result<UnitScale> {
        UnitScale::new(
            self.meta.microns_per_pixel,
            self.scaling_factor,
            self.meta.fps,
            self.parameters.delay,
        )
    }

    /// Re-run the post-processing for another region from the stored raw
    /// field. Block matching is not repeated.
    pub fn analyze_roi(
        &self,
        roi: Option<Roi>,
        filter: &FilterConfig,
        peaks: Option<&PeakConfig>,
    ) -> Result<RoiAnalysis> {
        filter.validate()?;
        if let Some(peak_config) = peaks {
            peak_config.validate()?;
        }
        post_process(
            &self.raw_field,
            &self.unit_scale()?,
            self.parameters.blockwidth,
            roi,
            filter,
            peaks,
            &NoOpReporter,
        )
    }

    /// Replace `result` with the analysis of another region.
    pub fn set_roi(
        &mut self,
        roi: Option<Roi>,
        filter: &FilterConfig,
        peaks: Option<&PeakConfig>,
    ) -> Result<()> {
        self.result = self.analyze_roi(roi, filter, peaks)?;
        Ok(())
    }
}

/// Run the complete analysis on a frame stack.
pub fn run_analysis(stack: &FrameStack, config: &AnalysisConfig) -> Result<MotionAnalysis> {
    let reporter: Arc<dyn ProgressReporter> = Arc::new(NoOpReporter);
    match run_analysis_reported(stack, config, reporter, &CancelToken::new())? {
        Outcome::Completed(analysis) => Ok(analysis),
        Outcome::Cancelled => unreachable!("fresh cancel token was never triggered"),
    }
}

/// Run the complete analysis with a thread-safe progress reporter.
///
/// Cancellation is polled between frame pairs during block matching and
/// between stages afterwards.
pub fn run_analysis_reported(
    stack: &FrameStack,
    config: &AnalysisConfig,
    reporter: Arc<dyn ProgressReporter>,
    cancel: &CancelToken,
) -> Result<Outcome<MotionAnalysis>> {
    config.validate()?;
    let (h, w) = stack.dim();
    info!(
        frames = stack.len(),
        width = w,
        height = h,
        fps = stack.meta().fps,
        "Starting motion analysis"
    );

    let downscaled = match config.max_size {
        Some(max_size) if h.max(w) > max_size => {
            reporter.begin_stage(PipelineStage::Downscaling, Some(stack.len()));
            let small = stack.downscaled(max_size)?;
            reporter.finish_stage();
            Some(small)
        }
        _ => None,
    };
    let working = downscaled.as_ref().unwrap_or(stack);
    let params = &config.parameters;

    let pairs = working.len().saturating_sub(params.delay);
    reporter.begin_stage(PipelineStage::BlockMatching, Some(pairs));
    let outcome = estimate_with_progress(
        working,
        params,
        |fraction| reporter.advance((fraction * pairs as f32).round() as usize),
        cancel,
    )?;
    let raw_field = match outcome {
        Outcome::Completed(field) => field,
        Outcome::Cancelled => return Ok(Outcome::Cancelled),
    };
    reporter.finish_stage();

    if cancel.is_cancelled() {
        return Ok(Outcome::Cancelled);
    }

    let scale = UnitScale::for_stack(working, params.delay)?;
    let result = post_process(
        &raw_field,
        &scale,
        params.blockwidth,
        config.roi,
        &config.filter,
        config.peaks.as_ref(),
        reporter.as_ref(),
    )?;
    let analysis = MotionAnalysis {
        parameters: *params,
        scaling_factor: working.scaling_factor(),
        meta: working.meta().clone(),
        raw_field,
        result,
    };

    if cancel.is_cancelled() {
        return Ok(Outcome::Cancelled);
    }
    info!(
        pairs = analysis.raw_field.len(),
        signal_has_data = analysis.result.signal.has_data(),
        "Motion analysis complete"
    );
    Ok(Outcome::Completed(analysis))
}

/// Units, ROI, filters, aggregation and peaks for one region.
fn post_process(
    raw_field: &VectorField,
    scale: &UnitScale,
    blockwidth: usize,
    roi: Option<Roi>,
    filter: &FilterConfig,
    peaks: Option<&PeakConfig>,
    reporter: &dyn ProgressReporter,
) -> Result<RoiAnalysis> {
    reporter.begin_stage(PipelineStage::UnitConversion, None);
    let units = to_units(raw_field, scale);
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Filtering, None);
    let selected = match &roi {
        Some(roi) => apply_roi(&units, &roi.to_analysis(scale.scaling_factor), blockwidth)?,
        None => units,
    };
    let unit_field = apply_filters(&selected, filter);
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Aggregation, None);
    let magnitudes = magnitude(&unit_field);
    let signal = reduce_to_signal(&magnitudes, scale.fps)?;
    let time_averaged = time_average(&unit_field, &magnitudes);
    let display_scale = scale_max_motion(&magnitudes, &signal);
    let display = display_field(&unit_field, display_scale);
    reporter.finish_stage();

    let mut detector = PeakDetector::with_mode(peaks.map(|p| p.mode).unwrap_or_default());
    detector.set_data(signal.clone());
    if let Some(peak_config) = peaks {
        reporter.begin_stage(PipelineStage::PeakDetection, None);
        if signal.has_data() {
            match detector.detect_peaks(peak_config.ratio, peak_config.neighbours) {
                Ok(_) => {}
                Err(BeatflowError::InsufficientSamples { samples, required }) => {
                    warn!(samples, required, "Signal too short for peak detection");
                }
                Err(e) => return Err(e),
            }
        } else {
            warn!("Motion signal has no data, skipping peak detection");
        }
        reporter.finish_stage();
    }

    Ok(RoiAnalysis {
        roi,
        unit_field,
        display_field: display,
        display_scale,
        magnitudes,
        signal,
        time_averaged,
        detector,
    })
}
