mod common;

use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;

use beatflow_core::cancel::{CancelToken, Outcome};
use beatflow_core::error::BeatflowError;
use beatflow_core::frame::{FrameStack, Roi};
use beatflow_core::motion::filter::FilterConfig;
use beatflow_core::motion::AnalysisParameters;
use beatflow_core::peaks::PeakConfig;
use beatflow_core::pipeline::{
    run_analysis, run_analysis_reported, AnalysisConfig, PipelineStage, ProgressReporter,
};

use common::{meta, translating_frames, translating_stack};

fn config(blockwidth: usize, delay: usize, max_shift: usize) -> AnalysisConfig {
    AnalysisConfig {
        parameters: AnalysisParameters::new(blockwidth, delay, max_shift).unwrap(),
        ..AnalysisConfig::default()
    }
}

#[derive(Default)]
struct RecordingReporter {
    stages: Mutex<Vec<PipelineStage>>,
    advances: Mutex<Vec<usize>>,
}

impl ProgressReporter for RecordingReporter {
    fn begin_stage(&self, stage: PipelineStage, _total_items: Option<usize>) {
        self.stages.lock().unwrap().push(stage);
    }

    fn advance(&self, items_done: usize) {
        self.advances.lock().unwrap().push(items_done);
    }
}

#[test]
fn test_interior_roi_recovers_speed() {
    let stack = translating_stack(8, 64, 64, 1, 0);
    let config = AnalysisConfig {
        roi: Some(Roi::new(16, 16, 32, 32)),
        ..config(16, 1, 3)
    };
    let analysis = run_analysis(&stack, &config).unwrap();

    assert_eq!(analysis.raw_field.len(), 7);
    assert_eq!(analysis.result.unit_field.grid_dim(), (2, 2));
    let signal = &analysis.result.signal;
    assert_eq!(signal.len(), 7);
    for &v in &signal.values {
        // 1 px per frame * 1 µm/px * 10 fps
        assert_relative_eq!(v, 10.0, epsilon = 1e-5);
    }
    assert_eq!(analysis.result.time_averaged.max, Some(10.0));
}

#[test]
fn test_analyze_roi_reuses_raw_field() {
    let stack = translating_stack(6, 64, 64, 1, 0);
    let full = run_analysis(&stack, &config(16, 1, 3)).unwrap();
    assert!(full.result.signal.has_data());
    assert_eq!(full.result.unit_field.grid_dim(), (4, 4));

    let roi = Roi::new(16, 16, 32, 32);
    let sub = full
        .analyze_roi(Some(roi), &FilterConfig::default(), None)
        .unwrap();
    assert_eq!(sub.roi, Some(roi));
    assert_eq!(sub.unit_field.grid_dim(), (2, 2));
    assert!(sub.signal.values.iter().all(|v| (v - 10.0).abs() < 1e-5));

    let whole = full
        .analyze_roi(None, &FilterConfig::default(), Some(&PeakConfig::default()))
        .unwrap();
    assert_eq!(whole.signal, full.result.signal);
    assert_eq!(whole.unit_field, full.result.unit_field);
}

#[test]
fn test_set_roi_replaces_result() {
    let stack = translating_stack(6, 64, 64, 1, 0);
    let mut analysis = run_analysis(&stack, &config(16, 1, 3)).unwrap();
    let raw = analysis.raw_field.clone();

    analysis
        .set_roi(Some(Roi::new(16, 16, 32, 32)), &FilterConfig::default(), None)
        .unwrap();
    assert_eq!(analysis.result.unit_field.grid_dim(), (2, 2));
    assert_eq!(analysis.raw_field, raw);

    assert!(matches!(
        analysis.set_roi(Some(Roi::new(0, 0, 2, 2)), &FilterConfig::default(), None),
        Err(BeatflowError::EmptyRoi)
    ));
}

#[test]
fn test_downscaled_analysis_keeps_physical_units() {
    let stack = FrameStack::new(translating_frames(5, 64, 64, 2, 0), meta(10.0, 1.0)).unwrap();
    let config = AnalysisConfig {
        max_size: Some(32),
        roi: Some(Roi::new(16, 16, 32, 32)),
        ..config(8, 1, 3)
    };
    let analysis = run_analysis(&stack, &config).unwrap();

    assert_relative_eq!(analysis.scaling_factor, 0.5);
    assert_eq!(analysis.result.unit_field.grid_dim(), (2, 2));
    for &v in &analysis.result.signal.values {
        // 2 original px per frame at 10 fps
        assert_relative_eq!(v, 20.0, epsilon = 1e-4);
    }
}

#[test]
fn test_static_stack_has_no_signal_and_skips_peaks() {
    let stack = common::static_stack(6, 32, 32);
    let analysis = run_analysis(&stack, &config(16, 1, 2)).unwrap();

    assert!(!analysis.result.signal.has_data());
    assert!(analysis.result.display_scale.is_none());
    assert!(analysis.result.detector.peaks().is_none());
}

#[test]
fn test_reporter_sees_stages_in_order() {
    let stack = translating_stack(5, 32, 32, 1, 0);
    let reporter = Arc::new(RecordingReporter::default());
    let outcome = run_analysis_reported(
        &stack,
        &config(16, 1, 2),
        reporter.clone(),
        &CancelToken::new(),
    )
    .unwrap();
    assert!(matches!(outcome, Outcome::Completed(_)));

    assert_eq!(
        *reporter.stages.lock().unwrap(),
        vec![
            PipelineStage::BlockMatching,
            PipelineStage::UnitConversion,
            PipelineStage::Filtering,
            PipelineStage::Aggregation,
            PipelineStage::PeakDetection,
        ]
    );
    assert_eq!(*reporter.advances.lock().unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn test_cancelled_run_returns_no_result() {
    let stack = translating_stack(5, 32, 32, 1, 0);
    let cancel = CancelToken::new();
    cancel.cancel();
    let outcome = run_analysis_reported(
        &stack,
        &config(16, 1, 2),
        Arc::new(RecordingReporter::default()),
        &cancel,
    )
    .unwrap();
    assert!(outcome.is_cancelled());
}

#[test]
fn test_bad_peak_settings_fail_before_block_matching() {
    let stack = translating_stack(5, 32, 32, 1, 0);
    let config = AnalysisConfig {
        peaks: Some(PeakConfig {
            ratio: 1.5,
            ..PeakConfig::default()
        }),
        ..config(16, 1, 2)
    };
    let reporter = Arc::new(RecordingReporter::default());
    let result = run_analysis_reported(&stack, &config, reporter.clone(), &CancelToken::new());

    assert!(matches!(result, Err(BeatflowError::InvalidParameters(_))));
    assert!(reporter.stages.lock().unwrap().is_empty());
}

#[test]
fn test_analyze_roi_rejects_bad_settings() {
    let stack = translating_stack(5, 32, 32, 1, 0);
    let analysis = run_analysis(&stack, &config(16, 1, 2)).unwrap();

    let filter = FilterConfig {
        outlier_min_support: 9,
        ..FilterConfig::default()
    };
    assert!(matches!(
        analysis.analyze_roi(None, &filter, None),
        Err(BeatflowError::InvalidParameters(_))
    ));
    let peaks = PeakConfig {
        neighbours: 5,
        ..PeakConfig::default()
    };
    assert!(matches!(
        analysis.analyze_roi(None, &FilterConfig::default(), Some(&peaks)),
        Err(BeatflowError::InvalidParameters(_))
    ));
}

#[test]
fn test_invalid_config_is_rejected() {
    let stack = translating_stack(5, 32, 32, 1, 0);
    let mut bad = config(16, 1, 2);
    bad.max_size = Some(0);
    assert!(matches!(
        run_analysis(&stack, &bad),
        Err(BeatflowError::InvalidParameters(_))
    ));

    let too_few = config(16, 5, 2);
    assert!(matches!(
        run_analysis(&stack, &too_few),
        Err(BeatflowError::InsufficientFrames { frames: 5, delay: 5 })
    ));
}
