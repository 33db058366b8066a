/// Analysis stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Downscaling,
    BlockMatching,
    UnitConversion,
    Filtering,
    Aggregation,
    PeakDetection,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Downscaling => write!(f, "Downscaling frames"),
            Self::BlockMatching => write!(f, "Matching blocks"),
            Self::UnitConversion => write!(f, "Converting units"),
            Self::Filtering => write!(f, "Filtering vectors"),
            Self::Aggregation => write!(f, "Aggregating motion"),
            Self::PeakDetection => write!(f, "Detecting peaks"),
        }
    }
}

/// Thread-safe progress reporting for the analysis.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items
    /// in this stage (e.g., frame pairs), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// `items_done` work items within the current stage have completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when `run_analysis` delegates.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Progress notification sent by a background [`super::AnalysisTask`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TaskEvent {
    pub stage: PipelineStage,
    /// Completed fraction of the stage, 0.0..=1.0.
    pub fraction: f32,
}
