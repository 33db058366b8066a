pub mod config;
mod orchestrator;
mod task;
mod types;

pub use config::AnalysisConfig;
pub use orchestrator::{run_analysis, run_analysis_reported, MotionAnalysis, RoiAnalysis};
pub use task::{AnalysisTask, TaskHandle};
pub use types::{NoOpReporter, PipelineStage, ProgressReporter, TaskEvent};
