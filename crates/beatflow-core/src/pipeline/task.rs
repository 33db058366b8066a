use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, info};

use crate::cancel::{CancelToken, Outcome};
use crate::error::{BeatflowError, Result};
use crate::frame::FrameStack;

use super::config::AnalysisConfig;
use super::orchestrator::{run_analysis_reported, MotionAnalysis};
use super::types::{PipelineStage, ProgressReporter, TaskEvent};

/// A configured analysis that runs on a background thread.
#[derive(Clone, Debug)]
pub struct AnalysisTask {
    config: Arc<AnalysisConfig>,
}

impl AnalysisTask {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Start the analysis of `stack` on a worker thread.
    ///
    /// Fails with [`BeatflowError::TaskAlreadyRunning`] while another task
    /// holds the same stack.
    pub fn start(&self, stack: Arc<FrameStack>) -> Result<TaskHandle> {
        self.start_with_cancel(stack, CancelToken::new())
    }

    /// Like [`AnalysisTask::start`], observing an externally owned token.
    pub fn start_with_cancel(
        &self,
        stack: Arc<FrameStack>,
        cancel: CancelToken,
    ) -> Result<TaskHandle> {
        self.config.validate()?;
        let lease = FrameStack::try_lease(&stack).ok_or(BeatflowError::TaskAlreadyRunning)?;

        let (tx, events) = mpsc::channel();
        let progress = Arc::new(AtomicU32::new(0f32.to_bits()));
        let reporter = Arc::new(ChannelReporter::new(tx, Arc::clone(&progress)));

        let config = Arc::clone(&self.config);
        let token = cancel.clone();
        let handle = std::thread::Builder::new()
            .name("beatflow-analysis".into())
            .spawn(move || {
                let outcome = run_analysis_reported(lease.stack(), &config, reporter, &token);
                debug!(
                    cancelled = matches!(outcome, Ok(Outcome::Cancelled)),
                    failed = outcome.is_err(),
                    "Analysis worker finished"
                );
                outcome
            })?;
        info!("Analysis task started");

        Ok(TaskHandle {
            handle,
            events,
            progress,
            cancel,
        })
    }
}

/// Handle to a running [`AnalysisTask`].
pub struct TaskHandle {
    handle: JoinHandle<Result<Outcome<MotionAnalysis>>>,
    events: mpsc::Receiver<TaskEvent>,
    progress: Arc<AtomicU32>,
    cancel: CancelToken,
}

impl TaskHandle {
    /// Fraction of frame pairs matched so far, 0.0..=1.0.
    pub fn progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Acquire))
    }

    /// Stage and progress notifications from the worker.
    pub fn events(&self) -> &mpsc::Receiver<TaskEvent> {
        &self.events
    }

    /// Request cancellation; the worker stops at the next frame pair.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker. The stack is free for a new task afterwards.
    pub fn join(self) -> Result<Outcome<MotionAnalysis>> {
        self.handle
            .join()
            .map_err(|_| BeatflowError::WorkerPanicked)?
    }
}

/// Progress reporter that forwards updates over an mpsc channel and keeps
/// the block-matching fraction in an atomic.
struct ChannelReporter {
    tx: mpsc::Sender<TaskEvent>,
    progress: Arc<AtomicU32>,
    stage: Mutex<Option<PipelineStage>>,
    current_total: AtomicUsize,
}

impl ChannelReporter {
    fn new(tx: mpsc::Sender<TaskEvent>, progress: Arc<AtomicU32>) -> Self {
        Self {
            tx,
            progress,
            stage: Mutex::new(None),
            current_total: AtomicUsize::new(0),
        }
    }

    fn current_stage(&self) -> Option<PipelineStage> {
        self.stage.lock().map(|s| *s).unwrap_or(None)
    }

    fn send(&self, stage: PipelineStage, fraction: f32) {
        if stage == PipelineStage::BlockMatching {
            self.progress.store(fraction.to_bits(), Ordering::Release);
        }
        // The receiver may already be gone; progress is best effort.
        let _ = self.tx.send(TaskEvent { stage, fraction });
    }
}

impl ProgressReporter for ChannelReporter {
    fn begin_stage(&self, stage: PipelineStage, total_items: Option<usize>) {
        self.current_total
            .store(total_items.unwrap_or(0), Ordering::Relaxed);
        if let Ok(mut current) = self.stage.lock() {
            *current = Some(stage);
        }
        self.send(stage, 0.0);
    }

    fn advance(&self, items_done: usize) {
        let total = self.current_total.load(Ordering::Relaxed);
        if let (Some(stage), true) = (self.current_stage(), total > 0) {
            self.send(stage, (items_done as f32 / total as f32).min(1.0));
        }
    }

    fn finish_stage(&self) {
        if let Some(stage) = self.current_stage() {
            self.send(stage, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, VideoMeta};
    use ndarray::Array2;

    fn small_stack() -> Arc<FrameStack> {
        let frames = (0..4)
            .map(|i| Frame::new(Array2::from_elem((16, 16), i as f32 * 0.1), 8))
            .collect();
        Arc::new(FrameStack::new(frames, VideoMeta::new(10.0, 1.0).unwrap()).unwrap())
    }

    #[test]
    fn second_start_while_leased_is_rejected() {
        let stack = small_stack();
        let task = AnalysisTask::new(AnalysisConfig::default());

        let lease = FrameStack::try_lease(&stack).unwrap();
        assert!(matches!(
            task.start(Arc::clone(&stack)),
            Err(BeatflowError::TaskAlreadyRunning)
        ));
        drop(lease);

        let handle = task.start(Arc::clone(&stack)).unwrap();
        assert!(matches!(handle.join(), Ok(Outcome::Completed(_))));
        assert!(!stack.is_busy());
    }

    #[test]
    fn invalid_config_does_not_claim_stack() {
        let stack = small_stack();
        let mut config = AnalysisConfig::default();
        config.parameters.blockwidth = 3;
        let task = AnalysisTask::new(config);

        assert!(matches!(
            task.start(Arc::clone(&stack)),
            Err(BeatflowError::InvalidParameters(_))
        ));
        assert!(!stack.is_busy());
    }
}
