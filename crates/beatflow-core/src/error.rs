use thiserror::Error;

#[derive(Error, Debug)]
pub enum BeatflowError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Not enough frames ({frames}) for a delay of {delay}")]
    InsufficientFrames { frames: usize, delay: usize },

    #[error("Signal has {samples} samples, at least {required} are required")]
    InsufficientSamples { samples: usize, required: usize },

    #[error("Region of interest does not contain any block")]
    EmptyRoi,

    #[error("No qualifying peaks detected")]
    NoPeaksDetected,

    #[error("Peak detection has not been run")]
    PeaksNotDetected,

    #[error("No signal loaded")]
    NoSignal,

    #[error("An analysis task is already running on this frame stack")]
    TaskAlreadyRunning,

    #[error("Frame {index} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Empty frame sequence")]
    EmptySequence,

    #[error("Analysis worker panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, BeatflowError>;
