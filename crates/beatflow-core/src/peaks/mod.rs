//! Peak detection and beating statistics on one-dimensional signals.

pub mod detector;
pub mod types;

pub use detector::{DetectorState, PeakDetector};
pub use types::{
    Peak, PeakConfig, PeakKind, PeakMode, PeakSet, PeakStatistics, StatisticRow, TimeIntervals,
};
