/// Minimum block count per frame pair to search blocks in parallel.
pub const PARALLEL_BLOCK_THRESHOLD: usize = 16;

/// Minimum frame count to use frame-level Rayon parallelism.
pub const PARALLEL_FRAME_THRESHOLD: usize = 4;

/// Smallest allowed block width in pixels.
pub const MIN_BLOCKWIDTH: usize = 2;

/// Largest allowed block width in pixels.
pub const MAX_BLOCKWIDTH: usize = 128;

/// Default block width used when none is configured.
pub const DEFAULT_BLOCKWIDTH: usize = 16;

/// Default number of frames between the two frames of a matched pair.
pub const DEFAULT_DELAY: usize = 2;

/// Default search radius in pixels.
pub const DEFAULT_MAX_SHIFT: usize = 7;

/// Default longest frame side used for analysis when downscaling is enabled.
pub const DEFAULT_ANALYSIS_MAX_SIZE: usize = 1024;

/// Default peak threshold as a fraction of the signal range.
pub const DEFAULT_PEAK_RATIO: f64 = 0.05;

/// Default neighbourhood size (samples on both sides together) for extrema.
pub const DEFAULT_PEAK_NEIGHBOURS: usize = 4;

/// Default minimum number of moving neighbours that keeps a vector alive.
pub const DEFAULT_OUTLIER_MIN_SUPPORT: usize = 1;

/// A block has eight neighbours; more support can never be met.
pub const MAX_OUTLIER_MIN_SUPPORT: usize = 8;

/// Percentile of the busiest frame's magnitudes used as display cutoff.
pub const DISPLAY_SCALE_PERCENTILE: f64 = 95.0;

/// Lower percentile of the first frame used as automatic black level.
pub const AUTO_BLACK_PERCENTILE: f64 = 0.1;

/// Upper percentile of the first frame used as automatic white level.
pub const AUTO_WHITE_PERCENTILE: f64 = 99.9;

/// Seconds per minute, for beats-per-minute conversion.
pub const SECONDS_PER_MINUTE: f64 = 60.0;
