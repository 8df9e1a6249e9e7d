//! Tolerance constants for pitch testing.

/// Relative frequency error accepted from the raw estimator (1%).
pub const FREQ_RATIO_EPSILON: f32 = 0.01;

/// Absolute error accepted for a stabilized reading (Hz).
pub const STABLE_HZ_EPSILON: f32 = 2.0;

/// Minimum clarity expected for a clean periodic signal.
pub const CLEAN_CLARITY: f32 = 0.9;

/// How long a test waits for the pipeline to settle.
pub const SETTLE_TIMEOUT_MS: u64 = 3000;
