//! # pitchtrack analysis
//!
//! Monophonic pitch tracking for live input.
//!
//! This crate provides:
//! - **Pitch estimation**: NSDF (McLeod) key-maximum picking with parabolic refinement
//! - **Stabilization**: median smoothing with hysteresis switching
//! - **Noise gate**: adaptive noise floor with automatic gain control
//! - **Onset detection**: gate openings, level jumps and note changes
//! - **Live analysis**: a ticking background thread publishing lock-free readings
//!
//! All stages operate on raw `&[f32]` frames and allocate nothing per tick.
//!
//! ## Example
//!
//! ```rust
//! use pitchtrack_analysis::{AnalysisChain, ChainConfig, InstrumentProfile};
//!
//! let sample_rate = 44100.0;
//! let mut chain = AnalysisChain::new(
//!     1024,
//!     sample_rate,
//!     InstrumentProfile::resolve("voice"),
//!     ChainConfig::default(),
//! );
//!
//! let mut frame: Vec<f32> = (0..1024)
//!     .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin() * 0.5)
//!     .collect();
//! let output = chain.process(&mut frame);
//! assert!((output.frequency_hz - 440.0).abs() < 5.0);
//! ```

pub mod chain;
pub mod estimator;
pub mod gate;
pub mod live;
pub mod math;
pub mod onset;
pub mod profile;
pub mod stabilizer;

pub use chain::{AnalysisChain, ChainConfig, TickOutput};
pub use estimator::{PitchEstimate, PitchEstimator};
pub use gate::{GateConfig, GateDecision, NoiseGate};
pub use live::{run_analysis_thread, spawn_analysis_thread, AnalysisWorker, LiveState};
pub use onset::{OnsetConfig, OnsetDetector};
pub use profile::InstrumentProfile;
pub use stabilizer::{Stabilizer, StabilizerConfig, StabilizerState};
