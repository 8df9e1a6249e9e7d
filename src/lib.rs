//! # pitchtrack - Real-time Pitch Tracking
//!
//! Turns a live audio input into a continuously updated, jitter-free
//! estimate of fundamental frequency and clarity, cheap enough to read from
//! a UI thread at display-refresh rates.
//!
//! ## Architecture
//!
//! pitchtrack is an umbrella crate that coordinates:
//! - **pitchtrack-core** - Capture sources, frame ring buffer, lock-free result cell
//! - **pitchtrack-analysis** - NSDF estimator, noise gate, stabilizer, onset detection
//!
//! Capture callback → frame ring → analysis tick (default every 15 ms) →
//! lock-free [`PitchReading`] cell → any number of pollers.
//!
//! ## Quick Start
//!
//! ```ignore
//! use pitchtrack::prelude::*;
//!
//! let pipeline = PitchPipeline::builder().build()?;
//! let session = pipeline.start(Box::new(DeviceSource::default_input()?), "voice")?;
//!
//! // From the UI thread, every frame
//! if let Some(reading) = pipeline.poll(&session) {
//!     if reading.is_pitched() {
//!         println!("{:.1} Hz {:?}", reading.frequency_hz, reading.note_name());
//!     }
//! }
//!
//! pipeline.stop(&session);
//! ```
//!
//! ## Feature Flags
//!
//! - `device` - CPAL microphone / line input ([`DeviceSource`])
//! - `serialization` - serde derives on readings, profiles and configs

/// Re-export of pitchtrack-core for direct access
pub use pitchtrack_core as core;

/// Re-export of pitchtrack-analysis for direct access
pub use pitchtrack_analysis as analysis;

pub use pitchtrack_core::{
    CaptureSource, FrameReader, FrameWriter, ManualFeeder, ManualSource, PitchReading,
    SharedResult, StreamId,
};

#[cfg(feature = "device")]
pub use pitchtrack_core::{DeviceSource, InputDeviceInfo};

pub use pitchtrack_analysis::{
    ChainConfig, GateConfig, InstrumentProfile, OnsetConfig, PitchEstimate, PitchEstimator,
    StabilizerConfig, StabilizerState,
};

mod builder;
mod capability;
mod config;
mod error;
mod fallback;
mod pipeline;
mod session;

pub use builder::PitchPipelineBuilder;
pub use capability::Backend;
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use fallback::PollingEstimator;
pub use pipeline::PitchPipeline;
pub use session::SessionHandle;

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{Backend, PipelineConfig, PitchPipeline, PitchPipelineBuilder, SessionHandle};

    pub use crate::core::{CaptureSource, ManualFeeder, ManualSource, PitchReading};

    #[cfg(feature = "device")]
    pub use crate::core::DeviceSource;

    pub use crate::analysis::InstrumentProfile;
}
