//! Pipeline configuration.

use pitchtrack_analysis::ChainConfig;
use pitchtrack_core::Error;
use std::time::Duration;

use crate::Result;

/// Configuration for a [`PitchPipeline`](crate::PitchPipeline).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PipelineConfig {
    /// Analysis frame length in samples
    pub frame_size: usize,
    /// Ring buffer capacity between capture and analysis, in samples
    pub ring_capacity: usize,
    /// Analysis cadence
    pub tick_interval: Duration,
    /// Always analyse on the consumer's thread
    pub force_polling: bool,
    /// Gate, stabilizer and onset tuning
    pub chain: ChainConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            ring_capacity: 16384,
            tick_interval: Duration::from_millis(15),
            force_polling: false,
            chain: ChainConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frame_size < 64 || self.frame_size > 16384 {
            return Err(Error::InvalidConfig(format!(
                "frame_size {} out of range (64-16384 samples)",
                self.frame_size
            ))
            .into());
        }
        if self.ring_capacity < self.frame_size {
            return Err(Error::InvalidConfig(format!(
                "ring_capacity {} is smaller than frame_size {}",
                self.ring_capacity, self.frame_size
            ))
            .into());
        }
        if self.tick_interval.is_zero() || self.tick_interval > Duration::from_secs(1) {
            return Err(Error::InvalidConfig(format!(
                "tick_interval {:?} out of range (0-1s]",
                self.tick_interval
            ))
            .into());
        }
        self.chain.validate()?;
        Ok(())
    }
}

/// Reject sample rates the estimator cannot work with.
pub(crate) fn validate_sample_rate(sample_rate: f64) -> Result<()> {
    if !(8000.0..=384000.0).contains(&sample_rate) {
        return Err(Error::InvalidConfig(format!(
            "sample_rate {} out of range (8000-384000 Hz)",
            sample_rate
        ))
        .into());
    }
    Ok(())
}
