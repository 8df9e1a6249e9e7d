//! Builder for configuring and constructing a `PitchPipeline`.

use crate::{PipelineConfig, PitchPipeline, Result};
use pitchtrack_analysis::{GateConfig, OnsetConfig, StabilizerConfig};
use std::time::Duration;

/// The configuration is validated by [`build`](PitchPipelineBuilder::build);
/// individual setters accept anything.
///
/// # Example
///
/// ```
/// use pitchtrack::prelude::*;
/// use std::time::Duration;
///
/// let pipeline = PitchPipeline::builder()
///     .frame_size(2048)
///     .tick_interval(Duration::from_millis(10))
///     .build()?;
///
/// assert_eq!(pipeline.config().frame_size, 2048);
/// # Ok::<(), pitchtrack::Error>(())
/// ```
#[derive(Default)]
pub struct PitchPipelineBuilder {
    config: PipelineConfig,
}

impl PitchPipelineBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 1024
    pub fn frame_size(mut self, samples: usize) -> Self {
        self.config.frame_size = samples;
        self
    }

    /// Default: 16384
    pub fn ring_capacity(mut self, samples: usize) -> Self {
        self.config.ring_capacity = samples;
        self
    }

    /// Default: 15 ms
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = interval;
        self
    }

    /// Analyse on the consumer's thread even when a background thread is available.
    pub fn force_polling(mut self, force: bool) -> Self {
        self.config.force_polling = force;
        self
    }

    pub fn stabilizer(mut self, config: StabilizerConfig) -> Self {
        self.config.chain.stabilizer = config;
        self
    }

    pub fn gate(mut self, config: GateConfig) -> Self {
        self.config.chain.gate = config;
        self
    }

    pub fn onset(mut self, config: OnsetConfig) -> Self {
        self.config.chain.onset = config;
        self
    }

    /// Default: 20
    pub fn silence_reset_ticks(mut self, ticks: u32) -> Self {
        self.config.chain.silence_reset_ticks = ticks;
        self
    }

    pub fn build(self) -> Result<PitchPipeline> {
        PitchPipeline::new(self.config)
    }
}
