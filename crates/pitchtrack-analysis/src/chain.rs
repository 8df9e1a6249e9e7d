//! Per-tick analysis chain: gain, level, estimate, gate, stabilizer, onset.
//!
//! Shared by the live analysis thread and the polling fallback so both
//! backends produce identical readings from identical input.

use crate::estimator::{PitchEstimate, PitchEstimator};
use crate::gate::{GateConfig, GateDecision, NoiseGate};
use crate::math::{amplitude_to_db, rms};
use crate::onset::{OnsetConfig, OnsetDetector};
use crate::profile::InstrumentProfile;
use crate::stabilizer::{Stabilizer, StabilizerConfig, StabilizerState};
use pitchtrack_core::{Error, Result};

/// Tuning for every stage of the chain.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct ChainConfig {
    pub stabilizer: StabilizerConfig,
    pub gate: GateConfig,
    pub onset: OnsetConfig,
    /// Consecutive unusable ticks after which the stabilizer forgets its history
    pub silence_reset_ticks: u32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            stabilizer: StabilizerConfig::default(),
            gate: GateConfig::default(),
            onset: OnsetConfig::default(),
            silence_reset_ticks: 20,
        }
    }
}

impl ChainConfig {
    pub fn validate(&self) -> Result<()> {
        self.stabilizer.validate()?;
        self.gate.validate()?;
        if self.silence_reset_ticks == 0 {
            return Err(Error::InvalidConfig(
                "silence_reset_ticks must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Result of one analysis tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutput {
    /// Stable pitch in Hz, 0.0 when the frame is unusable or nothing is stable yet
    pub frequency_hz: f32,
    /// Clarity of this frame's raw estimate, 0.0 when the gate rejected it
    pub clarity: f32,
    /// Linear RMS after gain
    pub rms: f32,
    pub onset: bool,
    pub raw: PitchEstimate,
    pub gate: GateDecision,
}

pub struct AnalysisChain {
    estimator: PitchEstimator,
    stabilizer: Stabilizer,
    gate: NoiseGate,
    onset: OnsetDetector,
    profile: InstrumentProfile,
    frame_size: usize,
    silence_ticks: u32,
    silence_reset_ticks: u32,
}

impl AnalysisChain {
    pub fn new(
        frame_size: usize,
        sample_rate: f64,
        profile: InstrumentProfile,
        config: ChainConfig,
    ) -> Self {
        Self {
            estimator: PitchEstimator::new(frame_size, sample_rate),
            stabilizer: Stabilizer::new(config.stabilizer),
            gate: NoiseGate::new(config.gate),
            onset: OnsetDetector::new(config.onset),
            profile,
            frame_size,
            silence_ticks: 0,
            silence_reset_ticks: config.silence_reset_ticks,
        }
    }

    /// Analyse one frame. The frame is scaled in place by the current gain.
    pub fn process(&mut self, frame: &mut [f32]) -> TickOutput {
        // Corrupt input is treated as silence
        if frame.iter().any(|s| !s.is_finite()) {
            frame.fill(0.0);
        }

        let gain = self.gate.gain_factor();
        for sample in frame.iter_mut() {
            *sample *= gain;
        }

        let level = rms(frame);
        let rms_db = amplitude_to_db(level);

        let raw = self.estimator.estimate(frame, &self.profile);
        let gate = self.gate.process(rms_db, raw.clarity);

        let stable = if gate.usable {
            self.silence_ticks = 0;
            self.stabilizer.process(&raw)
        } else {
            self.silence_ticks = self.silence_ticks.saturating_add(1);
            if self.silence_ticks == self.silence_reset_ticks {
                self.stabilizer.reset();
            }
            None
        };

        let onset = self.onset.process(gate.usable, rms_db, stable);

        TickOutput {
            frequency_hz: stable.unwrap_or(0.0),
            // A closed gate reports no clarity; `raw` keeps the estimate
            clarity: if gate.usable { raw.clarity } else { 0.0 },
            rms: level,
            onset,
            raw,
            gate,
        }
    }

    /// Switch profile. Stabilizer history from the old range is discarded.
    pub fn set_profile(&mut self, profile: InstrumentProfile) {
        if profile != self.profile {
            self.profile = profile;
            self.stabilizer.reset();
        }
    }

    pub fn profile(&self) -> &InstrumentProfile {
        &self.profile
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn sample_rate(&self) -> f64 {
        self.estimator.sample_rate()
    }

    /// Half a frame: the average age of the samples in an analysed frame.
    pub fn frame_latency_ms(&self) -> f32 {
        (self.frame_size as f64 * 0.5 / self.estimator.sample_rate() * 1000.0) as f32
    }

    pub fn stabilizer_state(&self) -> StabilizerState {
        self.stabilizer.state()
    }

    pub fn noise_floor_db(&self) -> f32 {
        self.gate.noise_floor_db()
    }

    pub fn gain_factor(&self) -> f32 {
        self.gate.gain_factor()
    }

    /// Forget all per-session state.
    pub fn reset(&mut self) {
        self.stabilizer.reset();
        self.gate.reset();
        self.onset.reset();
        self.silence_ticks = 0;
    }
}
