//! Adaptive noise gate and automatic gain control.
//!
//! The gate tracks the room's noise floor while the input is unusable and
//! opens `gate_margin_db` above it. Quiet but clearly tonal input is let
//! through as long as it stays within `rescue_margin_db` of the floor. While
//! the input is usable the gain is nudged toward `target_rms_db`.

use pitchtrack_core::{Error, Result};

/// Bounds for the tracked noise floor (dB).
pub const NOISE_FLOOR_MIN_DB: f32 = -50.0;
pub const NOISE_FLOOR_MAX_DB: f32 = -24.0;

/// Bounds for the input gain factor.
pub const GAIN_MIN: f32 = 0.5;
pub const GAIN_MAX: f32 = 3.5;

const INITIAL_NOISE_FLOOR_DB: f32 = -55.0;
const INITIAL_GAIN: f32 = 2.0;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct GateConfig {
    /// Gate opens this far above the noise floor (dB)
    pub gate_margin_db: f32,
    /// Level the AGC steers toward (dB)
    pub target_rms_db: f32,
    /// Relative gain change per usable frame
    pub gain_step: f32,
    /// Noise floor follow rate per unusable frame
    pub floor_smoothing: f32,
    /// Minimum clarity for quiet input to pass
    pub rescue_clarity: f32,
    /// How far below the floor rescued input may sit (dB)
    pub rescue_margin_db: f32,
    /// No gain change within this distance of the target (dB)
    pub agc_deadband_db: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            gate_margin_db: 6.0,
            target_rms_db: -24.0,
            gain_step: 0.01,
            floor_smoothing: 0.003,
            rescue_clarity: 0.5,
            rescue_margin_db: 8.0,
            agc_deadband_db: 1.0,
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.gain_step > 0.0 && self.gain_step < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "gain_step must be in (0, 1), got {}",
                self.gain_step
            )));
        }
        if !(self.floor_smoothing > 0.0 && self.floor_smoothing <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "floor_smoothing must be in (0, 1], got {}",
                self.floor_smoothing
            )));
        }
        if !self.target_rms_db.is_finite() || self.target_rms_db > 0.0 {
            return Err(Error::InvalidConfig(format!(
                "target_rms_db must be a finite level at or below 0 dB, got {}",
                self.target_rms_db
            )));
        }
        if self.gate_margin_db < 0.0 || self.rescue_margin_db < 0.0 || self.agc_deadband_db < 0.0 {
            return Err(Error::InvalidConfig("Gate margins must not be negative".into()));
        }
        Ok(())
    }
}

/// Per-frame gate verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateDecision {
    /// Frame level after gain (dB)
    pub rms_db: f32,
    /// Level the gate opened at for this frame (dB)
    pub gate_db: f32,
    pub above_gate: bool,
    /// Whether the frame should reach the stabilizer
    pub usable: bool,
}

pub struct NoiseGate {
    config: GateConfig,
    noise_floor_db: f32,
    gain_factor: f32,
}

impl NoiseGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            noise_floor_db: INITIAL_NOISE_FLOOR_DB.clamp(NOISE_FLOOR_MIN_DB, NOISE_FLOOR_MAX_DB),
            gain_factor: INITIAL_GAIN.clamp(GAIN_MIN, GAIN_MAX),
        }
    }

    /// Judge one frame. `rms_db` is measured after `gain_factor()` was
    /// applied; `clarity` is the concurrent estimate's clarity (0 if none).
    pub fn process(&mut self, rms_db: f32, clarity: f32) -> GateDecision {
        let gate_db = self.noise_floor_db + self.config.gate_margin_db;
        let above_gate = rms_db >= gate_db;
        let rescued = clarity >= self.config.rescue_clarity
            && rms_db >= self.noise_floor_db - self.config.rescue_margin_db;
        let usable = above_gate || rescued;

        if usable {
            let error = self.config.target_rms_db - rms_db;
            if error > self.config.agc_deadband_db {
                self.gain_factor *= 1.0 + self.config.gain_step;
            } else if error < -self.config.agc_deadband_db {
                self.gain_factor *= 1.0 - self.config.gain_step;
            }
            self.gain_factor = self.gain_factor.clamp(GAIN_MIN, GAIN_MAX);
        } else if rms_db.is_finite() {
            self.noise_floor_db += self.config.floor_smoothing * (rms_db - self.noise_floor_db);
            self.noise_floor_db = self
                .noise_floor_db
                .clamp(NOISE_FLOOR_MIN_DB, NOISE_FLOOR_MAX_DB);
        }

        GateDecision {
            rms_db,
            gate_db,
            above_gate,
            usable,
        }
    }

    pub fn noise_floor_db(&self) -> f32 {
        self.noise_floor_db
    }

    pub fn gain_factor(&self) -> f32 {
        self.gain_factor
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}
