//! Temporal pitch stabilizer: median smoothing plus hysteresis switching.
//!
//! Raw estimates flicker by a few cents from frame to frame and jump by an
//! octave now and then. The stabilizer keeps a short history, takes its
//! median and only moves the stable pitch once the median has left the
//! hysteresis band around it for `stability_threshold` consecutive frames.

use crate::estimator::PitchEstimate;
use pitchtrack_core::{freq_to_midi, Error, Result};

/// Estimates needed before the median is used.
const BOOTSTRAP_SAMPLES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct StabilizerConfig {
    /// History length for the median
    pub window: usize,
    /// Estimates below this clarity are ignored
    pub min_confidence: f32,
    /// Median drift tolerated without switching (cents)
    pub hysteresis_cents: f32,
    /// Consecutive consistent frames before the stable pitch jumps
    pub stability_threshold: u32,
    /// How close a median must stay to the pending candidate (semitones)
    pub pending_tolerance_semitones: f32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            window: 7,
            min_confidence: 0.72,
            hysteresis_cents: 40.0,
            stability_threshold: 2,
            pending_tolerance_semitones: 0.1,
        }
    }
}

impl StabilizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window < BOOTSTRAP_SAMPLES {
            return Err(Error::InvalidConfig(format!(
                "Stabilizer window must be at least {}, got {}",
                BOOTSTRAP_SAMPLES, self.window
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::InvalidConfig(format!(
                "min_confidence must be in [0, 1], got {}",
                self.min_confidence
            )));
        }
        if !(self.hysteresis_cents >= 0.0) || !(self.pending_tolerance_semitones > 0.0) {
            return Err(Error::InvalidConfig(
                "Hysteresis and pending tolerance must be positive".into(),
            ));
        }
        if self.stability_threshold == 0 {
            return Err(Error::InvalidConfig(
                "stability_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Observable stabilizer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilizerState {
    /// Fewer than three accepted estimates; raw values pass through
    Bootstrapping,
    /// Median sits inside the hysteresis band of the stable pitch
    Locked,
    /// Median left the band; waiting for it to settle
    Pending,
}

pub struct Stabilizer {
    config: StabilizerConfig,
    history: Box<[f32]>,
    sorted: Box<[f32]>,
    write_pos: usize,
    count: usize,
    stable: Option<f32>,
    pending: Option<f32>,
    pending_count: u32,
}

impl Stabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        let window = config.window.max(1);
        Self {
            config,
            history: vec![0.0; window].into_boxed_slice(),
            sorted: vec![0.0; window].into_boxed_slice(),
            write_pos: 0,
            count: 0,
            stable: None,
            pending: None,
            pending_count: 0,
        }
    }

    /// Feed one raw estimate and get the stable pitch, if any yet.
    pub fn process(&mut self, estimate: &PitchEstimate) -> Option<f32> {
        if !estimate.is_pitched() || estimate.clarity < self.config.min_confidence {
            return self.stable;
        }

        let raw = estimate.frequency_hz;
        self.history[self.write_pos] = raw;
        self.write_pos = (self.write_pos + 1) % self.history.len();
        self.count = (self.count + 1).min(self.history.len());

        if self.count < BOOTSTRAP_SAMPLES {
            self.stable = Some(raw);
            self.clear_pending();
            return self.stable;
        }

        let median = self.median();
        let Some(stable) = self.stable else {
            self.stable = Some(median);
            return self.stable;
        };

        let drift_cents = 100.0 * (freq_to_midi(median) - freq_to_midi(stable));
        if drift_cents.abs() <= self.config.hysteresis_cents {
            self.clear_pending();
            return self.stable;
        }

        match self.pending {
            Some(candidate)
                if (12.0 * (median / candidate).log2()).abs()
                    < self.config.pending_tolerance_semitones =>
            {
                self.pending_count += 1;
            }
            _ => {
                self.pending = Some(median);
                self.pending_count = 1;
            }
        }

        if self.pending_count >= self.config.stability_threshold {
            self.stable = Some(median);
            self.clear_pending();
        }

        self.stable
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.write_pos = 0;
        self.count = 0;
        self.stable = None;
        self.clear_pending();
    }

    pub fn state(&self) -> StabilizerState {
        if self.count < BOOTSTRAP_SAMPLES {
            StabilizerState::Bootstrapping
        } else if self.pending.is_some() {
            StabilizerState::Pending
        } else {
            StabilizerState::Locked
        }
    }

    pub fn stable_pitch(&self) -> Option<f32> {
        self.stable
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    fn clear_pending(&mut self) {
        self.pending = None;
        self.pending_count = 0;
    }

    /// Median of the filled history; even counts use the upper middle value.
    fn median(&mut self) -> f32 {
        let filled = &self.history[..self.count];
        let sorted = &mut self.sorted[..self.count];
        sorted.copy_from_slice(filled);
        sorted.sort_unstable_by(|a, b| a.total_cmp(b));
        sorted[self.count / 2]
    }
}
