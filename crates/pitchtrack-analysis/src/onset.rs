//! Tick-level onset detection.
//!
//! Energy based: an onset is reported when the gate opens, when the level
//! jumps by at least `rise_db` between ticks, or when the stable pitch moves
//! to a different note. Onsets closer than `min_gap_ticks` are merged.

use pitchtrack_core::cents_between;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct OnsetConfig {
    /// Level rise between consecutive ticks that counts as an attack (dB)
    pub rise_db: f32,
    /// Stable-pitch change that counts as a new note (cents)
    pub note_change_cents: f32,
    /// Minimum ticks between two reported onsets
    pub min_gap_ticks: u32,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            rise_db: 9.0,
            note_change_cents: 50.0,
            min_gap_ticks: 4,
        }
    }
}

pub struct OnsetDetector {
    config: OnsetConfig,
    prev_usable: bool,
    prev_rms_db: Option<f32>,
    prev_pitch: Option<f32>,
    ticks_since_onset: u32,
}

impl OnsetDetector {
    pub fn new(config: OnsetConfig) -> Self {
        let ticks_since_onset = config.min_gap_ticks;
        Self {
            config,
            prev_usable: false,
            prev_rms_db: None,
            prev_pitch: None,
            ticks_since_onset,
        }
    }

    /// Feed one tick. Returns true if this tick starts a new event.
    pub fn process(&mut self, usable: bool, rms_db: f32, stable_pitch: Option<f32>) -> bool {
        let gate_opened = usable && !self.prev_usable;
        let level_rise = usable
            && self
                .prev_rms_db
                .is_some_and(|prev| rms_db - prev >= self.config.rise_db);
        let note_change = match (self.prev_pitch, stable_pitch) {
            (Some(prev), Some(current)) => {
                cents_between(prev, current).abs() >= self.config.note_change_cents
            }
            _ => false,
        };

        let onset = (gate_opened || level_rise || note_change)
            && self.ticks_since_onset >= self.config.min_gap_ticks;

        if onset {
            self.ticks_since_onset = 0;
        } else {
            self.ticks_since_onset = self.ticks_since_onset.saturating_add(1);
        }

        self.prev_usable = usable;
        self.prev_rms_db = Some(rms_db);
        if stable_pitch.is_some() || !usable {
            self.prev_pitch = stable_pitch;
        }

        onset
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}
