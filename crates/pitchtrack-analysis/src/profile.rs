//! Instrument profiles: the frequency range a session accepts.

/// Named frequency range. Estimates outside `[min_hz, max_hz]` are rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize))]
pub struct InstrumentProfile {
    pub name: &'static str,
    pub min_hz: f32,
    pub max_hz: f32,
}

pub const GENERAL: InstrumentProfile = InstrumentProfile {
    name: "general",
    min_hz: 50.0,
    max_hz: 2000.0,
};

const PROFILES: [InstrumentProfile; 6] = [
    GENERAL,
    InstrumentProfile {
        name: "voice",
        min_hz: 80.0,
        max_hz: 1100.0,
    },
    InstrumentProfile {
        name: "bass",
        min_hz: 40.0,
        max_hz: 400.0,
    },
    InstrumentProfile {
        name: "guitar",
        min_hz: 75.0,
        max_hz: 1400.0,
    },
    InstrumentProfile {
        name: "violin",
        min_hz: 180.0,
        max_hz: 3200.0,
    },
    InstrumentProfile {
        name: "flute",
        min_hz: 250.0,
        max_hz: 2500.0,
    },
];

impl InstrumentProfile {
    /// Look up a profile by id, case-insensitively.
    pub fn find(id: &str) -> Option<InstrumentProfile> {
        let id = id.trim();
        PROFILES
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(id))
            .copied()
    }

    /// Look up a profile by id, falling back to `general` for unknown ids.
    pub fn resolve(id: &str) -> InstrumentProfile {
        match Self::find(id) {
            Some(profile) => profile,
            None => {
                tracing::warn!("Unknown instrument profile '{}', using general", id);
                GENERAL
            }
        }
    }

    /// All built-in profiles.
    pub fn all() -> &'static [InstrumentProfile] {
        &PROFILES
    }

    #[inline]
    pub fn contains(&self, frequency_hz: f32) -> bool {
        frequency_hz >= self.min_hz && frequency_hz <= self.max_hz
    }
}

impl Default for InstrumentProfile {
    fn default() -> Self {
        GENERAL
    }
}
