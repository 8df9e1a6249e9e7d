//! Shared result channel: the cross-thread publication point for pitch readings.
//!
//! A single writer (the analysis side) publishes after every completed tick;
//! any number of consumer threads read snapshots without locking or allocating.
//! The cell is versioned with a sequence counter: the writer makes the counter
//! odd while fields are being stored and even once the update is complete.
//! Readers retry a bounded number of times when they race a write and then
//! settle for their best-effort copy, so a read can never stall a consumer.

use crate::lockfree::{AtomicDouble, AtomicFlag, AtomicFloat};
use crate::note;
use std::sync::atomic::{fence, AtomicU64, Ordering};

/// Retries before a reader settles for a possibly mixed snapshot.
const MAX_READ_ATTEMPTS: usize = 8;

/// One published pitch reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PitchReading {
    /// Stabilized fundamental frequency in Hz (0.0 when no pitch)
    pub frequency_hz: f32,
    /// Clarity of the current frame's estimate (0.0 - 1.0), 0.0 when the
    /// frame was gated out
    pub clarity: f32,
    /// Linear RMS level of the analysed frame (after input gain)
    pub rms: f32,
    /// True on the tick where a new note or attack was detected
    pub onset: bool,
    /// Estimated latency from capture to publication
    pub latency_ms: f32,
    /// Milliseconds since the session started; non-decreasing per session
    pub timestamp_ms: f64,
}

impl PitchReading {
    /// Check if a pitch is present in this reading.
    pub fn is_pitched(&self) -> bool {
        self.frequency_hz > 0.0 && self.clarity > 0.0
    }

    /// Nearest MIDI note number, if pitched.
    pub fn midi_note(&self) -> Option<u8> {
        if !self.is_pitched() {
            return None;
        }
        note::nearest_note(self.frequency_hz).map(|(note, _)| note)
    }

    /// Cents deviation from the nearest note (-50 to +50), 0.0 if unpitched.
    pub fn cents_offset(&self) -> f32 {
        if !self.is_pitched() {
            return 0.0;
        }
        note::nearest_note(self.frequency_hz)
            .map(|(_, cents)| cents)
            .unwrap_or(0.0)
    }

    /// Note name with sharp notation (e.g. "A4").
    pub fn note_name(&self) -> Option<String> {
        self.midi_note().map(note::note_name)
    }
}

#[inline]
fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Versioned single-writer / multi-reader cell holding the latest [`PitchReading`].
#[derive(Debug)]
pub struct SharedResult {
    sequence: AtomicU64,
    frequency_hz: AtomicFloat,
    clarity: AtomicFloat,
    rms: AtomicFloat,
    onset: AtomicFlag,
    latency_ms: AtomicFloat,
    timestamp_ms: AtomicDouble,
    active: AtomicFlag,
}

impl Default for SharedResult {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedResult {
    pub fn new() -> Self {
        Self {
            sequence: AtomicU64::new(0),
            frequency_hz: AtomicFloat::new(0.0),
            clarity: AtomicFloat::new(0.0),
            rms: AtomicFloat::new(0.0),
            onset: AtomicFlag::new(false),
            latency_ms: AtomicFloat::new(0.0),
            timestamp_ms: AtomicDouble::new(0.0),
            active: AtomicFlag::new(true),
        }
    }

    /// Publish a new reading.
    ///
    /// Must only be called from one thread at a time. Non-finite values are
    /// stored as 0.0 and the timestamp never moves backwards.
    pub fn publish(&self, reading: &PitchReading) {
        let seq = self.sequence.load(Ordering::Relaxed);
        self.sequence.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        let previous_ts = self.timestamp_ms.get_relaxed();
        let timestamp = if reading.timestamp_ms.is_finite() {
            reading.timestamp_ms.max(previous_ts)
        } else {
            previous_ts
        };

        self.frequency_hz
            .set_relaxed(finite_or_zero(reading.frequency_hz).max(0.0));
        self.clarity
            .set_relaxed(finite_or_zero(reading.clarity).clamp(0.0, 1.0));
        self.rms.set_relaxed(finite_or_zero(reading.rms).max(0.0));
        self.onset.set_relaxed(reading.onset);
        self.latency_ms
            .set_relaxed(finite_or_zero(reading.latency_ms).max(0.0));
        self.timestamp_ms.set_relaxed(timestamp);

        self.sequence.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Best-effort snapshot of the latest reading.
    ///
    /// Returns `None` once the cell was invalidated or before anything was published.
    pub fn snapshot(&self) -> Option<PitchReading> {
        if !self.active.get() || self.sequence.load(Ordering::Acquire) == 0 {
            return None;
        }

        let mut reading = self.load_fields();
        for _ in 0..MAX_READ_ATTEMPTS {
            let before = self.sequence.load(Ordering::Acquire);
            if before & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }
            let candidate = self.load_fields();
            fence(Ordering::Acquire);
            reading = candidate;
            if self.sequence.load(Ordering::Relaxed) == before {
                break;
            }
        }

        if !self.active.get() {
            return None;
        }
        Some(reading)
    }

    /// Mark the cell as belonging to a stopped session. Later reads return `None`.
    pub fn invalidate(&self) {
        self.active.set(false);
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Number of completed publications.
    pub fn publish_count(&self) -> u64 {
        self.sequence.load(Ordering::Acquire) / 2
    }

    fn load_fields(&self) -> PitchReading {
        PitchReading {
            frequency_hz: self.frequency_hz.get_relaxed(),
            clarity: self.clarity.get_relaxed(),
            rms: self.rms.get_relaxed(),
            onset: self.onset.get_relaxed(),
            latency_ms: self.latency_ms.get_relaxed(),
            timestamp_ms: self.timestamp_ms.get_relaxed(),
        }
    }
}
