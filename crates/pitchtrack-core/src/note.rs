//! Frequency / MIDI note conversions.

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Convert a frequency to a fractional MIDI note number (A4 = 440 Hz = 69).
///
/// Non-positive frequencies map to 0.
#[inline]
pub fn freq_to_midi(freq: f32) -> f32 {
    if freq <= 0.0 {
        return 0.0;
    }
    12.0 * (freq / 440.0).log2() + 69.0
}

/// Convert a (fractional) MIDI note number to a frequency.
#[inline]
pub fn midi_to_freq(note: f32) -> f32 {
    440.0 * 2.0f32.powf((note - 69.0) / 12.0)
}

/// Musical distance between two frequencies in cents (positive when `b` is higher).
#[inline]
pub fn cents_between(a: f32, b: f32) -> f32 {
    100.0 * (freq_to_midi(b) - freq_to_midi(a))
}

/// Nearest MIDI note and the cents deviation from it (-50 to +50).
pub fn nearest_note(freq: f32) -> Option<(u8, f32)> {
    if !(freq > 0.0) || !freq.is_finite() {
        return None;
    }
    let note_float = freq_to_midi(freq);
    let note = note_float.round().clamp(0.0, 127.0) as u8;
    let cents = 100.0 * (note_float - note as f32);
    Some((note, cents))
}

/// Note name with sharp notation (e.g. "A4", "C#5").
pub fn note_name(note: u8) -> String {
    let name = SHARP_NAMES[(note % 12) as usize];
    let octave = (note / 12) as i32 - 1;
    format!("{}{}", name, octave)
}
