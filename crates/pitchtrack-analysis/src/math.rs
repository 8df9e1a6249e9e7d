//! Level helpers shared by the gate and the analysis chain.

/// Level floor in dB, reported for silent or degenerate frames.
pub const SILENCE_DB: f32 = -96.0;

/// Convert linear amplitude to decibels
#[inline]
pub fn amplitude_to_db(amp: f32) -> f32 {
    if amp <= 0.0 || !amp.is_finite() {
        SILENCE_DB
    } else {
        (20.0 * amp.log10()).max(SILENCE_DB)
    }
}

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_amplitude(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Root-mean-square level of a frame. Empty frames are silent.
#[inline]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}
