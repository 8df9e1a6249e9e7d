//! Pitch estimation with the normalized square difference function (NSDF)
//!
//! McLeod-style monophonic pitch estimator suitable for tuners and
//! singing feedback.
//!
//! ## Algorithm
//!
//! 1. **NSDF** - n'(τ) = 2·Σ x[i]·x[i+τ] / Σ (x[i]² + x[i+τ]²)
//! 2. **Peak picking** - local maxima strictly above both neighbours
//! 3. **Key maximum** - first maximum reaching 0.9 × the highest maximum
//! 4. **Parabolic interpolation** - sub-sample lag accuracy
//!
//! The NSDF is bounded to [-1, 1] and its value at the chosen peak doubles
//! as the clarity of the estimate.
//!
//! ## Performance
//!
//! O(n²) per frame in the time domain. All scratch memory is allocated up
//! front, so `estimate` does not allocate while the frame size is unchanged.

use crate::profile::InstrumentProfile;

/// Floor for NSDF divisors and the interpolation denominator.
const EPSILON: f32 = 1e-6;

/// Fraction of the highest maximum a peak needs to be picked.
const KEY_MAXIMUM_RATIO: f32 = 0.9;

/// Raw estimate for a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize))]
pub struct PitchEstimate {
    /// Fundamental frequency in Hz (0.0 when no pitch)
    pub frequency_hz: f32,
    /// NSDF value at the chosen peak (0.0 - 1.0)
    pub clarity: f32,
}

impl PitchEstimate {
    pub const NONE: PitchEstimate = PitchEstimate {
        frequency_hz: 0.0,
        clarity: 0.0,
    };

    /// Check if this estimate carries a pitch.
    #[inline]
    pub fn is_pitched(&self) -> bool {
        self.frequency_hz > 0.0 && self.clarity > 0.0
    }
}

/// NSDF pitch estimator with preallocated scratch.
pub struct PitchEstimator {
    sample_rate: f64,
    nsdf: Vec<f32>,
}

impl PitchEstimator {
    pub fn new(frame_size: usize, sample_rate: f64) -> Self {
        Self {
            sample_rate,
            nsdf: vec![0.0; frame_size],
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// NSDF of the last analysed frame.
    pub fn nsdf(&self) -> &[f32] {
        &self.nsdf
    }

    /// Estimate the fundamental of `frame`, accepting only frequencies
    /// inside `profile`'s range.
    pub fn estimate(&mut self, frame: &[f32], profile: &InstrumentProfile) -> PitchEstimate {
        let n = frame.len();
        if n < 3 || frame.iter().any(|s| !s.is_finite()) {
            return PitchEstimate::NONE;
        }
        if self.nsdf.len() != n {
            self.nsdf.resize(n, 0.0);
        }

        self.compute_nsdf(frame);

        // Local maxima and their highest value
        let mut highest = f32::NEG_INFINITY;
        let mut found = false;
        for tau in 1..n - 1 {
            let y = self.nsdf[tau];
            if y > self.nsdf[tau - 1] && y > self.nsdf[tau + 1] {
                found = true;
                highest = highest.max(y);
            }
        }
        if !found || highest <= 0.0 {
            return PitchEstimate::NONE;
        }

        let threshold = KEY_MAXIMUM_RATIO * highest;
        let Some(peak) = (1..n - 1).find(|&tau| {
            let y = self.nsdf[tau];
            y > self.nsdf[tau - 1] && y > self.nsdf[tau + 1] && y >= threshold
        }) else {
            return PitchEstimate::NONE;
        };

        let period = self.refine(peak);
        if period <= 0.0 {
            return PitchEstimate::NONE;
        }

        let frequency_hz = (self.sample_rate / period as f64) as f32;
        if !frequency_hz.is_finite() || !profile.contains(frequency_hz) {
            return PitchEstimate::NONE;
        }

        PitchEstimate {
            frequency_hz,
            clarity: self.nsdf[peak].clamp(0.0, 1.0),
        }
    }

    fn compute_nsdf(&mut self, frame: &[f32]) {
        let n = frame.len();

        // m(τ) = Σ_{i<n-τ} x[i]² + x[i+τ]², updated incrementally
        let mut divisor: f64 = 2.0 * frame.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>();

        for tau in 0..n {
            if tau > 0 {
                let head = frame[tau - 1] as f64;
                let tail = frame[n - tau] as f64;
                divisor -= head * head + tail * tail;
            }

            let mut acf = 0.0f32;
            for i in 0..n - tau {
                acf += frame[i] * frame[i + tau];
            }

            let m = (divisor as f32).max(EPSILON);
            self.nsdf[tau] = 2.0 * acf / m;
        }
    }

    /// Parabolic interpolation around the peak at `tau`.
    #[inline]
    fn refine(&self, tau: usize) -> f32 {
        let y0 = self.nsdf[tau - 1];
        let y1 = self.nsdf[tau];
        let y2 = self.nsdf[tau + 1];

        let denom = 2.0 * (y0 - 2.0 * y1 + y2);
        if denom.abs() < EPSILON {
            return tau as f32;
        }
        tau as f32 + (y0 - y2) / denom
    }
}
