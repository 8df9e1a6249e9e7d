//! Test helpers and fixtures for pitchtrack integration tests
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FREQ_RATIO_EPSILON` (1%): raw estimates
//! - `STABLE_HZ_EPSILON` (2 Hz): stabilized readings

#![allow(dead_code)]

pub mod tolerances;

use pitchtrack::prelude::*;
use std::time::{Duration, Instant};

/// Default test sample rate
pub const TEST_SAMPLE_RATE: f64 = 44100.0;

/// Samples pushed per feed step (10 ms at 44.1 kHz)
pub const FEED_BLOCK: usize = 441;

/// Route pipeline logs to the test output. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// Generate silence (zero samples).
pub fn generate_silence(num_samples: usize) -> Vec<f32> {
    vec![0.0; num_samples]
}

/// Generate white noise (random samples in -1..1).
pub fn generate_noise(num_samples: usize, seed: u64) -> Vec<f32> {
    // Simple LCG for reproducible "random" noise
    let mut rng = seed;
    (0..num_samples)
        .map(|_| {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((rng >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0
        })
        .collect()
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Phase-continuous sine pushed into a [`ManualFeeder`] block by block.
pub struct SineFeeder {
    feeder: ManualFeeder,
    frequency: f64,
    amplitude: f32,
    sample_rate: f64,
    position: u64,
    block: Vec<f32>,
}

impl SineFeeder {
    pub fn new(feeder: ManualFeeder, frequency: f64, sample_rate: f64) -> Self {
        Self {
            feeder,
            frequency,
            amplitude: 0.5,
            sample_rate,
            position: 0,
            block: vec![0.0; FEED_BLOCK],
        }
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
    }

    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude;
    }

    /// Push one block. Returns how many samples the pipeline accepted.
    pub fn feed(&mut self) -> usize {
        for sample in self.block.iter_mut() {
            let t = self.position as f64 / self.sample_rate;
            *sample = (2.0 * std::f64::consts::PI * self.frequency * t).sin() as f32 * self.amplitude;
            self.position += 1;
        }
        self.feeder.push(&self.block)
    }
}

/// Feed and poll in roughly real time until `predicate` accepts a reading.
///
/// Returns the accepted reading, or `None` on timeout.
pub fn feed_until(
    handle: &SessionHandle,
    feeder: &mut SineFeeder,
    timeout_ms: u64,
    mut predicate: impl FnMut(&PitchReading) -> bool,
) -> Option<PitchReading> {
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        feeder.feed();
        if let Some(reading) = handle.poll() {
            if predicate(&reading) {
                return Some(reading);
            }
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    None
}

/// Wait until the session has completed at least `ticks` analysis ticks.
pub fn wait_for_ticks(
    handle: &SessionHandle,
    feeder: &mut SineFeeder,
    ticks: u64,
    timeout_ms: u64,
) -> bool {
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        feeder.feed();
        handle.poll();
        if handle.analysis_ticks() >= ticks {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_sine() {
        let samples = generate_sine(440.0, 44100.0, 44100);
        assert_eq!(samples.len(), 44100);
        assert!((rms(&samples) - 0.707).abs() < 0.01);
    }

    #[test]
    fn test_noise_is_reproducible() {
        assert_eq!(generate_noise(64, 7), generate_noise(64, 7));
        assert!(generate_noise(1024, 7).iter().all(|s| (-1.0..=1.0).contains(s)));
    }
}
