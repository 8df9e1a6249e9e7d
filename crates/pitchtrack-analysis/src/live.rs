//! Live pitch analysis on a dedicated thread.
//!
//! The thread wakes every tick, drains the frame ring fed by the capture
//! callback, runs the [`AnalysisChain`] on the latest frame and publishes a
//! [`PitchReading`] into the session's [`SharedResult`] for lock-free reads
//! from any consumer thread.

use crate::chain::AnalysisChain;
use crate::profile::InstrumentProfile;
use arc_swap::ArcSwap;
use pitchtrack_core::{AtomicCounter, AtomicFlag, FrameReader, PitchReading, SharedResult};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thread_priority::ThreadPriority;

/// Analysis thread name.
pub const THREAD_NAME: &str = "pitchtrack-analysis";

/// Shared state between the analysis side and session handles.
///
/// All fields are lock-free for reads from any thread.
pub struct LiveState {
    /// Latest published reading.
    pub result: SharedResult,
    /// Profile the analysis side should use from its next tick on.
    pub profile: ArcSwap<InstrumentProfile>,
    /// Completed analysis ticks.
    pub ticks: AtomicCounter,
    /// Passes of the analysis loop, including those with nothing to analyse.
    pub iterations: AtomicCounter,
    /// Latency added by the capture source before samples reach the ring.
    input_latency_ms: f32,
    epoch: Instant,
    running: AtomicFlag,
}

impl LiveState {
    pub fn new(profile: InstrumentProfile, input_latency_ms: f32) -> Self {
        Self {
            result: SharedResult::new(),
            profile: ArcSwap::from_pointee(profile),
            ticks: AtomicCounter::new(),
            iterations: AtomicCounter::new(),
            input_latency_ms: input_latency_ms.max(0.0),
            epoch: Instant::now(),
            running: AtomicFlag::new(true),
        }
    }

    /// Signal the analysis side to stop.
    pub fn stop(&self) {
        self.running.set(false);
    }

    /// Check if the analysis side should keep running.
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Request a profile change, applied on the next tick.
    pub fn set_profile(&self, profile: InstrumentProfile) {
        self.profile.store(Arc::new(profile));
    }

    pub fn current_profile(&self) -> InstrumentProfile {
        **self.profile.load()
    }

    /// Milliseconds since the session started.
    pub fn elapsed_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    pub fn input_latency_ms(&self) -> f32 {
        self.input_latency_ms
    }
}

/// Analysis side of a session: the frame reader, the chain and a
/// preallocated frame copy.
///
/// Used by the live thread and, when no thread can be spawned, directly on
/// the consumer's thread.
pub struct AnalysisWorker {
    reader: FrameReader,
    chain: AnalysisChain,
    frame: Box<[f32]>,
    state: Arc<LiveState>,
}

impl AnalysisWorker {
    pub fn new(reader: FrameReader, chain: AnalysisChain, state: Arc<LiveState>) -> Self {
        let frame = vec![0.0; reader.frame_size()].into_boxed_slice();
        Self {
            reader,
            chain,
            frame,
            state,
        }
    }

    /// Run one tick: drain, analyse, publish.
    ///
    /// Returns true if a reading was published. Nothing is analysed when no
    /// new samples arrived since the last tick.
    pub fn tick(&mut self) -> bool {
        let started = Instant::now();

        let profile = self.state.profile.load();
        if **profile != *self.chain.profile() {
            tracing::debug!("Switching analysis profile to {}", profile.name);
            self.chain.set_profile(**profile);
        }
        drop(profile);

        if self.reader.drain() == 0 || !self.reader.copy_latest(&mut self.frame) {
            return false;
        }

        let output = self.chain.process(&mut self.frame);

        // Work finished after stop() is discarded
        if !self.state.is_running() {
            return false;
        }

        let processing_ms = started.elapsed().as_secs_f32() * 1000.0;
        let reading = PitchReading {
            frequency_hz: output.frequency_hz,
            clarity: output.clarity,
            rms: output.rms,
            onset: output.onset,
            latency_ms: self.chain.frame_latency_ms()
                + processing_ms
                + self.state.input_latency_ms(),
            timestamp_ms: self.state.elapsed_ms(),
        };
        self.state.result.publish(&reading);
        self.state.ticks.increment();
        true
    }

    pub fn state(&self) -> &Arc<LiveState> {
        &self.state
    }

    pub fn chain(&self) -> &AnalysisChain {
        &self.chain
    }

    /// Samples the capture side dropped because the ring was full.
    pub fn dropped_samples(&self) -> u64 {
        self.reader.dropped_samples()
    }

    /// Shared handle to the dropped-sample counter, readable after the
    /// worker moved to its thread.
    pub fn dropped_counter(&self) -> Arc<AtomicCounter> {
        self.reader.dropped_counter()
    }
}

/// Run the live analysis loop.
///
/// Ticks every `tick_interval` until `state.stop()` is called. The loop
/// parks between ticks, so unparking the thread after `stop()` ends it
/// without waiting for the interval.
pub fn run_analysis_thread(mut worker: AnalysisWorker, tick_interval: Duration) {
    while worker.state().is_running() {
        let started = Instant::now();
        worker.state().iterations.increment();
        worker.tick();

        let elapsed = started.elapsed();
        if elapsed < tick_interval && worker.state().is_running() {
            thread::park_timeout(tick_interval - elapsed);
        }
    }
}

/// Spawn the named analysis thread with raised priority.
pub fn spawn_analysis_thread(
    worker: AnalysisWorker,
    tick_interval: Duration,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(THREAD_NAME.into())
        .spawn(move || {
            if let Err(e) = thread_priority::set_current_thread_priority(ThreadPriority::Max) {
                tracing::debug!("Could not raise analysis thread priority: {:?}", e);
            }
            run_analysis_thread(worker, tick_interval);
        })
}
