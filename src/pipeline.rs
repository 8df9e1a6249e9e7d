//! Pipeline orchestrator: owns the running session and its resources.

use crate::capability::Backend;
use crate::config::{validate_sample_rate, PipelineConfig};
use crate::fallback::PollingEstimator;
use crate::session::{SessionHandle, SessionShared};
use crate::{PitchPipelineBuilder, Result};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use pitchtrack_analysis::{
    spawn_analysis_thread, AnalysisChain, AnalysisWorker, InstrumentProfile, LiveState,
};
use pitchtrack_core::{frame_buffer, CaptureSource, PitchReading};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Everything a running session owns. Dropping it tears the session down.
struct ActiveSession {
    handle: SessionHandle,
    source: Box<dyn CaptureSource>,
    thread: Option<JoinHandle<()>>,
}

impl ActiveSession {
    fn halt(&mut self) {
        let state = &self.handle.shared.state;
        state.stop();

        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.join().is_err() {
                tracing::warn!("Analysis thread panicked");
            }
        }

        self.source.detach();
        state.result.invalidate();
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.halt();
        tracing::info!("Stopped pitch session {}", self.handle.id());
    }
}

/// Real-time pitch tracking pipeline.
///
/// Runs at most one session at a time, bound to one capture source. Readings
/// are published into a lock-free cell and read with [`PitchPipeline::poll`]
/// (or [`SessionHandle::poll`]) from any thread, at any rate.
///
/// # Example
///
/// ```
/// use pitchtrack::prelude::*;
///
/// let pipeline = PitchPipeline::builder().build()?;
/// let source = ManualSource::new(44100.0);
/// let feeder = source.feeder();
///
/// let session = pipeline.start(Box::new(source), "voice")?;
/// feeder.push(&[0.0; 1024]);
///
/// // None until the first tick has run
/// let _reading = pipeline.poll(&session);
///
/// pipeline.stop(&session);
/// assert!(pipeline.poll(&session).is_none());
/// # Ok::<(), pitchtrack::Error>(())
/// ```
pub struct PitchPipeline {
    config: PipelineConfig,
    active: Mutex<Option<ActiveSession>>,
    current: ArcSwapOption<SessionShared>,
}

impl PitchPipeline {
    pub fn builder() -> PitchPipelineBuilder {
        PitchPipelineBuilder::default()
    }

    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            active: Mutex::new(None),
            current: ArcSwapOption::empty(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Start tracking `source` with the profile named `profile_id`.
    ///
    /// - Same stream and profile as the running session: returns its handle.
    /// - Same stream, other profile: swaps the profile in place and returns
    ///   the running handle. Stabilizer history is reset on the next tick.
    /// - Different stream: stops the running session and starts a new one.
    ///
    /// Unknown profile ids fall back to `general`.
    pub fn start(&self, source: Box<dyn CaptureSource>, profile_id: &str) -> Result<SessionHandle> {
        let profile = InstrumentProfile::resolve(profile_id);
        let mut active = self.active.lock();

        if let Some(session) = active.as_ref() {
            if session.handle.stream_id() == source.stream_id() && session.handle.is_active() {
                let state = &session.handle.shared.state;
                if state.current_profile() != profile {
                    tracing::info!(
                        "Switching session {} to profile {}",
                        session.handle.id(),
                        profile.name
                    );
                    state.set_profile(profile);
                }
                return Ok(session.handle.clone());
            }
        }

        // Tear down the previous session before attaching the new source
        if let Some(previous) = active.take() {
            self.current.store(None);
            drop(previous);
        }

        let session = self.launch(source, profile)?;
        let handle = session.handle.clone();
        self.current.store(Some(handle.shared.clone()));
        *active = Some(session);

        tracing::info!(
            "Started pitch session {} ({:?}, profile {})",
            handle.id(),
            handle.backend(),
            profile.name
        );
        Ok(handle)
    }

    /// Stop the session behind `handle`. Idempotent; stale handles are ignored.
    pub fn stop(&self, handle: &SessionHandle) {
        let mut active = self.active.lock();
        let is_current = active
            .as_ref()
            .is_some_and(|session| session.handle.id() == handle.id());
        if is_current {
            self.current.store(None);
            active.take();
        }
    }

    /// Stop whatever session is running.
    pub fn stop_all(&self) {
        self.current.store(None);
        self.active.lock().take();
    }

    /// Latest reading of `handle`'s session, `None` once it is stopped.
    pub fn poll(&self, handle: &SessionHandle) -> Option<PitchReading> {
        handle.poll()
    }

    /// Latest reading of the running session, if any. Never blocks.
    pub fn latest(&self) -> Option<PitchReading> {
        self.current.load().as_ref().and_then(|shared| shared.poll())
    }

    /// Handle of the running session, if any.
    pub fn current_session(&self) -> Option<SessionHandle> {
        self.active
            .lock()
            .as_ref()
            .map(|session| session.handle.clone())
    }

    fn launch(
        &self,
        mut source: Box<dyn CaptureSource>,
        profile: InstrumentProfile,
    ) -> Result<ActiveSession> {
        validate_sample_rate(source.sample_rate())?;

        let mut backend = Backend::detect(&self.config, source.as_ref());
        let (worker, mut state) = self.attach(source.as_mut(), profile)?;
        let mut dropped = worker.dropped_counter();
        let mut thread = None;
        let mut fallback = None;

        if backend == Backend::SharedMemory {
            match spawn_analysis_thread(worker, self.config.tick_interval) {
                Ok(handle) => thread = Some(handle),
                Err(e) => {
                    tracing::warn!("Failed to spawn analysis thread ({}), analysing on poll", e);
                    // The worker went down with the failed spawn; attach a fresh one
                    source.detach();
                    let (worker, rebuilt) = self.attach(source.as_mut(), profile)?;
                    dropped = worker.dropped_counter();
                    state = rebuilt;
                    fallback = Some(PollingEstimator::new(worker, self.config.tick_interval));
                    backend = Backend::Polling;
                }
            }
        } else {
            fallback = Some(PollingEstimator::new(worker, self.config.tick_interval));
        }

        let handle = SessionHandle::new(SessionShared {
            id: SessionShared::next_id(),
            stream_id: source.stream_id(),
            backend,
            state,
            dropped,
            fallback,
        });
        Ok(ActiveSession {
            handle,
            source,
            thread,
        })
    }

    fn attach(
        &self,
        source: &mut dyn CaptureSource,
        profile: InstrumentProfile,
    ) -> Result<(AnalysisWorker, Arc<LiveState>)> {
        let (writer, reader) = frame_buffer(self.config.frame_size, self.config.ring_capacity);
        source.attach(writer)?;

        let chain = AnalysisChain::new(
            self.config.frame_size,
            source.sample_rate(),
            profile,
            self.config.chain.clone(),
        );
        let state = Arc::new(LiveState::new(profile, source.input_latency_ms()));
        Ok((AnalysisWorker::new(reader, chain, state.clone()), state))
    }
}

impl Default for PitchPipeline {
    fn default() -> Self {
        Self {
            config: PipelineConfig::default(),
            active: Mutex::new(None),
            current: ArcSwapOption::empty(),
        }
    }
}

impl Drop for PitchPipeline {
    fn drop(&mut self) {
        self.stop_all();
    }
}
