//! Session handles.

use crate::capability::Backend;
use crate::fallback::PollingEstimator;
use pitchtrack_analysis::{InstrumentProfile, LiveState};
use pitchtrack_core::{AtomicCounter, PitchReading, StreamId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub(crate) struct SessionShared {
    pub(crate) id: u64,
    pub(crate) stream_id: StreamId,
    pub(crate) backend: Backend,
    pub(crate) state: Arc<LiveState>,
    pub(crate) dropped: Arc<AtomicCounter>,
    pub(crate) fallback: Option<PollingEstimator>,
}

impl SessionShared {
    pub(crate) fn next_id() -> u64 {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        NEXT.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn poll(&self) -> Option<PitchReading> {
        if let Some(fallback) = &self.fallback {
            fallback.poll();
        }
        self.state.result.snapshot()
    }
}

/// Handle to one running (or stopped) pipeline session.
///
/// Cheap to clone and safe to poll from any thread. Once the session is
/// stopped every read returns `None`.
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) shared: Arc<SessionShared>,
}

impl SessionHandle {
    pub(crate) fn new(shared: SessionShared) -> Self {
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Latest reading of this session, `None` before the first tick or after stop.
    ///
    /// On the polling backend this also runs the analysis tick when one is due.
    pub fn poll(&self) -> Option<PitchReading> {
        self.shared.poll()
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn stream_id(&self) -> StreamId {
        self.shared.stream_id
    }

    pub fn backend(&self) -> Backend {
        self.shared.backend
    }

    /// Profile in effect from the next tick on.
    pub fn profile(&self) -> InstrumentProfile {
        self.shared.state.current_profile()
    }

    pub fn is_active(&self) -> bool {
        self.shared.state.result.is_active()
    }

    /// Completed analysis ticks.
    pub fn analysis_ticks(&self) -> u64 {
        self.shared.state.ticks.get()
    }

    /// Passes of the analysis loop, whether or not they published.
    pub fn analysis_iterations(&self) -> u64 {
        self.shared.state.iterations.get()
    }

    /// Samples the capture side dropped because analysis fell behind.
    pub fn dropped_samples(&self) -> u64 {
        self.shared.dropped.get()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.shared.id)
            .field("stream_id", &self.shared.stream_id)
            .field("backend", &self.shared.backend)
            .field("active", &self.is_active())
            .finish()
    }
}
