//! Polling fallback: run the analysis chain on the consumer's thread.

use parking_lot::Mutex;
use pitchtrack_analysis::AnalysisWorker;
use std::time::{Duration, Instant};

struct PollingInner {
    worker: AnalysisWorker,
    last_tick: Option<Instant>,
}

/// Drives an [`AnalysisWorker`] from `poll` calls instead of a thread.
///
/// At most one tick runs per `tick_interval`. Consumers that find another
/// consumer mid-tick skip the tick instead of waiting for it.
pub struct PollingEstimator {
    inner: Mutex<PollingInner>,
    tick_interval: Duration,
}

impl PollingEstimator {
    pub fn new(worker: AnalysisWorker, tick_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(PollingInner {
                worker,
                last_tick: None,
            }),
            tick_interval,
        }
    }

    /// Run a tick if one is due. Returns true if a reading was published.
    pub fn poll(&self) -> bool {
        let Some(mut inner) = self.inner.try_lock() else {
            return false;
        };
        if !inner.worker.state().is_running() {
            return false;
        }
        if let Some(last) = inner.last_tick {
            if last.elapsed() < self.tick_interval {
                return false;
            }
        }
        inner.last_tick = Some(Instant::now());
        inner.worker.state().iterations.increment();
        inner.worker.tick()
    }
}
