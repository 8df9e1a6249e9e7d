//! Backend selection for a session.

use crate::PipelineConfig;
use pitchtrack_core::CaptureSource;

/// Where a session's analysis runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize))]
pub enum Backend {
    /// Dedicated analysis thread sharing the frame ring with the capture callback
    SharedMemory,
    /// Analysis runs inside `poll` on the consumer's thread
    Polling,
}

impl Backend {
    /// Decide the backend once, at session start.
    ///
    /// A failed thread spawn also ends up on [`Backend::Polling`]; that is
    /// handled by the pipeline when it happens.
    pub fn detect(config: &PipelineConfig, source: &dyn CaptureSource) -> Backend {
        if config.force_polling {
            return Backend::Polling;
        }
        if !source.supports_shared_memory() {
            tracing::warn!("Capture source cannot share memory, analysing on poll");
            return Backend::Polling;
        }
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        if cores < 2 {
            tracing::warn!("Single core available, analysing on poll");
            return Backend::Polling;
        }
        Backend::SharedMemory
    }
}
