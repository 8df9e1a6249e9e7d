//! Capture sources: where the samples of a session come from.

use crate::frame::FrameWriter;
use crate::lockfree::AtomicFlag;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity of an input stream, used to decide whether a `start` call
/// refers to the stream that is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

impl StreamId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        StreamId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A live audio input the pipeline can tap.
///
/// `attach` hands over the capture-side writer; the source must only ever
/// write samples through it from its real-time callback, never block on it.
pub trait CaptureSource: Send {
    fn stream_id(&self) -> StreamId;

    fn sample_rate(&self) -> f64;

    /// Start delivering mono samples into `writer`.
    fn attach(&mut self, writer: FrameWriter) -> Result<()>;

    /// Stop delivering samples and release the writer.
    fn detach(&mut self);

    /// Whether the capture callback can share memory with a background
    /// analysis thread. Sources that cannot are analysed on the consumer's
    /// polling cadence instead.
    fn supports_shared_memory(&self) -> bool {
        true
    }

    /// Input latency reported by the platform, if known.
    fn input_latency_ms(&self) -> f32 {
        0.0
    }
}

type WriterSlot = Arc<Mutex<Option<FrameWriter>>>;

/// Source fed by hand through a [`ManualFeeder`], from any thread.
///
/// Useful for tests, offline material and hosts that own their own audio
/// callback and only want to forward samples.
pub struct ManualSource {
    id: StreamId,
    sample_rate: f64,
    shared_memory: bool,
    slot: WriterSlot,
    ended: Arc<AtomicFlag>,
}

impl ManualSource {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_id(StreamId::next(), sample_rate)
    }

    pub fn with_id(id: StreamId, sample_rate: f64) -> Self {
        Self {
            id,
            sample_rate,
            shared_memory: true,
            slot: Arc::new(Mutex::new(None)),
            ended: Arc::new(AtomicFlag::new(false)),
        }
    }

    /// Report that this source cannot share memory with another thread.
    pub fn without_shared_memory(mut self) -> Self {
        self.shared_memory = false;
        self
    }

    /// Handle for pushing samples into whichever session this source is attached to.
    pub fn feeder(&self) -> ManualFeeder {
        ManualFeeder {
            slot: self.slot.clone(),
            ended: self.ended.clone(),
        }
    }
}

impl CaptureSource for ManualSource {
    fn stream_id(&self) -> StreamId {
        self.id
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn attach(&mut self, writer: FrameWriter) -> Result<()> {
        if self.ended.get() {
            return Err(Error::StreamEnded);
        }
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(Error::AlreadyAttached);
        }
        *slot = Some(writer);
        Ok(())
    }

    fn detach(&mut self) {
        self.slot.lock().take();
    }

    fn supports_shared_memory(&self) -> bool {
        self.shared_memory
    }
}

/// Pushes samples into a [`ManualSource`].
#[derive(Clone)]
pub struct ManualFeeder {
    slot: WriterSlot,
    ended: Arc<AtomicFlag>,
}

impl ManualFeeder {
    /// Push mono samples. Returns how many were accepted.
    ///
    /// Never waits: if the source is detached, being detached concurrently,
    /// or the ring is full, samples are discarded.
    pub fn push(&self, samples: &[f32]) -> usize {
        if self.ended.get() {
            return 0;
        }
        match self.slot.try_lock() {
            Some(mut guard) => match guard.as_mut() {
                Some(writer) => writer.write(samples),
                None => 0,
            },
            None => 0,
        }
    }

    /// Whether a session currently consumes this source.
    pub fn is_attached(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Mark the stream as finished. Later `attach` calls fail with
    /// [`Error::StreamEnded`].
    pub fn end(&self) {
        self.ended.set(true);
        self.slot.lock().take();
    }
}
