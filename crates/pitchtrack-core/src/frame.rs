//! Analysis frame buffer.
//!
//! The capture side pushes mono samples into a SPSC ring buffer through a
//! [`FrameWriter`]. The analysis side drains the ring into a rolling window
//! of the most recent `frame_size` samples and copies that window out
//! before processing it.
//!
//! When the analysis side falls behind and the ring fills up, the writer
//! evicts the oldest queued samples so the newest audio always gets in.

use crate::lockfree::AtomicCounter;
use parking_lot::Mutex;
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use std::sync::Arc;

/// Samples moved out of the ring per `pop_slice` call.
const DRAIN_CHUNK: usize = 1024;

/// Create a connected writer/reader pair.
///
/// `capacity` is the ring size in samples and bounds how much audio can queue
/// up between two analysis ticks before the capture side starts dropping.
pub fn frame_buffer(frame_size: usize, capacity: usize) -> (FrameWriter, FrameReader) {
    let capacity = capacity.max(frame_size).max(1);
    let rb = HeapRb::<f32>::new(capacity);
    let (producer, consumer) = rb.split();
    let consumer = Arc::new(Mutex::new(consumer));
    let dropped = Arc::new(AtomicCounter::new());

    let writer = FrameWriter {
        producer,
        consumer: consumer.clone(),
        capacity,
        dropped: dropped.clone(),
    };
    let reader = FrameReader {
        consumer,
        window: vec![0.0; frame_size.max(1)].into_boxed_slice(),
        write_pos: 0,
        filled: 0,
        drain_buf: vec![0.0; DRAIN_CHUNK].into_boxed_slice(),
        dropped,
    };
    (writer, reader)
}

/// Capture-side handle. Never allocates or waits.
pub struct FrameWriter {
    producer: HeapProd<f32>,
    /// Shared with the reader so a full ring can drop its oldest samples.
    consumer: Arc<Mutex<HeapCons<f32>>>,
    capacity: usize,
    dropped: Arc<AtomicCounter>,
}

impl FrameWriter {
    /// Push a block of mono samples, evicting the oldest queued samples if
    /// the ring is full. Returns how many were accepted.
    ///
    /// Evicted samples, and new ones that still did not fit, are counted as
    /// dropped.
    #[inline]
    pub fn write(&mut self, block: &[f32]) -> usize {
        // Only the newest `capacity` samples of an oversized block can fit
        let skipped = block.len().saturating_sub(self.capacity);
        let samples = &block[skipped..];

        let vacant = self.producer.vacant_len();
        if samples.len() > vacant {
            self.evict(samples.len() - vacant);
        }

        let written = self.producer.push_slice(samples);
        let rejected = block.len() - written;
        if rejected > 0 {
            self.dropped.add(rejected as u64);
        }
        written
    }

    /// Push a single mono sample, evicting the oldest one if the ring is full.
    #[inline]
    pub fn push(&mut self, sample: f32) -> bool {
        if self.producer.is_full() {
            self.evict(1);
        }
        if self.producer.try_push(sample).is_ok() {
            true
        } else {
            self.dropped.increment();
            false
        }
    }

    /// Discard up to `count` of the oldest queued samples.
    ///
    /// Gives up if the reader is draining right now; it is making room anyway.
    #[inline]
    fn evict(&mut self, count: usize) {
        if let Some(mut consumer) = self.consumer.try_lock() {
            let skipped = consumer.skip(count);
            self.dropped.add(skipped as u64);
        }
    }

    /// Downmix an interleaved block to mono and push it.
    #[inline]
    pub fn write_interleaved(&mut self, data: &[f32], channels: usize) {
        if channels <= 1 {
            self.write(data);
            return;
        }
        let scale = 1.0 / channels as f32;
        for frame in data.chunks_exact(channels) {
            let mono: f32 = frame.iter().sum::<f32>() * scale;
            self.push(mono);
        }
    }

    /// Free space left in the ring, in samples.
    pub fn vacant(&self) -> usize {
        self.producer.vacant_len()
    }
}

/// Analysis-side handle owning the rolling analysis frame.
pub struct FrameReader {
    consumer: Arc<Mutex<HeapCons<f32>>>,
    window: Box<[f32]>,
    write_pos: usize,
    filled: usize,
    drain_buf: Box<[f32]>,
    dropped: Arc<AtomicCounter>,
}

impl FrameReader {
    /// Move everything queued in the ring into the rolling window.
    ///
    /// Returns the number of samples consumed.
    pub fn drain(&mut self) -> usize {
        let frame_size = self.window.len();
        let mut consumer = self.consumer.lock();
        let mut total = 0;
        loop {
            let read = consumer.pop_slice(&mut self.drain_buf);
            if read == 0 {
                break;
            }
            for &sample in &self.drain_buf[..read] {
                self.window[self.write_pos] = sample;
                self.write_pos = (self.write_pos + 1) % frame_size;
            }
            self.filled = (self.filled + read).min(frame_size);
            total += read;
        }
        total
    }

    /// Whether a complete frame has been captured since the last reset.
    pub fn is_ready(&self) -> bool {
        self.filled >= self.window.len()
    }

    /// Copy the most recent frame, oldest sample first, into `out`.
    ///
    /// Returns false (leaving `out` untouched) until a full frame is available.
    pub fn copy_latest(&self, out: &mut [f32]) -> bool {
        if !self.is_ready() || out.len() != self.window.len() {
            return false;
        }
        let tail = self.window.len() - self.write_pos;
        out[..tail].copy_from_slice(&self.window[self.write_pos..]);
        out[tail..].copy_from_slice(&self.window[..self.write_pos]);
        true
    }

    /// Samples queued in the ring and not yet drained.
    pub fn backlog(&self) -> usize {
        self.consumer.lock().occupied_len()
    }

    pub fn frame_size(&self) -> usize {
        self.window.len()
    }

    /// Total samples lost because the ring was full.
    pub fn dropped_samples(&self) -> u64 {
        self.dropped.get()
    }

    /// Shared handle to the dropped-sample counter.
    pub fn dropped_counter(&self) -> Arc<AtomicCounter> {
        self.dropped.clone()
    }

    /// Forget the captured window. Queued samples stay in the ring.
    pub fn reset(&mut self) {
        self.window.fill(0.0);
        self.write_pos = 0;
        self.filled = 0;
    }
}
