//! Core plumbing for real-time pitch tracking.
//!
//! # Primary API
//!
//! - [`CaptureSource`]: where samples come from ([`ManualSource`], and
//!   `DeviceSource` with the `"device"` feature)
//! - [`frame_buffer`]: SPSC ring from the capture callback to the analysis side
//! - [`SharedResult`]: lock-free publication cell for [`PitchReading`]s
//! - [`lockfree`]: cache-line aligned atomics shared across threads
//!
//! # Feature-gated APIs
//!
//! - `"device"`: CPAL microphone / line input
//! - `"serialization"`: serde derives on public value types

pub mod capture;
pub mod error;
pub mod frame;
pub mod lockfree;
pub mod note;
pub mod shared;

#[cfg(feature = "device")]
mod device;

pub use capture::{CaptureSource, ManualFeeder, ManualSource, StreamId};
pub use error::{Error, Result};
pub use frame::{frame_buffer, FrameReader, FrameWriter};
pub use lockfree::{AtomicCounter, AtomicDouble, AtomicFlag, AtomicFloat};
pub use note::{cents_between, freq_to_midi, midi_to_freq, nearest_note, note_name};
pub use shared::{PitchReading, SharedResult};

#[cfg(feature = "device")]
pub use device::{DeviceSource, InputDeviceInfo};
