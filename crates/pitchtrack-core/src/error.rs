//! Error types for pitchtrack-core.

use thiserror::Error;

/// Error type for pitchtrack-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("No input device available")]
    NoInputDevice,

    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    #[error("Input stream has ended")]
    StreamEnded,

    #[error("Capture source is already attached")]
    AlreadyAttached,

    #[error("Unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[cfg(feature = "device")]
    #[error("Audio device not available")]
    DeviceNotAvailable(#[from] cpal::DefaultStreamConfigError),

    #[cfg(feature = "device")]
    #[error("Failed to build input stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[cfg(feature = "device")]
    #[error("Failed to start input stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[cfg(feature = "device")]
    #[error("Failed to enumerate devices")]
    DevicesError(#[from] cpal::DevicesError),

    #[cfg(feature = "device")]
    #[error("Failed to get device name")]
    DeviceNameError(#[from] cpal::DeviceNameError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
