//! Centralized error type for the pitchtrack umbrella crate.
//!
//! Wraps the core error so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] pitchtrack_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
