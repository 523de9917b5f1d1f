//! Adapter error types.

use storebench_core::BackendError;
use thiserror::Error;

/// Result alias used by the adapters.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by the reference adapters.
#[derive(Debug, Error)]
pub enum Error {
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// sled storage error.
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// Operation called before `set_up` or after `tear_down`.
    #[error("{0} is not set up")]
    NotOpen(&'static str),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Error> for storebench_core::Error {
    fn from(e: Error) -> Self {
        let message = e.to_string();
        storebench_core::Error::Backend(BackendError::with_source(message, e))
    }
}
