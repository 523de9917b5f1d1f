//! Core error types.

use thiserror::Error;

use crate::backend::BackendError;

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

/// Core benchmark errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid count or bounds passed to the workload generator.
    #[error("generator misuse: {0}")]
    GeneratorMisuse(String),

    /// Phase start/stop called out of order.
    #[error("phase discipline violated: {0}")]
    PhaseDiscipline(String),

    /// Unknown test type requested.
    #[error("unknown test type: {0}")]
    CatalogLookup(String),

    /// Unknown backend requested.
    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    /// Backend registered twice under the same name.
    #[error("backend already registered: {0}")]
    DuplicateBackend(String),

    /// Invalid run configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A backend returned data that does not match what was written.
    #[error("verification failed: {0}")]
    Verification(String),

    /// Failure reported by a storage backend.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Adapter code panicked.
    #[error("panicked: {0}")]
    Panicked(String),

    /// Adapter failed while setting up.
    #[error("{backend}: setup failed: {source}")]
    AdapterSetup {
        backend: String,
        #[source]
        source: Box<Error>,
    },

    /// Adapter failed while running a test type.
    #[error("{backend}/{test}: run failed: {source}")]
    AdapterRun {
        backend: String,
        test: String,
        #[source]
        source: Box<Error>,
    },

    /// Adapter failed while tearing down.
    #[error("{backend}: teardown failed: {source}")]
    AdapterTeardown {
        backend: String,
        #[source]
        source: Box<Error>,
    },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
