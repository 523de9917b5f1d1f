//! Reference storage adapters for storebench.
//!
//! # Adapters
//!
//! - **memory**: ordered in-process maps with hash indexes, the baseline
//! - **sqlite**: a file-backed SQLite database through rusqlite
//! - **sled**: an embedded sled database with rkyv encoded records
//!
//! All three run the canonical scenarios of `storebench_core::scenario`, so
//! they receive identical data and operation order.

pub mod error;
pub mod memory;
pub mod sled_store;
pub mod sqlite;
mod workdir;

pub use error::{Error, Result};
pub use memory::MemoryBackend;
pub use sled_store::SledBackend;
pub use sqlite::SqliteBackend;

use storebench_core::BackendRegistry;

/// Names of the bundled adapters in registration order.
pub const BACKEND_NAMES: [&str; 3] = [memory::NAME, sqlite::NAME, sled_store::NAME];

/// Registry holding every bundled adapter.
pub fn default_registry() -> storebench_core::Result<BackendRegistry> {
    BackendRegistry::new()
        .with(MemoryBackend::new())?
        .with(SqliteBackend::new())?
        .with(SledBackend::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_order() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.names(), BACKEND_NAMES.map(String::from).to_vec());
    }
}
