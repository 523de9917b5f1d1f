//! Run configuration.

use std::path::PathBuf;

use crate::catalog::{TestCatalog, TestKind};
use crate::error::{Error, Result};
use crate::generator::DEFAULT_SEED;

/// Default number of entities per shape.
pub const DEFAULT_ENTITY_COUNT: usize = 10_000;

/// Configuration of one benchmark session.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Entities created per shape and pair.
    pub entity_count: usize,

    /// Test types to execute, in order. Empty means the whole catalog.
    pub test_types: Vec<TestKind>,

    /// Backends to execute, in order. Empty means every registered backend.
    pub backends: Vec<String>,

    /// Seed of the workload stream.
    pub seed: i64,

    /// How many times the whole matrix is repeated.
    pub runs: usize,

    /// Session directory for on-disk state. None uses a temporary directory.
    pub data_dir: Option<PathBuf>,
}

impl RunConfig {
    /// Create a configuration for the given entity count.
    pub fn new(entity_count: usize) -> Self {
        Self {
            entity_count,
            test_types: Vec::new(),
            backends: Vec::new(),
            seed: DEFAULT_SEED,
            runs: 1,
            data_dir: None,
        }
    }

    /// Select test types by identity.
    pub fn with_test_types(mut self, tests: impl IntoIterator<Item = TestKind>) -> Self {
        self.test_types = tests.into_iter().collect();
        self
    }

    /// Select test types by short name.
    ///
    /// Unknown names fail here, before any backend is touched.
    pub fn with_test_names<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self> {
        self.test_types = TestCatalog::resolve(names)?;
        Ok(self)
    }

    /// Select backends by name.
    pub fn with_backends<S: Into<String>>(mut self, backends: impl IntoIterator<Item = S>) -> Self {
        self.backends = backends.into_iter().map(Into::into).collect();
        self
    }

    /// Set the workload seed.
    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of matrix repetitions.
    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    /// Set the session directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Test types in execution order.
    pub fn selected_tests(&self) -> Vec<TestKind> {
        if self.test_types.is_empty() {
            TestCatalog::all().iter().map(|t| t.kind).collect()
        } else {
            self.test_types.clone()
        }
    }

    /// Check the configuration before any pair runs.
    pub fn validate(&self) -> Result<()> {
        if self.entity_count == 0 {
            return Err(Error::Config("entity count must be positive".to_string()));
        }
        if self.entity_count >= i32::MAX as usize {
            return Err(Error::Config(format!(
                "entity count {} is too large",
                self.entity_count
            )));
        }
        if self.runs == 0 {
            return Err(Error::Config("runs must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENTITY_COUNT)
    }
}
