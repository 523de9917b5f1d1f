//! Backend contract.
//!
//! Every storage engine under test implements [`BackendAdapter`]. Adapters that
//! want the canonical workload implement [`EntityStore`] as well and delegate
//! `run` to [`crate::scenario::execute`], which guarantees identical data and
//! operation order across engines.

use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::{TestKind, TestType};
use crate::clock::{PhaseClock, PhaseRecord};
use crate::entity::{EntityFactory, EntityKind, SimpleEntity};
use crate::error::{Error, Result};
use crate::generator::WorkloadGenerator;

/// Failure reported by a storage engine.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendError {
    /// Create an error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Information handed to [`BackendAdapter::set_up`].
#[derive(Debug, Clone)]
pub struct SetupContext {
    data_dir: PathBuf,
    run: usize,
}

impl SetupContext {
    /// Create a setup context rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>, run: usize) -> Self {
        Self {
            data_dir: data_dir.into(),
            run,
        }
    }

    /// Directory reserved for one adapter's on-disk state.
    pub fn backend_dir(&self, backend: &str) -> PathBuf {
        self.data_dir.join(backend)
    }

    /// Zero-based repetition index of the matrix.
    pub fn run(&self) -> usize {
        self.run
    }
}

/// Per-pair state handed to [`BackendAdapter::run`].
///
/// Owns the phase clock and a freshly seeded entity factory, so every pair
/// starts from the same point of the workload stream.
#[derive(Debug)]
pub struct RunContext {
    test: TestKind,
    entity_count: usize,
    generator: WorkloadGenerator,
    factory: EntityFactory,
    clock: PhaseClock,
}

impl RunContext {
    /// Create a context for one (backend, test type) pair.
    pub fn new(test: TestKind, entity_count: usize, generator: WorkloadGenerator) -> Self {
        Self {
            test,
            entity_count,
            generator,
            factory: EntityFactory::new(&generator),
            clock: PhaseClock::new(),
        }
    }

    /// Test type being executed.
    pub fn test(&self) -> TestKind {
        self.test
    }

    /// Number of entities per shape.
    pub fn entity_count(&self) -> usize {
        self.entity_count
    }

    /// Generator used for probe and index selection.
    pub fn generator(&self) -> &WorkloadGenerator {
        &self.generator
    }

    /// Factory producing this pair's entities.
    pub fn factory_mut(&mut self) -> &mut EntityFactory {
        &mut self.factory
    }

    /// Hex digest of all entity values produced so far.
    pub fn fingerprint(&self) -> String {
        self.factory.fingerprint()
    }

    /// The phase clock.
    pub fn clock(&self) -> &PhaseClock {
        &self.clock
    }

    /// Mutable access to the phase clock for manual start/stop pairs.
    pub fn clock_mut(&mut self) -> &mut PhaseClock {
        &mut self.clock
    }

    /// Run `f` as a timed phase named `label`.
    pub fn phase<T>(&mut self, label: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.clock.time(label, f)
    }

    /// Fail if the adapter left a phase open.
    pub fn ensure_closed(&self) -> Result<()> {
        match self.clock.running() {
            Some(label) => Err(Error::PhaseDiscipline(format!(
                "phase '{}' was never stopped",
                label
            ))),
            None => Ok(()),
        }
    }

    /// Consume the context, returning completed phases and the fingerprint.
    pub fn finish(self) -> (Vec<PhaseRecord>, String) {
        let fingerprint = self.factory.fingerprint();
        (self.clock.into_records(), fingerprint)
    }
}

/// Capability interface of a storage engine under test.
pub trait BackendAdapter {
    /// Human-readable identity shown in reports. Must be unique per registry.
    fn name(&self) -> &str;

    /// Engine version banner, logged once per adapter by the runner after the
    /// first successful setup.
    fn version(&self) -> Option<String> {
        None
    }

    /// Open the engine's storage below [`SetupContext::backend_dir`].
    fn set_up(&mut self, ctx: &SetupContext) -> Result<()>;

    /// Execute one test type, delimiting phases with the context's clock.
    fn run(&mut self, test: &TestType, ctx: &mut RunContext) -> Result<()>;

    /// Release every resource, including on-disk state.
    fn tear_down(&mut self) -> Result<()>;
}

/// Storage primitives the canonical scenarios are written against.
///
/// Batch operations should use the engine's bulk or transactional path, the
/// way an application would.
pub trait EntityStore {
    /// Number of stored entities of a shape.
    fn count(&mut self, kind: EntityKind) -> Result<usize>;

    /// Insert new entities.
    fn insert(&mut self, kind: EntityKind, entities: &[SimpleEntity]) -> Result<()>;

    /// Overwrite existing entities by id.
    fn update(&mut self, kind: EntityKind, entities: &[SimpleEntity]) -> Result<()>;

    /// Load every entity of a shape.
    fn load_all(&mut self, kind: EntityKind) -> Result<Vec<SimpleEntity>>;

    /// Load one entity by id.
    fn get(&mut self, kind: EntityKind, id: i64) -> Result<Option<SimpleEntity>>;

    /// Entities whose string field equals `value` (case-sensitive).
    fn find_by_string(&mut self, kind: EntityKind, value: &str) -> Result<Vec<SimpleEntity>>;

    /// Entities whose integer field equals `value`.
    fn find_by_int(&mut self, kind: EntityKind, value: i32) -> Result<Vec<SimpleEntity>>;

    /// Delete entities by id.
    fn delete(&mut self, kind: EntityKind, ids: &[i64]) -> Result<()>;

    /// Delete every entity of a shape.
    fn delete_all(&mut self, kind: EntityKind) -> Result<()>;
}

/// Ordered name-to-adapter map of the engines available for a session.
#[derive(Default)]
pub struct BackendRegistry {
    backends: Vec<Box<dyn BackendAdapter>>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own name.
    pub fn register(&mut self, adapter: Box<dyn BackendAdapter>) -> Result<()> {
        if self.contains(adapter.name()) {
            return Err(Error::DuplicateBackend(adapter.name().to_string()));
        }
        self.backends.push(adapter);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, adapter: impl BackendAdapter + 'static) -> Result<Self> {
        self.register(Box::new(adapter))?;
        Ok(self)
    }

    /// Whether an adapter with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.backends.iter().any(|b| b.name() == name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    /// Mutable access to one adapter.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn BackendAdapter + 'static)> {
        self.backends
            .iter_mut()
            .find(|b| b.name() == name)
            .map(|b| b.as_mut())
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether no adapter is registered.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}
