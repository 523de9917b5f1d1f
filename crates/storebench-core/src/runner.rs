//! Sequencing of (backend, test type) pairs.
//!
//! Pairs run strictly one after another: repetition, then backend, then test
//! type. Each pair is hermetic. The adapter is set up, runs exactly one test
//! type and is torn down again before the next pair starts, so no pair can
//! observe state left behind by another.

use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backend::{BackendAdapter, BackendRegistry, RunContext, SetupContext};
use crate::catalog::{TestCatalog, TestType};
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::generator::WorkloadGenerator;
use crate::report::{BenchmarkReport, FailureStage, PairReport, PairState};

/// Cooperative cancellation flag, checked between pairs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the session stops before the next pair.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of one pair plus whether its backend must be halted.
struct PairOutcome {
    report: PairReport,
    halt: Option<String>,
}

/// Drives a [`RunConfig`] against a [`BackendRegistry`].
pub struct BenchmarkRunner {
    registry: BackendRegistry,
    config: RunConfig,
    banners: HashSet<String>,
    cancel: CancelToken,
}

impl BenchmarkRunner {
    /// Create a runner.
    pub fn new(registry: BackendRegistry, config: RunConfig) -> Self {
        Self {
            registry,
            config,
            banners: HashSet::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Token that stops the session before the next pair when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Backend names in execution order.
    ///
    /// Uses the configured order when backends were selected, registration
    /// order otherwise.
    fn resolve_backends(&self) -> Result<Vec<String>> {
        if self.config.backends.is_empty() {
            return Ok(self.registry.names());
        }
        for name in &self.config.backends {
            if !self.registry.contains(name) {
                return Err(Error::UnknownBackend(name.clone()));
            }
        }
        Ok(self.config.backends.clone())
    }

    /// Execute the whole matrix.
    ///
    /// Configuration problems fail before any adapter is touched. Adapter
    /// failures never abort the session; they are recorded per pair.
    pub fn run(&mut self) -> Result<BenchmarkReport> {
        self.config.validate()?;
        let backends = self.resolve_backends()?;
        let tests: Vec<&'static TestType> = self
            .config
            .selected_tests()
            .into_iter()
            .map(TestCatalog::by_identity)
            .collect();

        // Keeps a temporary session directory alive until the report is built.
        let mut _session = None;
        let data_dir: PathBuf = match &self.config.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                dir.clone()
            }
            None => {
                let dir = tempfile::Builder::new().prefix("storebench-").tempdir()?;
                let path = dir.path().to_path_buf();
                _session = Some(dir);
                path
            }
        };

        let generator = WorkloadGenerator::new(self.config.seed);
        let mut report = BenchmarkReport::new(&self.config);

        tracing::info!(
            entity_count = self.config.entity_count,
            seed = generator.seed(),
            runs = self.config.runs,
            backends = ?backends,
            tests = tests.len(),
            data_dir = %data_dir.display(),
            "starting benchmark"
        );

        'runs: for run in 0..self.config.runs {
            let setup = SetupContext::new(&data_dir, run);
            for name in &backends {
                let adapter = self
                    .registry
                    .get_mut(name)
                    .ok_or_else(|| Error::UnknownBackend(name.clone()))?;

                let mut halted: Option<String> = None;
                for &test in &tests {
                    if self.cancel.is_cancelled() {
                        tracing::warn!(
                            run,
                            backend = %name,
                            test = test.short_name,
                            "benchmark cancelled"
                        );
                        report.cancelled = true;
                        break 'runs;
                    }

                    if let Some(reason) = &halted {
                        tracing::warn!(backend = %name, test = test.short_name, "skipping");
                        report
                            .pairs
                            .push(PairReport::skipped(run, name, test, reason.clone()));
                        continue;
                    }

                    let outcome = run_pair(
                        adapter,
                        &setup,
                        test,
                        self.config.entity_count,
                        generator,
                        &mut self.banners,
                        &mut report.backend_versions,
                    );
                    halted = outcome.halt;
                    report.pairs.push(outcome.report);
                }
            }
        }

        let failures = report.failures().count();
        if failures == 0 {
            tracing::info!(pairs = report.pairs.len(), "benchmark complete");
        } else {
            tracing::warn!(
                pairs = report.pairs.len(),
                failures,
                "benchmark complete with failures"
            );
        }
        Ok(report)
    }
}

/// Call into an adapter, turning a panic into an error.
///
/// Adapters may hold half-written state after a panic; the caller still tears
/// them down.
fn guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(Error::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Set up, run and tear down one pair.
fn run_pair<A>(
    adapter: &mut A,
    setup: &SetupContext,
    test: &TestType,
    entity_count: usize,
    generator: WorkloadGenerator,
    banners: &mut HashSet<String>,
    versions: &mut BTreeMap<String, String>,
) -> PairOutcome
where
    A: BackendAdapter + ?Sized,
{
    let backend = adapter.name().to_string();
    let span = tracing::info_span!(
        "pair",
        backend = %backend,
        test = test.short_name,
        run = setup.run()
    );
    let _enter = span.enter();

    let mut pair = PairReport::new(setup.run(), &backend, test);

    pair.transition(PairState::SettingUp);
    if let Err(source) = guarded(|| adapter.set_up(setup)) {
        let err = Error::AdapterSetup {
            backend: backend.clone(),
            source: Box::new(source),
        };
        tracing::error!(error = %err, "setup failed, halting backend");
        pair.fail_with(FailureStage::SetUp, &err);
        if let Err(cleanup) = guarded(|| adapter.tear_down()) {
            tracing::warn!(error = %cleanup, "cleanup after failed setup also failed");
        }
        return PairOutcome {
            report: pair,
            halt: Some(err.to_string()),
        };
    }

    if let Some(version) = adapter.version() {
        if banners.insert(backend.clone()) {
            tracing::info!(version = %version, "backend version");
        }
        versions.insert(backend.clone(), version);
    }

    pair.transition(PairState::Running);
    tracing::info!(test = %test, entity_count, "running test");
    let mut ctx = RunContext::new(test.kind, entity_count, generator);
    let result = guarded(|| adapter.run(test, &mut ctx)).and_then(|()| ctx.ensure_closed());
    let (phases, fingerprint) = ctx.finish();
    pair.phases = phases;
    pair.fingerprint = Some(fingerprint);

    match result {
        Ok(()) => pair.transition(PairState::TearingDown),
        Err(source) => {
            let err = Error::AdapterRun {
                backend: backend.clone(),
                test: test.short_name.to_string(),
                source: Box::new(source),
            };
            tracing::error!(error = %err, "run failed");
            pair.fail_with(FailureStage::Run, &err);
        }
    }

    let mut halt = None;
    match guarded(|| adapter.tear_down()) {
        Ok(()) => {
            if pair.error.is_none() {
                pair.transition(PairState::Done);
                tracing::info!(
                    total_ms = pair.total_nanos() as f64 / 1_000_000.0,
                    "pair complete"
                );
            }
        }
        Err(source) => {
            let err = Error::AdapterTeardown {
                backend,
                source: Box::new(source),
            };
            tracing::error!(error = %err, "teardown failed, halting backend");
            pair.also_failed(FailureStage::TearDown, &err);
            halt = Some(err.to_string());
        }
    }

    PairOutcome { report: pair, halt }
}
