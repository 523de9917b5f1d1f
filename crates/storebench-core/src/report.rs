//! Benchmark results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::TestType;
use crate::clock::PhaseRecord;
use crate::config::RunConfig;
use crate::error::Error;

/// Lifecycle of one (backend, test type) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PairState {
    Idle,
    SettingUp,
    Running,
    TearingDown,
    Done,
    /// Absorbing failure state.
    Errored,
}

impl PairState {
    /// Whether moving to `next` is a legal transition.
    pub fn can_transition(self, next: PairState) -> bool {
        use PairState::*;
        matches!(
            (self, next),
            (Idle, SettingUp)
                | (SettingUp, Running)
                | (Running, TearingDown)
                | (TearingDown, Done)
                | (SettingUp | Running | TearingDown, Errored)
                | (Idle, Errored)
        )
    }
}

/// Step at which a pair failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureStage {
    SetUp,
    Run,
    TearDown,
    /// Not attempted because an earlier setup or teardown of the same
    /// backend failed.
    Skipped,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::SetUp => write!(f, "setup"),
            FailureStage::Run => write!(f, "run"),
            FailureStage::TearDown => write!(f, "teardown"),
            FailureStage::Skipped => write!(f, "skipped"),
        }
    }
}

/// Why a pair failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairFailure {
    pub stage: FailureStage,
    pub reason: String,
}

/// Result of one (backend, test type) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairReport {
    /// Zero-based repetition index.
    pub run: usize,
    /// Backend name.
    pub backend: String,
    /// Test type short name.
    pub test_type: String,
    /// Completed phases in order. Partial when the run failed.
    pub phases: Vec<PhaseRecord>,
    /// Digest of the generated workload, identical across backends for the
    /// same test type.
    pub fingerprint: Option<String>,
    /// Final state.
    pub state: PairState,
    /// Failure, if the pair did not complete.
    pub error: Option<PairFailure>,
}

impl PairReport {
    /// Start tracking a pair in the `Idle` state.
    pub fn new(run: usize, backend: impl Into<String>, test: &TestType) -> Self {
        Self {
            run,
            backend: backend.into(),
            test_type: test.short_name.to_string(),
            phases: Vec::new(),
            fingerprint: None,
            state: PairState::Idle,
            error: None,
        }
    }

    /// A pair that was never attempted.
    pub fn skipped(run: usize, backend: &str, test: &TestType, reason: impl Into<String>) -> Self {
        let mut report = Self::new(run, backend, test);
        report.fail(FailureStage::Skipped, reason);
        report
    }

    /// Advance the state machine.
    ///
    /// Illegal transitions are ignored and logged; `Errored` is absorbing.
    pub fn transition(&mut self, next: PairState) {
        if self.state.can_transition(next) {
            tracing::debug!(
                backend = %self.backend,
                test = %self.test_type,
                from = ?self.state,
                to = ?next,
                "pair transition"
            );
            self.state = next;
        } else {
            tracing::warn!(from = ?self.state, to = ?next, "ignoring illegal pair transition");
        }
    }

    /// Mark the pair failed.
    pub fn fail(&mut self, stage: FailureStage, reason: impl Into<String>) {
        self.transition(PairState::Errored);
        self.error = Some(PairFailure {
            stage,
            reason: reason.into(),
        });
    }

    /// Mark the pair failed with an error.
    pub fn fail_with(&mut self, stage: FailureStage, error: &Error) {
        self.fail(stage, error.to_string());
    }

    /// Attach a further error to a pair that already failed.
    ///
    /// Marks the pair failed at `stage` when it had not failed yet.
    pub fn also_failed(&mut self, stage: FailureStage, error: &Error) {
        match &mut self.error {
            Some(failure) => {
                failure.reason = format!("{}; then {}", failure.reason, error);
            }
            None => self.fail_with(stage, error),
        }
    }

    /// Whether the pair completed without failure.
    pub fn is_success(&self) -> bool {
        self.state == PairState::Done && self.error.is_none()
    }

    /// Labels of the completed phases.
    pub fn phase_labels(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.label.as_str()).collect()
    }

    /// Sum of all phase times in nanoseconds.
    pub fn total_nanos(&self) -> u64 {
        self.phases
            .iter()
            .fold(0u64, |acc, p| acc.saturating_add(p.elapsed_nanos))
    }
}

/// Accumulated time of one phase over every run of a (backend, test) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTotal {
    pub backend: String,
    pub test_type: String,
    pub label: String,
    pub total_nanos: u64,
    pub samples: usize,
}

impl PhaseTotal {
    /// Mean elapsed time per sample in nanoseconds.
    pub fn mean_nanos(&self) -> u64 {
        if self.samples == 0 {
            0
        } else {
            self.total_nanos / self.samples as u64
        }
    }
}

/// Result of a whole benchmark session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Session start time.
    pub started_at: DateTime<Utc>,
    /// Entities per shape and pair.
    pub entity_count: usize,
    /// Workload seed.
    pub seed: i64,
    /// Matrix repetitions requested.
    pub runs: usize,
    /// Version banners, one per backend that set up successfully.
    pub backend_versions: BTreeMap<String, String>,
    /// Every attempted pair, in execution order.
    pub pairs: Vec<PairReport>,
    /// Whether the session stopped early on request.
    pub cancelled: bool,
}

impl BenchmarkReport {
    /// Create an empty report for a configuration.
    pub fn new(config: &RunConfig) -> Self {
        Self {
            started_at: Utc::now(),
            entity_count: config.entity_count,
            seed: config.seed,
            runs: config.runs,
            backend_versions: BTreeMap::new(),
            pairs: Vec::new(),
            cancelled: false,
        }
    }

    /// Pairs that did not complete.
    pub fn failures(&self) -> impl Iterator<Item = &PairReport> {
        self.pairs.iter().filter(|p| !p.is_success())
    }

    /// Whether every pair completed and the session was not cancelled.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.pairs.iter().all(PairReport::is_success)
    }

    /// Pairs of one backend, in execution order.
    pub fn pairs_for<'a>(&'a self, backend: &'a str) -> impl Iterator<Item = &'a PairReport> {
        self.pairs.iter().filter(move |p| p.backend == backend)
    }

    /// Phase times accumulated over runs, keyed by (backend, test, phase) in
    /// first-seen order.
    pub fn phase_totals(&self) -> Vec<PhaseTotal> {
        let mut totals: Vec<PhaseTotal> = Vec::new();
        for pair in &self.pairs {
            for phase in &pair.phases {
                let existing = totals.iter_mut().find(|t| {
                    t.backend == pair.backend
                        && t.test_type == pair.test_type
                        && t.label == phase.label
                });
                match existing {
                    Some(total) => {
                        total.total_nanos = total.total_nanos.saturating_add(phase.elapsed_nanos);
                        total.samples += 1;
                    }
                    None => totals.push(PhaseTotal {
                        backend: pair.backend.clone(),
                        test_type: pair.test_type.clone(),
                        label: phase.label.clone(),
                        total_nanos: phase.elapsed_nanos,
                        samples: 1,
                    }),
                }
            }
        }
        totals
    }

    /// Serialize the report as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
