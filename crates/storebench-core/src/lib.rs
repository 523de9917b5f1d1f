//! storebench core - deterministic workloads and cross-backend orchestration.
//!
//! This crate provides everything a storage comparison needs except the
//! storage engines themselves.
//!
//! # Components
//!
//! - **Generator**: reproducible pseudo-random strings and index sequences
//! - **Entity**: the plain and indexed record shapes and their factory
//! - **Clock**: named start/stop phase timing
//! - **Catalog**: the fixed set of benchmark test types
//! - **Backend**: the adapter contract and the storage primitives it builds on
//! - **Scenario**: canonical per-test-type behavior shared by all adapters
//! - **Runner**: sequencing of (backend, test type) pairs and reporting

pub mod backend;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod generator;
pub mod report;
pub mod runner;
pub mod scenario;

pub use backend::{
    BackendAdapter, BackendError, BackendRegistry, EntityStore, RunContext, SetupContext,
};
pub use catalog::{TestCatalog, TestKind, TestType};
pub use clock::{PhaseClock, PhaseRecord};
pub use config::RunConfig;
pub use entity::{EntityFactory, EntityKind, EntitySchema, FieldDef, FieldType, SimpleEntity};
pub use error::{Error, Result};
pub use generator::{Lcg48, WorkloadGenerator, DEFAULT_SEED};
pub use report::{BenchmarkReport, FailureStage, PairFailure, PairReport, PairState};
pub use runner::{BenchmarkRunner, CancelToken};
