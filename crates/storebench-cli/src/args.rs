//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use storebench_core::config::DEFAULT_ENTITY_COUNT;
use storebench_core::{RunConfig, DEFAULT_SEED};

use crate::formatter::OutputFormat;

/// Cross-backend storage benchmark
#[derive(Parser, Debug)]
#[command(name = "storebench")]
#[command(version, about = "Runs an identical workload against several storage backends")]
pub struct Args {
    /// Entities created per shape and test
    #[arg(short = 'n', long, default_value_t = DEFAULT_ENTITY_COUNT)]
    pub count: usize,

    /// Test types to run, by short name (default: all)
    #[arg(short, long, value_delimiter = ',')]
    pub tests: Vec<String>,

    /// Backends to run, in order (default: all)
    #[arg(short, long, value_delimiter = ',')]
    pub backends: Vec<String>,

    /// Seed of the workload stream
    #[arg(long, default_value_t = DEFAULT_SEED, allow_negative_numbers = true)]
    pub seed: i64,

    /// How many times the whole matrix is repeated
    #[arg(short, long, default_value_t = 1)]
    pub runs: usize,

    /// Directory for on-disk backend state (default: a temporary directory)
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// List test types and backends, then exit
    #[arg(long)]
    pub list: bool,
}

impl Args {
    /// Convert arguments to a run configuration.
    ///
    /// Unknown test names are rejected here, before any backend is opened.
    pub fn into_config(self) -> storebench_core::Result<RunConfig> {
        let mut config = RunConfig::new(self.count)
            .with_test_names(&self.tests)?
            .with_backends(self.backends)
            .with_seed(self.seed)
            .with_runs(self.runs);
        if let Some(dir) = self.data_dir {
            config = config.with_data_dir(dir);
        }
        config.validate()?;
        Ok(config)
    }
}
