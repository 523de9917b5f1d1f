//! storebench command-line front end.
//!
//! Runs the test catalog against the bundled backends and prints the report.

mod args;
mod formatter;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storebench_core::{BenchmarkRunner, TestCatalog};

use crate::args::Args;
use crate::formatter::create_formatter;

fn main() {
    // Logs go to stderr so reports on stdout stay machine-readable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storebench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let formatter = create_formatter(args.format);
    let registry = storebench_backends::default_registry()?;

    if args.list {
        println!(
            "{}",
            formatter.format_catalog(TestCatalog::all(), &registry.names())
        );
        return Ok(());
    }

    let config = args.into_config()?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backends = ?registry.names(),
        "starting storebench"
    );

    let mut runner = BenchmarkRunner::new(registry, config);
    let report = runner.run()?;
    println!("{}", formatter.format_report(&report));

    let failures = report.failures().count();
    if failures > 0 {
        tracing::warn!(failures, "some pairs did not complete");
    }
    Ok(())
}
