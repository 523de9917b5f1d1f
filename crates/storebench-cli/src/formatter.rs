//! Output formatters for benchmark reports.

use clap::ValueEnum;
use comfy_table::{Cell, CellAlignment, Table};
use storebench_core::{BenchmarkReport, PairReport, TestType};

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter {
    /// Format the result of a benchmark session.
    fn format_report(&self, report: &BenchmarkReport) -> String;

    /// Format the available test types and backends.
    fn format_catalog(&self, tests: &[TestType], backends: &[String]) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

fn millis(nanos: u64) -> String {
    format!("{:.3}", nanos as f64 / 1_000_000.0)
}

fn status(pair: &PairReport) -> String {
    match &pair.error {
        None => "ok".to_string(),
        Some(failure) => format!("{}: {}", failure.stage, failure.reason),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_report(&self, report: &BenchmarkReport) -> String {
        let mut output = format!(
            "storebench: {} entities, seed {}, {} run(s), started {}\n",
            report.entity_count,
            report.seed,
            report.runs,
            report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        for (backend, version) in &report.backend_versions {
            output.push_str(&format!("  {}: {}\n", backend, version));
        }

        let mut pairs = Table::new();
        pairs.set_header(vec!["Run", "Backend", "Test", "Phases (ms)", "Total (ms)", "Status"]);
        for pair in &report.pairs {
            let phases: Vec<String> = pair
                .phases
                .iter()
                .map(|p| format!("{} {}", p.label, millis(p.elapsed_nanos)))
                .collect();
            pairs.add_row(vec![
                Cell::new(pair.run),
                Cell::new(&pair.backend),
                Cell::new(&pair.test_type),
                Cell::new(phases.join(", ")),
                Cell::new(millis(pair.total_nanos())).set_alignment(CellAlignment::Right),
                Cell::new(status(pair)),
            ]);
        }
        output.push('\n');
        output.push_str(&pairs.to_string());

        if report.runs > 1 {
            let mut totals = Table::new();
            totals.set_header(vec!["Backend", "Test", "Phase", "Mean (ms)", "Samples"]);
            for total in report.phase_totals() {
                totals.add_row(vec![
                    Cell::new(&total.backend),
                    Cell::new(&total.test_type),
                    Cell::new(&total.label),
                    Cell::new(millis(total.mean_nanos())).set_alignment(CellAlignment::Right),
                    Cell::new(total.samples),
                ]);
            }
            output.push_str("\n\n");
            output.push_str(&totals.to_string());
        }

        if report.cancelled {
            output.push_str("\n\nCancelled before all pairs ran");
        }
        output
    }

    fn format_catalog(&self, tests: &[TestType], backends: &[String]) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Test", "Description"]);
        for test in tests {
            table.add_row(vec![test.short_name, test.display_name]);
        }

        let mut output = table.to_string();
        output.push_str(&format!("\n\nBackends: {}", backends.join(", ")));
        output
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_report(&self, report: &BenchmarkReport) -> String {
        report.to_json().unwrap_or_else(|_| "{}".to_string())
    }

    fn format_catalog(&self, tests: &[TestType], backends: &[String]) -> String {
        let tests: Vec<serde_json::Value> = tests
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.short_name,
                    "description": t.display_name,
                })
            })
            .collect();
        serde_json::to_string_pretty(&serde_json::json!({
            "tests": tests,
            "backends": backends,
        }))
        .unwrap_or_else(|_| "{}".to_string())
    }
}

/// CSV formatter.
///
/// One row per completed phase; pairs without phases get a single row with an
/// empty phase so failures stay visible.
pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format_report(&self, report: &BenchmarkReport) -> String {
        let mut output = String::from("run,backend,test,phase,elapsed_ms,status\n");
        for pair in &report.pairs {
            let status = escape_csv(&status(pair));
            if pair.phases.is_empty() {
                output.push_str(&format!(
                    "{},{},{},,,\"{}\"\n",
                    pair.run, pair.backend, pair.test_type, status
                ));
            }
            for phase in &pair.phases {
                output.push_str(&format!(
                    "{},{},{},{},{},\"{}\"\n",
                    pair.run,
                    pair.backend,
                    pair.test_type,
                    phase.label,
                    millis(phase.elapsed_nanos),
                    status
                ));
            }
        }
        output
    }

    fn format_catalog(&self, tests: &[TestType], backends: &[String]) -> String {
        let mut output = String::from("kind,name,description\n");
        for test in tests {
            output.push_str(&format!(
                "test,{},\"{}\"\n",
                test.short_name,
                escape_csv(test.display_name)
            ));
        }
        for backend in backends {
            output.push_str(&format!("backend,{},\n", backend));
        }
        output
    }
}

fn escape_csv(s: &str) -> String {
    s.replace('"', "\"\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use storebench_core::{FailureStage, PhaseRecord, RunConfig, TestCatalog, TestKind};

    fn report() -> BenchmarkReport {
        let mut report = BenchmarkReport::new(&RunConfig::new(10));
        let crud = TestCatalog::by_identity(TestKind::Crud);

        let mut ok = PairReport::new(0, "memory", crud);
        ok.phases = vec![
            PhaseRecord {
                label: "insert".to_string(),
                elapsed_nanos: 1_500_000,
            },
            PhaseRecord {
                label: "update".to_string(),
                elapsed_nanos: 500_000,
            },
        ];
        report.pairs.push(ok);

        let mut failed = PairReport::new(0, "sqlite", crud);
        failed.fail(FailureStage::SetUp, "disk \"full\"");
        report.pairs.push(failed);
        report
    }

    #[test]
    fn test_table_format() {
        let output = TableFormatter.format_report(&report());
        assert!(output.contains("insert 1.500"));
        assert!(output.contains("2.000"));
        assert!(output.contains("setup: disk"));
    }

    #[test]
    fn test_json_format() {
        let output = JsonFormatter.format_report(&report());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["pairs"][0]["backend"], "memory");
        assert_eq!(value["pairs"][1]["error"]["stage"], "set-up");
    }

    #[test]
    fn test_csv_format() {
        let output = CsvFormatter.format_report(&report());
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "run,backend,test,phase,elapsed_ms,status");
        assert_eq!(lines[1], "0,memory,crud,insert,1.500,\"ok\"");
        assert_eq!(lines[3], "0,sqlite,crud,,,\"setup: disk \"\"full\"\"\"");
    }

    #[test]
    fn test_catalog_listing() {
        let backends = vec!["memory".to_string(), "sled".to_string()];
        let output = CsvFormatter.format_catalog(TestCatalog::all(), &backends);
        assert!(output.contains("test,query-id-random,\"Query by ID - random\""));
        assert!(output.ends_with("backend,sled,\n"));

        let json = JsonFormatter.format_catalog(TestCatalog::all(), &backends);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["tests"].as_array().unwrap().len(), 13);
    }
}
