//! Phase timing.
//!
//! A [`PhaseClock`] measures named, non-overlapping phases with a monotonic
//! clock and keeps every completed [`PhaseRecord`] for reporting.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Elapsed time of one completed phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    /// Phase label, e.g. `insert` or `query`.
    pub label: String,
    /// Elapsed time in nanoseconds.
    pub elapsed_nanos: u64,
}

impl PhaseRecord {
    /// Elapsed time as a duration.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos)
    }

    /// Elapsed time in fractional milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_nanos as f64 / 1_000_000.0
    }
}

/// Named start/stop timer with at most one open phase.
#[derive(Debug, Default)]
pub struct PhaseClock {
    open: Option<(String, Instant)>,
    records: Vec<PhaseRecord>,
}

impl PhaseClock {
    /// Create a clock with no recorded phases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a phase.
    ///
    /// Fails with [`Error::PhaseDiscipline`] if another phase is still open.
    pub fn start(&mut self, label: impl Into<String>) -> Result<()> {
        let label = label.into();
        if let Some((open, _)) = &self.open {
            return Err(Error::PhaseDiscipline(format!(
                "cannot start phase '{}' while '{}' is running",
                label, open
            )));
        }
        self.open = Some((label, Instant::now()));
        Ok(())
    }

    /// Close the open phase and record its elapsed time.
    ///
    /// Fails with [`Error::PhaseDiscipline`] if no phase is open.
    pub fn stop(&mut self) -> Result<PhaseRecord> {
        let (label, started) = self.open.take().ok_or_else(|| {
            Error::PhaseDiscipline("stop called without a running phase".to_string())
        })?;

        let elapsed = started.elapsed();
        let record = PhaseRecord {
            label,
            elapsed_nanos: u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX),
        };
        tracing::info!(
            phase = %record.label,
            elapsed_ms = record.elapsed_ms(),
            "phase complete"
        );
        self.records.push(record.clone());
        Ok(record)
    }

    /// Run `f` inside a phase named `label`.
    ///
    /// The phase is closed even if `f` fails, so the clock stays usable; the
    /// error from `f` is returned and its partial timing is discarded.
    pub fn time<T>(
        &mut self,
        label: impl Into<String>,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        self.start(label)?;
        match f() {
            Ok(value) => {
                self.stop()?;
                Ok(value)
            }
            Err(e) => {
                self.open = None;
                Err(e)
            }
        }
    }

    /// Label of the open phase, if any.
    pub fn running(&self) -> Option<&str> {
        self.open.as_ref().map(|(label, _)| label.as_str())
    }

    /// Completed phases in completion order.
    pub fn records(&self) -> &[PhaseRecord] {
        &self.records
    }

    /// Sum of all completed phases.
    pub fn total(&self) -> Duration {
        self.records.iter().map(PhaseRecord::elapsed).sum()
    }

    /// Consume the clock, returning its records.
    ///
    /// A phase still open at this point is dropped.
    pub fn into_records(self) -> Vec<PhaseRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_stop_records_phase() {
        let mut clock = PhaseClock::new();
        clock.start("insert").unwrap();
        assert_eq!(clock.running(), Some("insert"));
        let record = clock.stop().unwrap();

        assert_eq!(record.label, "insert");
        assert!(clock.running().is_none());
        assert_eq!(clock.records(), &[record]);
    }

    #[test]
    fn test_stop_without_start_fails() {
        let mut clock = PhaseClock::new();
        assert!(matches!(clock.stop(), Err(Error::PhaseDiscipline(_))));
    }

    #[test]
    fn test_nested_start_fails() {
        let mut clock = PhaseClock::new();
        clock.start("insert").unwrap();
        let err = clock.start("update").unwrap_err();
        assert!(matches!(err, Error::PhaseDiscipline(_)));
        assert!(err.to_string().contains("insert"));

        // The original phase is still the open one.
        assert_eq!(clock.stop().unwrap().label, "insert");
    }

    #[test]
    fn test_elapsed_is_monotonic() {
        let mut clock = PhaseClock::new();
        clock.start("sleep").unwrap();
        std::thread::sleep(Duration::from_millis(2));
        let record = clock.stop().unwrap();
        assert!(record.elapsed() >= Duration::from_millis(2));
    }

    #[test]
    fn test_records_accumulate_in_order() {
        let mut clock = PhaseClock::new();
        for label in ["insert", "update", "load"] {
            clock.start(label).unwrap();
            clock.stop().unwrap();
        }
        let labels: Vec<&str> = clock.records().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["insert", "update", "load"]);
        assert_eq!(
            clock.total(),
            clock.records().iter().map(PhaseRecord::elapsed).sum::<Duration>()
        );
    }

    #[test]
    fn test_time_closes_phase_on_error() {
        let mut clock = PhaseClock::new();
        let result: Result<()> = clock.time("query", || Err(Error::Verification("boom".into())));
        assert!(result.is_err());
        assert!(clock.running().is_none());
        assert!(clock.records().is_empty());

        let value = clock.time("query", || Ok(7)).unwrap();
        assert_eq!(value, 7);
        assert_eq!(clock.into_records().len(), 1);
    }
}
