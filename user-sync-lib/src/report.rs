//! Result tally and run report.
//!
//! The tally is owned by whoever consumes the result stream, so records are
//! appended from one place only.

use crate::error::SyncError;
use crate::types::{DispatchResult, RequestOutcome, RowRecord};
use std::path::Path;
use std::time::Duration;

/// Successes and failures of a run, each in completion order.
#[derive(Debug, Clone, Default)]
pub struct ResultTally {
    pub successes: Vec<RowRecord>,
    pub failures: Vec<RowRecord>,
    /// How many of `failures` never got an HTTP status
    pub transport_errors: usize,
}

impl ResultTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed result to the matching list.
    pub fn record(&mut self, result: DispatchResult) {
        match result.outcome {
            RequestOutcome::Success { .. } => self.successes.push(result.record),
            RequestOutcome::HttpFailure { .. } => self.failures.push(result.record),
            RequestOutcome::TransportFailure { .. } => {
                self.transport_errors += 1;
                self.failures.push(result.record);
            }
        }
    }

    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Write failed records as CSV, using `headers` as the header row.
    ///
    /// Rows are written in input order regardless of completion order.
    pub fn write_failures<P: AsRef<Path>>(
        &self,
        path: P,
        headers: &[String],
    ) -> Result<usize, SyncError> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| SyncError::file_error(path.to_string_lossy(), e.to_string()))?;

        writer.write_record(headers)?;

        let mut failed: Vec<&RowRecord> = self.failures.iter().collect();
        failed.sort_by_key(|r| r.row);
        for record in &failed {
            writer.write_record(record.values())?;
        }

        writer
            .flush()
            .map_err(|e| SyncError::file_error(path.to_string_lossy(), e.to_string()))?;

        tracing::info!(path = %path.display(), rows = failed.len(), "wrote failed records");
        Ok(failed.len())
    }
}

/// Final result of a completed run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub tally: ResultTally,
    /// Wall-clock time from the run's start instant (before the input file
    /// is read, when the caller supplies one) until the last result
    pub duration: Duration,
}

impl SyncReport {
    pub fn success_count(&self) -> usize {
        self.tally.success_count()
    }

    pub fn failure_count(&self) -> usize {
        self.tally.failure_count()
    }

    pub fn total(&self) -> usize {
        self.tally.total()
    }
}
