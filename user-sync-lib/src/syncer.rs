//! Main sync implementation.
//!
//! `UserSyncer` ties the record source, the update client and the
//! concurrent processor together and applies the configured error policy.

use crate::client::UpdateClient;
use crate::concurrent::ConcurrentProcessor;
use crate::error::SyncError;
use crate::report::{ResultTally, SyncReport};
use crate::source::read_records;
use crate::types::{DispatchResult, ErrorPolicy, RequestOutcome, RowRecord, SyncConfig};
use futures::stream::{Stream, StreamExt};
use std::path::Path;
use std::pin::Pin;
use std::time::Instant;

/// Coordinates a bulk update run.
///
/// # Example
///
/// ```rust,no_run
/// use user_sync_lib::{SyncConfig, UserSyncer};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = SyncConfig::new("my-api-key").with_concurrency(20);
///     let syncer = UserSyncer::with_config(config)?;
///     let report = syncer.sync_file("users.csv").await?;
///
///     println!("{} successful requests", report.success_count());
///     println!("{} failed requests", report.failure_count());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct UserSyncer {
    config: SyncConfig,
    client: UpdateClient,
    processor: ConcurrentProcessor,
}

impl UserSyncer {
    /// Create a syncer for the given configuration.
    pub fn with_config(config: SyncConfig) -> Result<Self, SyncError> {
        let client = UpdateClient::with_config(&config)?;
        let processor = ConcurrentProcessor::new(config.concurrency);
        Ok(Self {
            config,
            client,
            processor,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Send every record and yield results as they complete.
    ///
    /// The stream never aborts on its own; error policy is applied by
    /// whoever consumes it (see `apply_policy`).
    pub fn sync_stream(
        &self,
        records: Vec<RowRecord>,
    ) -> Pin<Box<dyn Stream<Item = DispatchResult> + Send + '_>> {
        let client = &self.client;
        let stream = self
            .processor
            .process(records, move |record| client.dispatch(record));
        Box::pin(stream)
    }

    /// Apply the error policy to one completed result.
    ///
    /// Returns the error a fail-fast run should stop with, if any.
    pub fn apply_policy(&self, result: &DispatchResult) -> Result<(), SyncError> {
        match (&result.outcome, self.config.error_policy) {
            (RequestOutcome::TransportFailure { error }, ErrorPolicy::FailFast) => {
                Err(error.clone())
            }
            _ => Ok(()),
        }
    }

    /// Send every record and collect the tally.
    ///
    /// `on_result` is called once per completed request, in completion
    /// order, before the policy is applied.
    ///
    /// # Errors
    ///
    /// Under `ErrorPolicy::FailFast` the first transport failure stops the
    /// run. Pending and in-flight requests are dropped and no report is
    /// produced.
    pub async fn sync_records_with<F>(
        &self,
        records: Vec<RowRecord>,
        on_result: F,
    ) -> Result<SyncReport, SyncError>
    where
        F: FnMut(&DispatchResult),
    {
        self.sync_records_since(Instant::now(), records, on_result)
            .await
    }

    /// Like `sync_records_with`, but the report's duration is measured from
    /// `start`, so callers can include input loading in the elapsed time.
    pub async fn sync_records_since<F>(
        &self,
        start: Instant,
        records: Vec<RowRecord>,
        mut on_result: F,
    ) -> Result<SyncReport, SyncError>
    where
        F: FnMut(&DispatchResult),
    {
        let count = records.len();
        tracing::info!(
            records = count,
            concurrency = self.processor.max_concurrency(),
            policy = %self.config.error_policy,
            endpoint = self.client.endpoint(),
            "starting sync"
        );

        let mut tally = ResultTally::new();
        let mut stream = self.sync_stream(records);

        while let Some(result) = stream.next().await {
            on_result(&result);
            self.apply_policy(&result)?;
            tally.record(result);
        }

        let report = SyncReport {
            tally,
            duration: start.elapsed(),
        };
        tracing::info!(
            successes = report.success_count(),
            failures = report.failure_count(),
            elapsed_ms = report.duration.as_millis() as u64,
            "sync finished"
        );
        Ok(report)
    }

    /// Send every record and collect the tally.
    pub async fn sync_records(&self, records: Vec<RowRecord>) -> Result<SyncReport, SyncError> {
        self.sync_records_with(records, |_| {}).await
    }

    /// Read a CSV file, send every row, and write failures if configured.
    ///
    /// # Errors
    ///
    /// Input errors are returned before any request is sent.
    pub async fn sync_file<P: AsRef<Path>>(&self, path: P) -> Result<SyncReport, SyncError> {
        let start = Instant::now();
        let set = read_records(path)?;
        let headers = set.headers;
        let report = self
            .sync_records_since(start, set.records, |_| {})
            .await?;

        if let Some(out) = &self.config.failures_output {
            report.tally.write_failures(out, &headers)?;
        }
        Ok(report)
    }
}
