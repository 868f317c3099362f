//! Core data types for user sync runs.
//!
//! This module defines the row records read from the input file, the
//! per-request outcome produced by the update client, and the run
//! configuration.

use crate::error::SyncError;
use secrecy::Secret;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Production endpoint for Iterable user updates.
pub const DEFAULT_API_URL: &str = "https://api.iterable.com/api/users/update";

/// Default number of worker slots.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Upper bound for worker slots accepted from configuration.
pub const MAX_CONCURRENCY: usize = 100;

/// Column the request body is built from.
pub const EMAIL_FIELD: &str = "email";

/// One parsed row of the input file, keyed by column name.
///
/// Fields keep their file order so a record can be written back out
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    /// 1-based data row number (the header row is not counted)
    pub row: usize,
    fields: Vec<(String, String)>,
}

impl RowRecord {
    pub fn new(row: usize, fields: Vec<(String, String)>) -> Self {
        Self { row, fields }
    }

    /// Look up a column value by name.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// The row's `email` value, if the column exists.
    pub fn email(&self) -> Option<&str> {
        self.get(EMAIL_FIELD)
    }

    /// Values in column order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, value)| value.as_str())
    }

    /// Short label used in log lines and pretty output.
    pub fn label(&self) -> String {
        match self.email() {
            Some(email) if !email.is_empty() => email.to_string(),
            _ => format!("row {}", self.row),
        }
    }
}

/// Header row plus every record of an input file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    pub headers: Vec<String>,
    pub records: Vec<RowRecord>,
}

impl RecordSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the file declares an `email` column.
    pub fn has_email_column(&self) -> bool {
        self.headers.iter().any(|h| h == EMAIL_FIELD)
    }
}

/// JSON body sent for each record.
///
/// An empty cell is sent as `null`.
#[derive(Debug, Serialize, PartialEq)]
pub struct UpdatePayload<'a> {
    pub email: Option<&'a str>,
}

impl<'a> UpdatePayload<'a> {
    pub fn from_value(value: &'a str) -> Self {
        Self {
            email: if value.is_empty() { None } else { Some(value) },
        }
    }
}

/// Classified result of one update request.
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    /// The endpoint answered 200
    Success { status: u16 },

    /// The endpoint answered with any other status
    HttpFailure { status: u16 },

    /// No status was obtained
    TransportFailure { error: SyncError },
}

impl RequestOutcome {
    /// Classify an HTTP status code. Only exactly 200 counts as success.
    pub fn from_status(status: u16) -> Self {
        if status == 200 {
            Self::Success { status }
        } else {
            Self::HttpFailure { status }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Success { status } | Self::HttpFailure { status } => Some(*status),
            Self::TransportFailure { .. } => None,
        }
    }
}

impl std::fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success { status } | Self::HttpFailure { status } => write!(f, "{}", status),
            Self::TransportFailure { error } => write!(f, "ERR {}", error),
        }
    }
}

/// A record together with what happened when it was sent.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub record: RowRecord,
    pub outcome: RequestOutcome,
    pub elapsed: Duration,
}

/// What a run does when a record hits a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Abort the whole run on the first transport failure
    #[default]
    FailFast,

    /// Record the failure and keep going
    CollectAll,
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorPolicy::FailFast => write!(f, "fail-fast"),
            ErrorPolicy::CollectAll => write!(f, "collect-all"),
        }
    }
}

/// Settings for a sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Update endpoint
    /// Default: the Iterable production URL
    pub api_url: String,

    /// Value of the `Api-Key` header
    pub api_key: Secret<String>,

    /// Maximum number of requests in flight
    /// Default: 10, Range: 1-100
    pub concurrency: usize,

    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,

    /// Behaviour on transport failures
    pub error_policy: ErrorPolicy,

    /// Where failed records are written once the run completes
    pub failures_output: Option<PathBuf>,
}

impl SyncConfig {
    /// Create a configuration with defaults and the given API key.
    pub fn new<K: Into<String>>(api_key: K) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: Secret::new(api_key.into()),
            concurrency: DEFAULT_CONCURRENCY,
            timeout: None,
            error_policy: ErrorPolicy::default(),
            failures_output: None,
        }
    }

    /// Set the number of worker slots, capped to 1..=100.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    pub fn with_api_url<U: Into<String>>(mut self, url: U) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_failures_output<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.failures_output = Some(path.into());
        self
    }
}
