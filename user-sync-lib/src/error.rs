//! Error handling for user sync operations.
//!
//! This module defines the error type shared by the record source, the
//! update client and the configuration layer. Non-200 responses are not
//! errors; they are recorded outcomes (see `RequestOutcome`).

use std::fmt;
use std::time::Duration;

/// Main error type for user sync operations.
#[derive(Debug, Clone)]
pub enum SyncError {
    /// Input or output file could not be accessed
    FileError { path: String, message: String },

    /// Input content is not valid delimited tabular data
    ParseError {
        message: String,
        line: Option<u64>,
    },

    /// Configuration errors (missing API key, invalid concurrency, etc.)
    ConfigError { message: String },

    /// A row lacks a column the request needs
    MissingField { field: String, row: usize },

    /// Failure below the HTTP status layer (connect, DNS, malformed response)
    TransportError {
        message: String,
        source: Option<String>,
    },

    /// A configured request timeout elapsed
    Timeout {
        operation: String,
        duration: Option<Duration>,
    },

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

impl SyncError {
    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new parse error.
    pub fn parse<M: Into<String>>(message: M, line: Option<u64>) -> Self {
        Self::ParseError {
            message: message.into(),
            line,
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new missing field error.
    pub fn missing_field<F: Into<String>>(field: F, row: usize) -> Self {
        Self::MissingField {
            field: field.into(),
            row,
        }
    }

    /// Create a new transport error.
    pub fn transport<M: Into<String>>(message: M) -> Self {
        Self::TransportError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new transport error with source information.
    pub fn transport_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::TransportError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error happened while processing a single record.
    ///
    /// These are the errors a fail-fast run aborts on. Everything else is
    /// raised before the first request is sent.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::TransportError { .. } | Self::Timeout { .. } | Self::MissingField { .. }
        )
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::ParseError { message, line } => {
                if let Some(line) = line {
                    write!(f, "Parse error on line {}: {}", line, message)
                } else {
                    write!(f, "Parse error: {}", message)
                }
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::MissingField { field, row } => {
                write!(f, "Row {} has no '{}' column", row, field)
            }
            Self::TransportError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Transport error: {} (source: {})", message, source)
                } else {
                    write!(f, "Transport error: {}", message)
                }
            }
            Self::Timeout {
                operation,
                duration,
            } => match duration {
                Some(duration) => write!(f, "Timeout after {:?} during: {}", duration, operation),
                None => write!(f, "Timeout during: {}", operation),
            },
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for SyncError {}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                operation: "HTTP request".to_string(),
                duration: None,
            }
        } else if err.is_connect() {
            Self::transport_with_source("Connection failed", err.to_string())
        } else {
            Self::transport_with_source("HTTP request failed", err.to_string())
        }
    }
}

impl From<csv::Error> for SyncError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line());
        match err.into_kind() {
            csv::ErrorKind::Io(io) => Self::internal(format!("I/O error: {}", io)),
            kind => Self::parse(csv_kind_message(&kind), line),
        }
    }
}

fn csv_kind_message(kind: &csv::ErrorKind) -> String {
    match kind {
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("expected {} fields, found {}", expected_len, len),
        csv::ErrorKind::Utf8 { err, .. } => format!("invalid UTF-8: {}", err),
        other => format!("{:?}", other),
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON encoding failed: {}", err))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}
