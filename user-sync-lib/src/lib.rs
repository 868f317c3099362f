//! # User Sync Library
//!
//! Reads users from a CSV file and sends one `users/update` request per row
//! to the Iterable API, with a bounded number of requests in flight.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use user_sync_lib::{SyncConfig, UserSyncer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let syncer = UserSyncer::with_config(SyncConfig::new("my-api-key"))?;
//!     let report = syncer.sync_file("users.csv").await?;
//!
//!     println!("{} successful requests", report.success_count());
//!     println!("{} failed requests", report.failure_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Behaviour
//!
//! - Only status 200 counts as success; every other status is a failure
//! - Transport failures abort the run by default (`ErrorPolicy::FailFast`),
//!   or are recorded as failures with `ErrorPolicy::CollectAll`
//! - Failed rows can be written back out as CSV

// Re-export main public API types and functions
pub use client::{UpdateClient, API_KEY_HEADER};
pub use concurrent::ConcurrentProcessor;
pub use config::{
    env_config_from, load_env_config, parse_timeout_string, validate_concurrency, ApiConfig,
    ConfigManager, DefaultsConfig, EnvConfig, FileConfig, InputConfig,
};
pub use error::SyncError;
pub use report::{ResultTally, SyncReport};
pub use source::{parse_records, read_records};
pub use syncer::UserSyncer;
pub use types::{
    DispatchResult, ErrorPolicy, RecordSet, RequestOutcome, RowRecord, SyncConfig, UpdatePayload,
    DEFAULT_API_URL, DEFAULT_CONCURRENCY, EMAIL_FIELD, MAX_CONCURRENCY,
};

// Internal modules - these are not part of the public API
mod client;
mod concurrent;
mod config;
mod error;
mod report;
mod source;
mod syncer;
mod types;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, SyncError>;

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
