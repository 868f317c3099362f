//! User Sync CLI Application
//!
//! Reads users from a CSV file and pushes each one to the Iterable
//! users/update endpoint with a bounded number of concurrent requests.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use user_sync_lib::{
    load_env_config, parse_timeout_string, read_records, ConfigManager, EnvConfig, ErrorPolicy,
    FileConfig, RequestOutcome, SyncConfig, SyncError, UserSyncer, DEFAULT_API_URL,
    DEFAULT_CONCURRENCY, MAX_CONCURRENCY,
};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for user-sync
#[derive(Parser, Debug)]
#[command(name = "user-sync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Push users from a CSV file to the Iterable users/update API")]
#[command(
    long_about = "Push users from a CSV file to the Iterable users/update API.\n\nOne POST is sent per row with the row's email. Only HTTP 200 counts as success.\nSettings can also come from ITERABLE_API_KEY, ITERABLE_API_URL, PATH_TO_CSV and NUM_THREADS."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// CSV file with an 'email' column [env: PATH_TO_CSV]
    #[arg(short = 'f', long = "file", value_name = "FILE", help_heading = "Input")]
    pub file: Option<PathBuf>,

    /// Parse the input and report the row count without sending requests
    #[arg(long = "dry-run", help_heading = "Input")]
    pub dry_run: bool,

    /// Update endpoint [env: ITERABLE_API_URL]
    #[arg(long = "api-url", value_name = "URL", help_heading = "API")]
    pub api_url: Option<String>,

    /// API key sent in the Api-Key header [env: ITERABLE_API_KEY]
    #[arg(long = "api-key", value_name = "KEY", help_heading = "API")]
    pub api_key: Option<String>,

    /// Per-request timeout, e.g. 30s or 2m (default: none) [env: REQUEST_TIMEOUT]
    #[arg(long = "timeout", value_name = "DURATION", help_heading = "API")]
    pub timeout: Option<String>,

    /// Max concurrent requests (default: 10, max: 100) [env: NUM_THREADS]
    #[arg(short = 'c', long = "concurrency", help_heading = "Performance")]
    pub concurrency: Option<usize>,

    /// Keep going after transport errors and count them as failures
    #[arg(
        long = "collect-all",
        conflicts_with = "fail_fast",
        help_heading = "Error Handling"
    )]
    pub collect_all: bool,

    /// Stop at the first transport error (default) [env: FAIL_FAST]
    #[arg(long = "fail-fast", help_heading = "Error Handling")]
    pub fail_fast: bool,

    /// Write failed rows to this CSV file [env: FAILURES_CSV]
    #[arg(long = "failures-out", value_name = "FILE", help_heading = "Error Handling")]
    pub failures_out: Option<PathBuf>,

    /// Show email and colored status for each request
    #[arg(short = 'p', long = "pretty", help_heading = "Output Format")]
    pub pretty: bool,

    /// Use specific config file instead of automatic discovery [env: USER_SYNC_CONFIG]
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Show debug logging
    #[arg(short = 'd', long = "debug", help_heading = "Configuration")]
    pub debug: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

/// Everything a run needs after merging CLI, environment and config files.
#[derive(Debug)]
struct RunSettings {
    csv_path: PathBuf,
    sync: SyncConfig,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_tracing(&args);

    if let Err(e) = run_sync(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 || concurrency > MAX_CONCURRENCY {
            return Err(format!(
                "Concurrency must be between 1 and {}",
                MAX_CONCURRENCY
            ));
        }
    }

    if let Some(timeout) = &args.timeout {
        if parse_timeout_string(timeout).is_none() {
            return Err(format!(
                "Invalid timeout '{}'. Use format like '5s', '30s', '2m'",
                timeout
            ));
        }
    }

    if let Some(url) = &args.api_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!(
                "API url '{}' must start with http:// or https://",
                url
            ));
        }
    }

    Ok(())
}

/// Install the tracing subscriber. `RUST_LOG` overrides the flag-derived level.
fn init_tracing(args: &Args) {
    let level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("user_sync={0},user_sync_lib={0}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Main sync logic
async fn run_sync(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let env_config = load_env_config(args.verbose);
    let file_config = load_file_config(&args, &env_config)?;
    let settings = resolve_settings(&args, &env_config, file_config)?;

    // Input problems surface before any request is sent
    let set = read_records(&settings.csv_path)?;

    if args.dry_run {
        println!("{} records", set.len());
        if !set.has_email_column() && !set.headers.is_empty() {
            eprintln!("warning: input has no 'email' column");
        }
        return Ok(());
    }

    if args.pretty {
        ui::print_header(&settings.csv_path, set.len(), &settings.sync);
    }

    let syncer = UserSyncer::with_config(settings.sync.clone())?;
    let policy = settings.sync.error_policy;
    let pretty = args.pretty;

    let report = syncer
        .sync_records_since(start, set.records, |result| {
            // Under fail-fast the run ends with the error itself
            if policy == ErrorPolicy::FailFast
                && matches!(result.outcome, RequestOutcome::TransportFailure { .. })
            {
                return;
            }
            if pretty {
                ui::print_result(result);
            } else {
                ui::print_result_default(result);
            }
        })
        .await?;

    let failures_written = match &settings.sync.failures_output {
        Some(path) => {
            let rows = report.tally.write_failures(path, &set.headers)?;
            Some((path.clone(), rows))
        }
        None => None,
    };

    if pretty {
        ui::print_summary(&report, failures_written.as_ref());
    } else {
        ui::print_summary_default(&report);
    }

    Ok(())
}

/// Load config files: explicit `--config`, then `USER_SYNC_CONFIG`, then discovery.
fn load_file_config(
    args: &Args,
    env_config: &EnvConfig,
) -> Result<FileConfig, Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new(args.verbose);

    if let Some(path) = args.config.as_ref().or(env_config.config.as_ref()) {
        tracing::info!(path = %path, "using explicit config file");
        let file_config = config_manager
            .load_file(path)
            .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?;
        return Ok(file_config);
    }

    match config_manager.discover_and_load() {
        Ok(file_config) => Ok(file_config),
        Err(e) => {
            tracing::warn!("Config discovery warning: {}", e);
            Ok(FileConfig::default())
        }
    }
}

/// Merge CLI arguments, environment and config files into run settings.
///
/// Precedence order (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables
/// 3. Config files
/// 4. Built-in defaults
fn resolve_settings(
    args: &Args,
    env_config: &EnvConfig,
    file_config: FileConfig,
) -> Result<RunSettings, SyncError> {
    let api = file_config.api.unwrap_or_default();
    let input = file_config.input.unwrap_or_default();
    let defaults = file_config.defaults.unwrap_or_default();

    let api_key = args
        .api_key
        .clone()
        .or_else(|| env_config.api_key.clone())
        .or(api.key)
        .ok_or_else(|| {
            SyncError::config(
                "Missing API key: set ITERABLE_API_KEY, pass --api-key, or add [api] key to a config file",
            )
        })?;

    let csv_path = args
        .file
        .clone()
        .or_else(|| env_config.csv_path.clone().map(PathBuf::from))
        .or_else(|| input.path.map(PathBuf::from))
        .ok_or_else(|| {
            SyncError::config(
                "Missing input file: set PATH_TO_CSV, pass --file, or add [input] path to a config file",
            )
        })?;

    let api_url = args
        .api_url
        .clone()
        .or_else(|| env_config.api_url.clone())
        .or(api.url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let concurrency = args
        .concurrency
        .or(env_config.concurrency)
        .or(defaults.concurrency)
        .unwrap_or(DEFAULT_CONCURRENCY);

    let timeout = match args
        .timeout
        .clone()
        .or_else(|| env_config.timeout.clone())
        .or(defaults.timeout)
    {
        Some(raw) => Some(
            parse_timeout_string(&raw)
                .ok_or_else(|| SyncError::config(format!("Invalid timeout '{}'", raw)))?,
        ),
        None => None,
    };

    let error_policy = if args.collect_all {
        ErrorPolicy::CollectAll
    } else if args.fail_fast {
        ErrorPolicy::FailFast
    } else {
        match env_config.fail_fast.or(defaults.fail_fast) {
            Some(false) => ErrorPolicy::CollectAll,
            _ => ErrorPolicy::FailFast,
        }
    };

    let failures_output = args
        .failures_out
        .clone()
        .or_else(|| env_config.failures_output.clone().map(PathBuf::from))
        .or_else(|| defaults.failures_output.map(PathBuf::from));

    let mut sync = SyncConfig::new(api_key)
        .with_api_url(api_url)
        .with_concurrency(concurrency)
        .with_timeout(timeout)
        .with_error_policy(error_policy);
    if let Some(path) = failures_output {
        sync = sync.with_failures_output(path);
    }

    Ok(RunSettings { csv_path, sync })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::time::Duration;
    use user_sync_lib::{ApiConfig, DefaultsConfig, InputConfig};

    fn create_test_args() -> Args {
        Args {
            file: None,
            dry_run: false,
            api_url: None,
            api_key: None,
            timeout: None,
            concurrency: None,
            collect_all: false,
            fail_fast: false,
            failures_out: None,
            pretty: false,
            config: None,
            debug: false,
            verbose: false,
        }
    }

    fn file_config() -> FileConfig {
        FileConfig {
            api: Some(ApiConfig {
                url: Some("http://file.example/update".to_string()),
                key: Some("file-key".to_string()),
            }),
            input: Some(InputConfig {
                path: Some("file.csv".to_string()),
            }),
            defaults: Some(DefaultsConfig {
                concurrency: Some(30),
                timeout: Some("20s".to_string()),
                fail_fast: Some(false),
                failures_output: Some("file-failures.csv".to_string()),
            }),
        }
    }

    #[test]
    fn test_validate_args_default_ok() {
        assert!(validate_args(&create_test_args()).is_ok());
    }

    #[test]
    fn test_validate_args_concurrency_range() {
        let mut args = create_test_args();
        args.concurrency = Some(0);
        assert!(validate_args(&args).unwrap_err().contains("between 1 and 100"));

        args.concurrency = Some(101);
        assert!(validate_args(&args).is_err());

        args.concurrency = Some(100);
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_validate_args_timeout_and_url() {
        let mut args = create_test_args();
        args.timeout = Some("whenever".to_string());
        assert!(validate_args(&args).unwrap_err().contains("Invalid timeout"));

        let mut args = create_test_args();
        args.api_url = Some("api.iterable.com".to_string());
        assert!(validate_args(&args).unwrap_err().contains("http://"));
    }

    #[test]
    fn test_defaults_when_only_required_values_given() {
        let mut args = create_test_args();
        args.api_key = Some("cli-key".to_string());
        args.file = Some(PathBuf::from("users.csv"));

        let settings =
            resolve_settings(&args, &EnvConfig::default(), FileConfig::default()).unwrap();
        assert_eq!(settings.csv_path, PathBuf::from("users.csv"));
        assert_eq!(settings.sync.api_url, DEFAULT_API_URL);
        assert_eq!(settings.sync.concurrency, 10);
        assert_eq!(settings.sync.error_policy, ErrorPolicy::FailFast);
        assert!(settings.sync.timeout.is_none());
        assert!(settings.sync.failures_output.is_none());
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        let mut args = create_test_args();
        args.file = Some(PathBuf::from("users.csv"));
        let err = resolve_settings(&args, &EnvConfig::default(), FileConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("ITERABLE_API_KEY"));
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let mut args = create_test_args();
        args.api_key = Some("cli-key".to_string());
        let err = resolve_settings(&args, &EnvConfig::default(), FileConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("PATH_TO_CSV"));
    }

    #[test]
    fn test_file_config_used_when_nothing_else_set() {
        let settings =
            resolve_settings(&create_test_args(), &EnvConfig::default(), file_config()).unwrap();
        assert_eq!(settings.sync.api_key.expose_secret(), "file-key");
        assert_eq!(settings.sync.api_url, "http://file.example/update");
        assert_eq!(settings.csv_path, PathBuf::from("file.csv"));
        assert_eq!(settings.sync.concurrency, 30);
        assert_eq!(settings.sync.timeout, Some(Duration::from_secs(20)));
        assert_eq!(settings.sync.error_policy, ErrorPolicy::CollectAll);
        assert_eq!(
            settings.sync.failures_output,
            Some(PathBuf::from("file-failures.csv"))
        );
    }

    #[test]
    fn test_env_overrides_file_config() {
        let env = EnvConfig {
            api_key: Some("env-key".to_string()),
            csv_path: Some("env.csv".to_string()),
            concurrency: Some(4),
            fail_fast: Some(true),
            ..EnvConfig::default()
        };

        let settings = resolve_settings(&create_test_args(), &env, file_config()).unwrap();
        assert_eq!(settings.sync.api_key.expose_secret(), "env-key");
        assert_eq!(settings.csv_path, PathBuf::from("env.csv"));
        assert_eq!(settings.sync.concurrency, 4);
        assert_eq!(settings.sync.error_policy, ErrorPolicy::FailFast);
        assert_eq!(settings.sync.api_url, "http://file.example/update");
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut args = create_test_args();
        args.api_key = Some("cli-key".to_string());
        args.concurrency = Some(2);
        args.timeout = Some("1m".to_string());
        args.collect_all = true;

        let env = EnvConfig {
            api_key: Some("env-key".to_string()),
            csv_path: Some("env.csv".to_string()),
            concurrency: Some(4),
            fail_fast: Some(true),
            ..EnvConfig::default()
        };

        let settings = resolve_settings(&args, &env, FileConfig::default()).unwrap();
        assert_eq!(settings.sync.api_key.expose_secret(), "cli-key");
        assert_eq!(settings.sync.concurrency, 2);
        assert_eq!(settings.sync.timeout, Some(Duration::from_secs(60)));
        assert_eq!(settings.sync.error_policy, ErrorPolicy::CollectAll);
    }

    #[test]
    fn test_fail_fast_flag_overrides_config() {
        let mut args = create_test_args();
        args.fail_fast = true;
        let settings = resolve_settings(&args, &EnvConfig::default(), file_config()).unwrap();
        assert_eq!(settings.sync.error_policy, ErrorPolicy::FailFast);
    }
}
