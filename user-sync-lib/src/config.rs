//! Configuration file parsing and environment variables.
//!
//! Configuration comes from three places, merged by the CLI with this
//! precedence (highest first): command-line arguments, environment
//! variables, TOML config files.

use crate::error::SyncError;
use crate::types::MAX_CONCURRENCY;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Endpoint and credentials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiConfig>,

    /// Input file settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<InputConfig>,

    /// Default values for CLI options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,
}

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing)]
    pub key: Option<String>,
}

/// `[input]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InputConfig {
    /// CSV file to read users from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// Worker slots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Per-request timeout (as string, e.g., "5s", "2m")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Abort on the first transport failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_fast: Option<bool>,

    /// Where to write failed rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures_output: Option<String>,
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to emit warnings for config issues
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, SyncError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(SyncError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            SyncError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content)
            .map_err(|e| SyncError::config(format!("Failed to parse TOML configuration: {}", e)))?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config, then `~/.user-sync.toml`, then `./user-sync.toml`; later
    /// files override earlier ones field by field.
    pub fn discover_and_load(&self) -> Result<FileConfig, SyncError> {
        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        Ok(self.load_layered(candidates.into_iter().flatten()))
    }

    /// Load and merge `paths` in order, later files winning.
    ///
    /// A file that fails to load is skipped with a warning; the others
    /// still apply.
    pub fn load_layered<I>(&self, paths: I) -> FileConfig
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut merged_config = FileConfig::default();

        for path in paths {
            match self.load_file(&path) {
                Ok(config) => {
                    if self.verbose {
                        tracing::info!(path = %path.display(), "loaded config file");
                    }
                    merged_config = merge_configs(merged_config, config);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping config file");
                }
            }
        }

        merged_config
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        let candidates = ["./user-sync.toml", "./.user-sync.toml"];
        candidates
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .map(Path::to_path_buf)
    }

    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".user-sync.toml", "user-sync.toml"]
            .iter()
            .map(|c| Path::new(&home).join(c))
            .find(|p| p.exists())
    }

    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("user-sync").join("config.toml");
        path.exists().then_some(path)
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), SyncError> {
        if let Some(defaults) = &config.defaults {
            if let Some(concurrency) = defaults.concurrency {
                validate_concurrency(concurrency)?;
            }

            if let Some(timeout_str) = &defaults.timeout {
                if parse_timeout_string(timeout_str).is_none() {
                    return Err(SyncError::config(format!(
                        "Invalid timeout format '{}'. Use format like '5s', '30s', '2m'",
                        timeout_str
                    )));
                }
            }
        }

        if let Some(api) = &config.api {
            if let Some(url) = &api.url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(SyncError::config(format!(
                        "API url '{}' must start with http:// or https://",
                        url
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Merge two configurations. Values from `higher` win.
fn merge_configs(lower: FileConfig, higher: FileConfig) -> FileConfig {
    let api = match (lower.api, higher.api) {
        (Some(lower), Some(higher)) => Some(ApiConfig {
            url: higher.url.or(lower.url),
            key: higher.key.or(lower.key),
        }),
        (lower, higher) => higher.or(lower),
    };

    let input = match (lower.input, higher.input) {
        (Some(lower), Some(higher)) => Some(InputConfig {
            path: higher.path.or(lower.path),
        }),
        (lower, higher) => higher.or(lower),
    };

    let defaults = match (lower.defaults, higher.defaults) {
        (Some(lower), Some(higher)) => Some(DefaultsConfig {
            concurrency: higher.concurrency.or(lower.concurrency),
            timeout: higher.timeout.or(lower.timeout),
            fail_fast: higher.fail_fast.or(lower.fail_fast),
            failures_output: higher.failures_output.or(lower.failures_output),
        }),
        (lower, higher) => higher.or(lower),
    };

    FileConfig {
        api,
        input,
        defaults,
    }
}

/// Settings read from environment variables.
///
/// `ITERABLE_API_KEY`, `ITERABLE_API_URL`, `PATH_TO_CSV` and `NUM_THREADS`
/// cover the core settings; the rest map to CLI options of the same meaning.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub csv_path: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout: Option<String>,
    pub fail_fast: Option<bool>,
    pub failures_output: Option<String>,
    pub config: Option<String>,
}

/// Load configuration from the process environment.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config(verbose: bool) -> EnvConfig {
    env_config_from(|name| env::var(name).ok(), verbose)
}

/// Build an `EnvConfig` from any variable lookup.
pub fn env_config_from<F>(lookup: F, verbose: bool) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let mut env_config = EnvConfig {
        api_key: non_empty("ITERABLE_API_KEY"),
        api_url: non_empty("ITERABLE_API_URL"),
        csv_path: non_empty("PATH_TO_CSV"),
        failures_output: non_empty("FAILURES_CSV"),
        config: non_empty("USER_SYNC_CONFIG"),
        ..EnvConfig::default()
    };

    if let Some(val) = non_empty("NUM_THREADS") {
        match val.trim().parse::<usize>() {
            Ok(n) if validate_concurrency(n).is_ok() => env_config.concurrency = Some(n),
            _ => tracing::warn!(
                "Invalid NUM_THREADS='{}', must be 1-{}",
                val,
                MAX_CONCURRENCY
            ),
        }
    }

    if let Some(val) = non_empty("REQUEST_TIMEOUT") {
        if parse_timeout_string(&val).is_some() {
            env_config.timeout = Some(val);
        } else {
            tracing::warn!(
                "Invalid REQUEST_TIMEOUT='{}', use format like '5s', '30s', '2m'",
                val
            );
        }
    }

    if let Some(val) = non_empty("FAIL_FAST") {
        match parse_bool(&val) {
            Some(b) => env_config.fail_fast = Some(b),
            None => tracing::warn!("Invalid FAIL_FAST='{}', use true/false", val),
        }
    }

    if verbose {
        for (name, set) in [
            ("ITERABLE_API_KEY", env_config.api_key.is_some()),
            ("ITERABLE_API_URL", env_config.api_url.is_some()),
            ("PATH_TO_CSV", env_config.csv_path.is_some()),
            ("NUM_THREADS", env_config.concurrency.is_some()),
            ("REQUEST_TIMEOUT", env_config.timeout.is_some()),
            ("FAIL_FAST", env_config.fail_fast.is_some()),
            ("FAILURES_CSV", env_config.failures_output.is_some()),
        ] {
            if set {
                tracing::info!("Using {} from environment", name);
            }
        }
    }

    env_config
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Check that a worker slot count is within 1..=100.
pub fn validate_concurrency(concurrency: usize) -> Result<(), SyncError> {
    if concurrency == 0 || concurrency > MAX_CONCURRENCY {
        return Err(SyncError::config(format!(
            "Concurrency must be between 1 and {}",
            MAX_CONCURRENCY
        )));
    }
    Ok(())
}

/// Parse a timeout string like "5s", "30s", "2m" into a duration.
///
/// A bare number is read as seconds.
pub fn parse_timeout_string(timeout_str: &str) -> Option<Duration> {
    let timeout_str = timeout_str.trim().to_lowercase();

    let secs = if let Some(s) = timeout_str.strip_suffix('s') {
        s.parse::<u64>().ok()
    } else if let Some(m) = timeout_str.strip_suffix('m') {
        m.parse::<u64>().ok().and_then(|m| m.checked_mul(60))
    } else {
        timeout_str.parse::<u64>().ok()
    }?;

    (secs > 0).then_some(Duration::from_secs(secs))
}
