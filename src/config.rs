//! Configuration from environment variables

use std::env;
use std::path::PathBuf;

/// Policy for artifact files that already exist on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Append rows to an existing artifact (same-day re-runs accumulate).
    Append,
    /// Truncate and rewrite the artifact.
    Overwrite,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Runtime configuration.
///
/// Credentials are required; everything else has a default. Environment
/// variables:
/// - `SALESFORCE_URL` - instance host, e.g. `myorg.my.salesforce.com`
/// - `SALESFORCE_USERNAME` / `SALESFORCE_PASSWORD` / `SALESFORCE_TOKEN`
/// - `SALESFORCE_CLIENT_ID` / `SALESFORCE_CLIENT_SECRET`
/// - `SFSYNC_EVENT_TYPES` (default: `API,Login,Logout`)
/// - `SFSYNC_OUTPUT_PATH` (default: `logs`)
/// - `SFSYNC_OUTPUT_MODE` - `append` or `overwrite` (default: `append`)
/// - `SFSYNC_CACHE_PATH` (default: `.sfsync_cache.json`)
/// - `SFSYNC_CACHE_CAPACITY` (default: `5000`)
/// - `SFSYNC_BOOKMARK_PATH` (default: `.sfsync_bookmark`)
/// - `SFSYNC_LOOKBACK_HOURS` (default: `48`)
#[derive(Debug, Clone)]
pub struct Config {
    pub instance_url: String,
    pub username: String,
    pub password: String,
    pub token: String,
    pub client_id: String,
    pub client_secret: String,
    pub event_types: Vec<String>,
    pub output_path: PathBuf,
    pub output_mode: OutputMode,
    pub cache_path: PathBuf,
    pub cache_capacity: usize,
    pub bookmark_path: PathBuf,
    pub lookback_hours: i64,
}

fn required(var: &str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::MissingVariable(var.to_string()))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let instance_url = required("SALESFORCE_URL")?;
        if instance_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "SALESFORCE_URL cannot be empty".to_string(),
            ));
        }

        let event_types: Vec<String> = env::var("SFSYNC_EVENT_TYPES")
            .unwrap_or_else(|_| "API,Login,Logout".to_string())
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if event_types.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SFSYNC_EVENT_TYPES cannot be empty".to_string(),
            ));
        }

        let output_mode_str =
            env::var("SFSYNC_OUTPUT_MODE").unwrap_or_else(|_| "append".to_string());
        let output_mode = match output_mode_str.to_lowercase().as_str() {
            "append" => OutputMode::Append,
            "overwrite" => OutputMode::Overwrite,
            _ => {
                log::warn!(
                    "Invalid SFSYNC_OUTPUT_MODE '{}', defaulting to append",
                    output_mode_str
                );
                OutputMode::Append
            }
        };

        let cache_capacity = env::var("SFSYNC_CACHE_CAPACITY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|c| *c > 0)
            .unwrap_or(5000);

        let lookback_hours = env::var("SFSYNC_LOOKBACK_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|h| *h > 0)
            .unwrap_or(48);

        Ok(Self {
            instance_url,
            username: required("SALESFORCE_USERNAME")?,
            password: required("SALESFORCE_PASSWORD")?,
            token: required("SALESFORCE_TOKEN")?,
            client_id: required("SALESFORCE_CLIENT_ID")?,
            client_secret: required("SALESFORCE_CLIENT_SECRET")?,
            event_types,
            output_path: PathBuf::from(
                env::var("SFSYNC_OUTPUT_PATH").unwrap_or_else(|_| "logs".to_string()),
            ),
            output_mode,
            cache_path: PathBuf::from(
                env::var("SFSYNC_CACHE_PATH").unwrap_or_else(|_| ".sfsync_cache.json".to_string()),
            ),
            cache_capacity,
            bookmark_path: PathBuf::from(
                env::var("SFSYNC_BOOKMARK_PATH").unwrap_or_else(|_| ".sfsync_bookmark".to_string()),
            ),
            lookback_hours,
        })
    }

    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::hours(self.lookback_hours)
    }
}
