//! Configuration loading and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument / environment variable (highest priority)
//! 2. TOML config file
//! 3. Built-in defaults (fallback)
//!
//! A missing config file is not an error; the scanner starts with defaults
//! as long as a backend endpoint is supplied somewhere.

use crate::time::millis_to_duration;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Application directory name under the platform config/data dirs
const APP_DIR: &str = "liq-scanner";

/// Default manifest read mode selector
pub const DEFAULT_MODE: &str = "liquidaciones";

/// Default manifest resync period
pub const DEFAULT_AUTOSYNC_INTERVAL_MS: u64 = 30_000;

/// Default input-settle period for scanner keystrokes
pub const DEFAULT_DEBOUNCE_MS: u64 = 250;

/// Default HTTP request timeout
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional so a partial file only overrides what it names.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Backend URL used for manifest reads and submissions
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Mode selector passed on manifest reads
    #[serde(default)]
    pub mode: Option<String>,

    #[serde(default)]
    pub autosync_interval_ms: Option<u64>,

    #[serde(default)]
    pub debounce_ms: Option<u64>,

    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    /// Durable ledger cache file
    #[serde(default)]
    pub cache_path: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values supplied on the command line or through environment variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub cache_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Fully resolved scanner configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerConfig {
    pub endpoint: String,
    pub mode: String,
    pub autosync_interval: Duration,
    pub debounce: Duration,
    pub request_timeout: Duration,
    pub cache_path: PathBuf,
    pub log_level: String,
}

impl ScannerConfig {
    /// Resolve the effective configuration from overrides, file and defaults
    pub fn resolve(overrides: &ConfigOverrides, file: &TomlConfig) -> Result<Self> {
        let endpoint = overrides
            .endpoint
            .clone()
            .or_else(|| file.endpoint.clone())
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| Error::Config("No backend endpoint configured".to_string()))?;
        validate_endpoint(&endpoint)?;

        let autosync_ms = file
            .autosync_interval_ms
            .unwrap_or(DEFAULT_AUTOSYNC_INTERVAL_MS);
        if autosync_ms == 0 {
            return Err(Error::Config(
                "autosync_interval_ms must be greater than zero".to_string(),
            ));
        }

        let cache_path = overrides
            .cache_path
            .clone()
            .or_else(|| file.cache_path.clone())
            .unwrap_or_else(default_cache_path);

        Ok(Self {
            endpoint,
            mode: file.mode.clone().unwrap_or_else(|| DEFAULT_MODE.to_string()),
            autosync_interval: millis_to_duration(autosync_ms),
            debounce: millis_to_duration(file.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)),
            request_timeout: millis_to_duration(
                file.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
            ),
            cache_path,
            log_level: overrides
                .log_level
                .clone()
                .unwrap_or_else(|| file.logging.level.clone()),
        })
    }
}

/// Reject endpoints that are not absolute http(s) URLs with a host
pub fn validate_endpoint(endpoint: &str) -> Result<()> {
    let url = url::Url::parse(endpoint)
        .map_err(|e| Error::Config(format!("Invalid endpoint '{}': {}", endpoint, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "Endpoint must be an http(s) URL: {}",
            endpoint
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(Error::Config(format!("Endpoint has no host: {}", endpoint)));
    }
    Ok(())
}

/// Load the TOML config file
///
/// With an explicit path the file must exist and parse. Without one the
/// platform locations are searched and a missing file yields defaults.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match find_config_file() {
            Some(path) => path,
            None => {
                warn!("No config file found, using built-in defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Search the platform config locations
///
/// Linux tries ~/.config/liq-scanner/config.toml first, then
/// /etc/liq-scanner/config.toml.
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
        debug!("No user config at {}", path.display());
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(APP_DIR).join("config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }
    None
}

/// OS-dependent default location of the ledger cache
pub fn default_cache_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./liq_scanner_data"))
        .join("scanned.json.zst")
}
