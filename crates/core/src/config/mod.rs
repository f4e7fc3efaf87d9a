//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (EDGEPIN_*)
//! 2. TOML config file (if EDGEPIN_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Lower bound for the periodic sweep interval.
pub const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(5);

const HOUR_MS: u64 = 60 * 60 * 1000;
const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (EDGEPIN_*)
/// 2. TOML config file (if EDGEPIN_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the durable JSON index.
    ///
    /// Set via EDGEPIN_INDEX_PATH environment variable.
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Base URL of the content store's RPC API.
    ///
    /// Set via EDGEPIN_API_BASE environment variable.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// User-Agent string for store RPC requests.
    ///
    /// Set via EDGEPIN_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Bounded wait for a single store call, in milliseconds.
    ///
    /// Set via EDGEPIN_STORE_TIMEOUT_MS environment variable.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Entry time-to-live in milliseconds, anchored at (re-)admission.
    ///
    /// Set via EDGEPIN_TTL_MS environment variable.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,

    /// Debounce window for durable index writes, in milliseconds.
    ///
    /// Set via EDGEPIN_FLUSH_DEBOUNCE_MS environment variable.
    #[serde(default = "default_flush_debounce_ms")]
    pub flush_debounce_ms: u64,

    /// Global byte quota enforced by LRU eviction. 0 disables the quota.
    ///
    /// Set via EDGEPIN_CACHE_MAX_BYTES environment variable.
    #[serde(default = "default_cache_max_bytes")]
    pub cache_max_bytes: u64,

    /// Per-item size ceiling. 0 disables the ceiling.
    ///
    /// Set via EDGEPIN_CACHE_MAX_FILE_BYTES environment variable.
    #[serde(default = "default_cache_max_file_bytes")]
    pub cache_max_file_bytes: u64,

    /// Interval between periodic maintenance passes, in milliseconds.
    ///
    /// Set via EDGEPIN_CLEANUP_INTERVAL_MS environment variable.
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,

    /// Delay of the near-term pass scheduled after an admission.
    ///
    /// Set via EDGEPIN_MAINTENANCE_SOON_DELAY_MS environment variable.
    #[serde(default = "default_maintenance_soon_delay_ms")]
    pub maintenance_soon_delay_ms: u64,

    /// Delay of the first pass after startup.
    ///
    /// Set via EDGEPIN_INITIAL_SWEEP_DELAY_MS environment variable.
    #[serde(default = "default_initial_sweep_delay_ms")]
    pub initial_sweep_delay_ms: u64,

    /// How long a resolved mutable name is reused, in milliseconds.
    ///
    /// Set via EDGEPIN_NAME_CACHE_TTL_MS environment variable.
    #[serde(default = "default_name_cache_ttl_ms")]
    pub name_cache_ttl_ms: u64,
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./edgepin-index.json")
}

fn default_api_base() -> String {
    "http://127.0.0.1:5001".into()
}

fn default_user_agent() -> String {
    "edgepin/0.1".into()
}

fn default_store_timeout_ms() -> u64 {
    60_000
}

fn default_ttl_ms() -> u64 {
    72 * HOUR_MS
}

fn default_flush_debounce_ms() -> u64 {
    1_500
}

fn default_cache_max_bytes() -> u64 {
    10 * GIB
}

fn default_cache_max_file_bytes() -> u64 {
    200 * MIB
}

fn default_cleanup_interval_ms() -> u64 {
    10 * 60 * 1000
}

fn default_maintenance_soon_delay_ms() -> u64 {
    2_000
}

fn default_initial_sweep_delay_ms() -> u64 {
    15_000
}

fn default_name_cache_ttl_ms() -> u64 {
    5 * 60 * 1000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            api_base: default_api_base(),
            user_agent: default_user_agent(),
            store_timeout_ms: default_store_timeout_ms(),
            ttl_ms: default_ttl_ms(),
            flush_debounce_ms: default_flush_debounce_ms(),
            cache_max_bytes: default_cache_max_bytes(),
            cache_max_file_bytes: default_cache_max_file_bytes(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            maintenance_soon_delay_ms: default_maintenance_soon_delay_ms(),
            initial_sweep_delay_ms: default_initial_sweep_delay_ms(),
            name_cache_ttl_ms: default_name_cache_ttl_ms(),
        }
    }
}

impl AppConfig {
    /// Store call timeout as Duration for use with reqwest/tokio.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `EDGEPIN_`
    /// 2. TOML file from `EDGEPIN_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("EDGEPIN_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("EDGEPIN_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Runtime cache settings derived from this configuration.
    ///
    /// The cleanup interval is raised to [`MIN_CLEANUP_INTERVAL`] if configured below it.
    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: Duration::from_millis(self.ttl_ms),
            flush_debounce: Duration::from_millis(self.flush_debounce_ms),
            max_bytes: self.cache_max_bytes,
            max_file_bytes: self.cache_max_file_bytes,
            cleanup_interval: Duration::from_millis(self.cleanup_interval_ms).max(MIN_CLEANUP_INTERVAL),
            maintenance_soon_delay: Duration::from_millis(self.maintenance_soon_delay_ms),
            initial_sweep_delay: Duration::from_millis(self.initial_sweep_delay_ms),
            name_cache_ttl: Duration::from_millis(self.name_cache_ttl_ms),
            store_timeout: self.store_timeout(),
        }
    }
}

/// Limits and timings the running cache reads on every decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub flush_debounce: Duration,
    /// 0 disables the quota.
    pub max_bytes: u64,
    /// 0 disables the per-item ceiling.
    pub max_file_bytes: u64,
    pub cleanup_interval: Duration,
    pub maintenance_soon_delay: Duration,
    pub initial_sweep_delay: Duration,
    pub name_cache_ttl: Duration,
    pub store_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        AppConfig::default().cache_settings()
    }
}

impl CacheSettings {
    /// TTL in the millisecond unit stored on entries.
    pub fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// Whether `size_bytes` exceeds the per-item ceiling.
    pub fn exceeds_file_limit(&self, size_bytes: u64) -> bool {
        self.max_file_bytes > 0 && size_bytes > self.max_file_bytes
    }

    /// Whether `total_bytes` exceeds the global quota.
    pub fn exceeds_quota(&self, total_bytes: u64) -> bool {
        self.max_bytes > 0 && total_bytes > self.max_bytes
    }
}
