//! Cache configuration with precedence and validation
use cachemesh_core::constants::{
    CACHEMESH_CACHE_NAME_VAR, CACHEMESH_CACHE_TYPE_VAR, CACHEMESH_CONFIG_VAR,
    CACHEMESH_REDISCOVERY_INTERVAL_VAR, CACHEMESH_SERVERS_VAR, CACHEMESH_SERVICE_NAME_VAR,
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_CACHE_NAME, DEFAULT_DRAIN_GRACE,
    DEFAULT_GENERATION_POLL_INTERVAL, DEFAULT_REDISCOVERY_INTERVAL, DEFAULT_SERVICE_NAME,
    DEFAULT_SHUTDOWN_GRACE,
};
use cachemesh_core::TopologySnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{CacheError, Error, RecoveryHint, Result, SerializationOp};

/// Which backend a [`Cache`](crate::Cache) uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    /// Remote memcached cluster tracked by a client factory
    #[default]
    Memcache,
    /// In-process map that never evicts
    NonEvicting,
    /// Every read misses, every write is dropped
    None,
}

impl FromStr for CacheType {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memcache" | "memcached" => Ok(Self::Memcache),
            "non_evicting" | "non-evicting" | "local" => Ok(Self::NonEvicting),
            "none" | "off" | "null" => Ok(Self::None),
            other => Err(CacheError::configuration(format!(
                "unknown cache type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memcache => write!(f, "memcache"),
            Self::NonEvicting => write!(f, "non_evicting"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Source of configuration for debugging and precedence tracking
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Default configuration
    #[default]
    Default,
    /// Configuration file
    ConfigFile(PathBuf),
    /// Environment variable
    EnvironmentVariable(String),
    /// Built in code
    Builder,
}

/// Configuration for one named cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backend to use
    pub cache_type: CacheType,
    /// Name used in logs and errors
    pub cache_name: String,
    /// Service name passed to the membership source
    pub service_name: String,
    /// Static `host:port` list used when no membership source is supplied
    pub servers: Vec<String>,
    /// How often membership is polled
    pub rediscovery_interval_ms: u64,
    /// Grace period for a client replaced by a newer topology
    pub drain_grace_ms: u64,
    /// Grace period for the last client when the factory stops
    pub shutdown_grace_ms: u64,
    /// Poll interval of `await_generation_after`
    pub poll_interval_ms: u64,
    /// Whether per-namespace statistics are collected
    pub statistics_enabled: bool,
    /// Where this configuration came from
    #[serde(skip)]
    pub source: ConfigSource,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::Memcache,
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            servers: Vec::new(),
            rediscovery_interval_ms: duration_ms(DEFAULT_REDISCOVERY_INTERVAL),
            drain_grace_ms: duration_ms(DEFAULT_DRAIN_GRACE),
            shutdown_grace_ms: duration_ms(DEFAULT_SHUTDOWN_GRACE),
            poll_interval_ms: duration_ms(DEFAULT_GENERATION_POLL_INTERVAL),
            statistics_enabled: true,
            source: ConfigSource::Default,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl CacheConfig {
    #[must_use]
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    #[must_use]
    pub fn rediscovery_interval(&self) -> Duration {
        Duration::from_millis(self.rediscovery_interval_ms)
    }

    #[must_use]
    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// The configured static server list as a topology
    pub fn topology(&self) -> Result<TopologySnapshot> {
        Ok(TopologySnapshot::parse(&self.servers)?)
    }

    /// Check the configuration for values the factory cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.rediscovery_interval_ms == 0 {
            return Err(Error::configuration(
                "rediscovery_interval_ms must be greater than zero",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::configuration(
                "poll_interval_ms must be greater than zero",
            ));
        }
        if self.cache_name.trim().is_empty() {
            return Err(Error::configuration("cache_name must not be empty"));
        }
        if self.cache_type == CacheType::Memcache && self.service_name.trim().is_empty() {
            return Err(Error::configuration(
                "service_name must not be empty for a memcache cache",
            ));
        }
        self.topology()?;
        Ok(())
    }
}

/// Builder for creating cache configurations
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CacheConfig {
                source: ConfigSource::Builder,
                ..CacheConfig::default()
            },
        }
    }

    pub fn with_cache_type(mut self, cache_type: CacheType) -> Self {
        self.config.cache_type = cache_type;
        self
    }

    pub fn with_cache_name(mut self, name: impl Into<String>) -> Self {
        self.config.cache_name = name.into();
        self
    }

    pub fn with_service_name(mut self, service: impl Into<String>) -> Self {
        self.config.service_name = service.into();
        self
    }

    /// Add a static `host:port` server
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.config.servers.push(server.into());
        self
    }

    pub fn with_rediscovery_interval(mut self, interval: Duration) -> Self {
        self.config.rediscovery_interval_ms = duration_ms(interval);
        self
    }

    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.config.drain_grace_ms = duration_ms(grace);
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace_ms = duration_ms(grace);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = duration_ms(interval);
        self
    }

    pub fn with_statistics(mut self, enabled: bool) -> Self {
        self.config.statistics_enabled = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CacheConfig {
        self.config
    }
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk layout: settings live under a top-level `cache` object
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    cache: Option<CacheConfig>,
}

/// Configuration loader that handles precedence
///
/// Defaults, then the JSON config file, then `CACHEMESH_*` environment
/// variables. The result is validated before it is returned.
pub struct CacheConfigLoader;

impl CacheConfigLoader {
    /// Load configuration with full precedence handling
    pub fn load() -> Result<CacheConfig> {
        let mut config = CacheConfig::default();

        let path = Self::config_file_path()?;
        if path.exists() {
            config = Self::load_from_file(&path)?;
        }

        config = Self::apply_env(config)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<CacheConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Io {
            path: path.to_path_buf(),
            operation: "read config file",
            source: e,
            recovery_hint: RecoveryHint::CheckPermissions {
                path: path.to_path_buf(),
            },
        })?;

        let file: ConfigFile = serde_json::from_str(&content).map_err(|e| Error::Serialization {
            key: path.display().to_string(),
            operation: SerializationOp::Decode,
            source: Box::new(e),
            recovery_hint: RecoveryHint::UpdateConfiguration,
        })?;

        let mut config = file.cache.unwrap_or_default();
        config.source = ConfigSource::ConfigFile(path.to_path_buf());
        Ok(config)
    }

    /// Override fields from `CACHEMESH_*` environment variables
    pub fn apply_env(mut config: CacheConfig) -> Result<CacheConfig> {
        let mut overridden = Vec::new();

        if let Ok(value) = std::env::var(CACHEMESH_CACHE_TYPE_VAR) {
            config.cache_type = value.parse()?;
            overridden.push(CACHEMESH_CACHE_TYPE_VAR);
        }

        if let Ok(value) = std::env::var(CACHEMESH_CACHE_NAME_VAR) {
            config.cache_name = value;
            overridden.push(CACHEMESH_CACHE_NAME_VAR);
        }

        if let Ok(value) = std::env::var(CACHEMESH_SERVICE_NAME_VAR) {
            config.service_name = value;
            overridden.push(CACHEMESH_SERVICE_NAME_VAR);
        }

        if let Ok(value) = std::env::var(CACHEMESH_SERVERS_VAR) {
            config.servers = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            overridden.push(CACHEMESH_SERVERS_VAR);
        }

        if let Ok(value) = std::env::var(CACHEMESH_REDISCOVERY_INTERVAL_VAR) {
            config.rediscovery_interval_ms = value.trim().parse().map_err(|e| {
                Error::configuration(format!(
                    "{CACHEMESH_REDISCOVERY_INTERVAL_VAR} must be a number of milliseconds: {e}"
                ))
            })?;
            overridden.push(CACHEMESH_REDISCOVERY_INTERVAL_VAR);
        }

        if !overridden.is_empty() {
            config.source = ConfigSource::EnvironmentVariable(overridden.join(","));
        }
        Ok(config)
    }

    /// Get the configuration file path
    fn config_file_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CACHEMESH_CONFIG_VAR) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(xdg_config_home)
        } else {
            dirs::config_dir().ok_or_else(|| Error::Configuration {
                message: "Could not determine config directory".to_string(),
                recovery_hint: RecoveryHint::FixUsage {
                    instructions: "Set XDG_CONFIG_HOME or HOME environment variable".to_string(),
                },
            })?
        };

        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }
}
