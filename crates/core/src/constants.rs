/// Constants used throughout the cachemesh codebase
use std::time::Duration;

// Cache naming
pub const DEFAULT_CACHE_NAME: &str = "<default>";
pub const DEFAULT_SERVICE_NAME: &str = "memcached";

// Reconciliation timing
pub const DEFAULT_REDISCOVERY_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_GENERATION_POLL_INTERVAL: Duration = Duration::from_millis(10);

// Draining
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_millis(100);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

// Memcached key limits
pub const MAX_REMOTE_KEY_LENGTH: usize = 250;
pub const NAMESPACE_SEPARATOR: char = ':';

// Environment variable names
pub const CACHEMESH_LOG_VAR: &str = "CACHEMESH_LOG";
pub const CACHEMESH_CONFIG_VAR: &str = "CACHEMESH_CONFIG";
pub const CACHEMESH_CACHE_TYPE_VAR: &str = "CACHEMESH_CACHE_TYPE";
pub const CACHEMESH_CACHE_NAME_VAR: &str = "CACHEMESH_CACHE_NAME";
pub const CACHEMESH_SERVICE_NAME_VAR: &str = "CACHEMESH_SERVICE_NAME";
pub const CACHEMESH_SERVERS_VAR: &str = "CACHEMESH_SERVERS";
pub const CACHEMESH_REDISCOVERY_INTERVAL_VAR: &str = "CACHEMESH_REDISCOVERY_INTERVAL_MS";

// Config file location under the XDG config directory
pub const CONFIG_DIR_NAME: &str = "cachemesh";
pub const CONFIG_FILE_NAME: &str = "config.json";
