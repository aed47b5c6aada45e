//! Core error types for the cache system

use std::path::PathBuf;
use std::time::Duration;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Re-export CacheError as Error for convenience
pub use CacheError as Error;

/// Boxed error raised by a membership source or network client implementation
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for cache operations
#[derive(Debug)]
pub enum CacheError {
    /// No client is published: the cluster has no servers or the factory is
    /// not running
    CacheUnavailable {
        cache_name: String,
        recovery_hint: RecoveryHint,
    },

    /// `start()` was called on a factory that is already running
    AlreadyStarted {
        cache_name: String,
        recovery_hint: RecoveryHint,
    },

    /// The membership source failed to answer
    Discovery {
        service: String,
        source: BoxError,
        recovery_hint: RecoveryHint,
    },

    /// A network client could not be built for the given servers
    ClientConstruction {
        endpoints: String,
        source: BoxError,
        recovery_hint: RecoveryHint,
    },

    /// Network error raised by a client while talking to one server
    Network {
        endpoint: String,
        operation: &'static str,
        source: BoxError,
        recovery_hint: RecoveryHint,
    },

    /// Timeout during cache operation
    Timeout {
        operation: &'static str,
        duration: Duration,
        recovery_hint: RecoveryHint,
    },

    /// Invalid cache key
    InvalidKey {
        key: String,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// Configuration error
    Configuration {
        message: String,
        recovery_hint: RecoveryHint,
    },

    /// I/O errors while loading configuration
    Io {
        path: PathBuf,
        operation: &'static str,
        source: std::io::Error,
        recovery_hint: RecoveryHint,
    },

    /// Serialization/deserialization errors
    Serialization {
        key: String,
        operation: SerializationOp,
        source: BoxError,
        recovery_hint: RecoveryHint,
    },
}

/// Recovery hints for error handling
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryHint {
    /// Retry the operation after a delay
    Retry { after: Duration },

    /// Wait for the next topology reconciliation
    AwaitTopology,

    /// Verify network connectivity
    CheckNetwork { endpoint: String },

    /// Check file permissions
    CheckPermissions { path: PathBuf },

    /// Update cache configuration
    UpdateConfiguration,

    /// Fix the calling code
    FixUsage { instructions: String },
}

/// Serialization operation types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializationOp {
    Encode,
    Decode,
}
