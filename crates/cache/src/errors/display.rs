//! Display implementations for cache errors

use super::types::CacheError;
use std::fmt;

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheUnavailable { cache_name, .. } => {
                write!(f, "Cache '{cache_name}' is unavailable: no servers published")
            }
            Self::AlreadyStarted { cache_name, .. } => {
                write!(f, "Client factory for cache '{cache_name}' is already started")
            }
            Self::Discovery {
                service, source, ..
            } => write!(f, "Membership lookup for service '{service}' failed: {source}"),
            Self::ClientConstruction {
                endpoints, source, ..
            } => write!(f, "Could not build client for servers {endpoints}: {source}"),
            Self::Network {
                endpoint,
                operation,
                source,
                ..
            } => write!(
                f,
                "Network error during {operation} with '{endpoint}': {source}"
            ),
            Self::Timeout {
                operation,
                duration,
                ..
            } => write!(f, "Timeout during {operation} after {duration:?}"),
            Self::InvalidKey { key, reason, .. } => {
                write!(f, "Invalid cache key '{key}': {reason}")
            }
            Self::Configuration { message, .. } => {
                write!(f, "Cache configuration error: {message}")
            }
            Self::Io {
                path,
                operation,
                source,
                ..
            } => write!(
                f,
                "I/O error during {} on '{}': {}",
                operation,
                path.display(),
                source
            ),
            Self::Serialization {
                key,
                operation,
                source,
                ..
            } => write!(f, "Failed to {operation:?} '{key}': {source}"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Discovery { source, .. }
            | Self::ClientConstruction { source, .. }
            | Self::Network { source, .. }
            | Self::Serialization { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
