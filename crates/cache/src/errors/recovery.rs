//! Recovery utilities and constructors for cache errors

use super::types::{BoxError, CacheError, RecoveryHint};
use cachemesh_core::TopologySnapshot;
use std::time::Duration;

impl CacheError {
    /// Get the recovery hint for this error
    #[must_use]
    pub const fn recovery_hint(&self) -> &RecoveryHint {
        match self {
            Self::CacheUnavailable { recovery_hint, .. }
            | Self::AlreadyStarted { recovery_hint, .. }
            | Self::Discovery { recovery_hint, .. }
            | Self::ClientConstruction { recovery_hint, .. }
            | Self::Network { recovery_hint, .. }
            | Self::Timeout { recovery_hint, .. }
            | Self::InvalidKey { recovery_hint, .. }
            | Self::Configuration { recovery_hint, .. }
            | Self::Io { recovery_hint, .. }
            | Self::Serialization { recovery_hint, .. } => recovery_hint,
        }
    }

    /// Check if this error is transient and can be retried
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.recovery_hint(),
            RecoveryHint::Retry { .. }
                | RecoveryHint::AwaitTopology
                | RecoveryHint::CheckNetwork { .. }
        )
    }

    /// Whether this error means no client was available for the operation
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::CacheUnavailable { .. })
    }

    #[must_use]
    pub fn unavailable(cache_name: impl Into<String>) -> Self {
        Self::CacheUnavailable {
            cache_name: cache_name.into(),
            recovery_hint: RecoveryHint::AwaitTopology,
        }
    }

    #[must_use]
    pub fn already_started(cache_name: impl Into<String>) -> Self {
        Self::AlreadyStarted {
            cache_name: cache_name.into(),
            recovery_hint: RecoveryHint::FixUsage {
                instructions: "call stop() before starting the factory again".to_string(),
            },
        }
    }

    #[must_use]
    pub fn discovery(service: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Discovery {
            service: service.into(),
            source: source.into(),
            recovery_hint: RecoveryHint::AwaitTopology,
        }
    }

    #[must_use]
    pub fn client_construction(topology: &TopologySnapshot, source: impl Into<BoxError>) -> Self {
        Self::ClientConstruction {
            endpoints: topology.to_string(),
            source: source.into(),
            recovery_hint: RecoveryHint::AwaitTopology,
        }
    }

    #[must_use]
    pub fn network(
        endpoint: impl Into<String>,
        operation: &'static str,
        source: impl Into<BoxError>,
    ) -> Self {
        let endpoint = endpoint.into();
        Self::Network {
            recovery_hint: RecoveryHint::CheckNetwork {
                endpoint: endpoint.clone(),
            },
            endpoint,
            operation,
            source: source.into(),
        }
    }

    #[must_use]
    pub fn timeout(operation: &'static str, duration: Duration) -> Self {
        Self::Timeout {
            operation,
            duration,
            recovery_hint: RecoveryHint::Retry { after: duration },
        }
    }

    #[must_use]
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
            recovery_hint: RecoveryHint::FixUsage {
                instructions: "use a non-empty key".to_string(),
            },
        }
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            recovery_hint: RecoveryHint::UpdateConfiguration,
        }
    }
}
