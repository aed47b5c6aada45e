//! Error conversion utilities

use super::types::{CacheError, RecoveryHint, SerializationOp};

/// Convert serde_json errors to cache errors
impl From<serde_json::Error> for CacheError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization {
            key: String::new(),
            operation: SerializationOp::Decode,
            source: Box::new(error),
            recovery_hint: RecoveryHint::UpdateConfiguration,
        }
    }
}

/// Convert core validation errors to cache errors
impl From<cachemesh_core::Error> for CacheError {
    fn from(error: cachemesh_core::Error) -> Self {
        Self::Configuration {
            message: error.to_string(),
            recovery_hint: RecoveryHint::UpdateConfiguration,
        }
    }
}
