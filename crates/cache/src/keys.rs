//! Namespaced key encoding for remote servers
//!
//! Memcached keys are limited to 250 bytes without whitespace or control
//! characters. Keys are sent as `namespace:key` when that fits, and otherwise
//! as a SHA-256 digest so that any caller key stays usable. A namespace that
//! itself contains the separator is always digested, since joining it would be
//! ambiguous.

use cachemesh_core::constants::{MAX_REMOTE_KEY_LENGTH, NAMESPACE_SEPARATOR};
use sha2::{Digest, Sha256};

use crate::errors::{CacheError, Result};

/// Reject keys the façade never accepts, whatever the backend
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::invalid_key(key, "key must not be empty"));
    }
    Ok(())
}

/// Encode a namespaced key for a memcached-compatible server
pub fn encode_remote_key(namespace: &str, key: &str) -> Result<String> {
    validate_key(key)?;

    let plain_namespace = !namespace.contains(NAMESPACE_SEPARATOR);
    let raw = format!("{namespace}{NAMESPACE_SEPARATOR}{key}");
    if plain_namespace && is_wire_safe(&raw) {
        return Ok(raw);
    }

    let digest = key_digest(namespace, key);
    // 64 hex chars plus the separator
    let prefix_budget = MAX_REMOTE_KEY_LENGTH - digest.len() - 1;
    if plain_namespace
        && !namespace.is_empty()
        && namespace.len() <= prefix_budget
        && is_wire_safe(namespace)
    {
        Ok(format!("{namespace}{NAMESPACE_SEPARATOR}{digest}"))
    } else {
        Ok(digest)
    }
}

/// Length-prefixed so that no two (namespace, key) pairs share an input
fn key_digest(namespace: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update((namespace.len() as u64).to_be_bytes());
    hasher.update(namespace.as_bytes());
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

fn is_wire_safe(value: &str) -> bool {
    value.len() <= MAX_REMOTE_KEY_LENGTH && value.bytes().all(|b| b.is_ascii_graphic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_short_keys_are_prefixed() {
        assert_eq!(
            encode_remote_key("users", "42").unwrap(),
            "users:42".to_string()
        );
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let err = encode_remote_key("users", "").unwrap_err();
        assert!(matches!(err, CacheError::InvalidKey { .. }));
    }

    #[test]
    fn test_unsafe_keys_are_hashed_under_namespace() {
        let encoded = encode_remote_key("users", "has space").unwrap();
        assert!(encoded.starts_with("users:"));
        assert_eq!(encoded.len(), "users:".len() + 64);
        assert_ne!(encoded, encode_remote_key("users", "has  space").unwrap());
    }

    #[test]
    fn test_long_namespace_falls_back_to_bare_digest() {
        // Too long to send raw, and too long to prefix the digest
        let namespace = "n".repeat(249);
        let encoded = encode_remote_key(&namespace, "k").unwrap();
        assert_eq!(encoded.len(), 64);
    }

    #[test]
    fn test_separator_in_namespace_is_not_ambiguous() {
        let nested = encode_remote_key("a:b", "c").unwrap();
        let flat = encode_remote_key("a", "b:c").unwrap();
        assert_eq!(flat, "a:b:c");
        assert_ne!(nested, flat);
        assert_eq!(nested.len(), 64);
    }

    proptest! {
        #[test]
        fn encoded_keys_are_always_wire_safe(namespace in ".{0,300}", key in ".{1,300}") {
            let encoded = encode_remote_key(&namespace, &key).unwrap();
            prop_assert!(is_wire_safe(&encoded));
        }

        #[test]
        fn encoding_separates_namespaces(key in "[a-z0-9]{1,20}") {
            prop_assert_ne!(
                encode_remote_key("a", &key).unwrap(),
                encode_remote_key("b", &key).unwrap()
            );
        }

        #[test]
        fn distinct_pairs_encode_distinctly(
            a in "[a-z:]{0,6}",
            b in "[a-z:]{0,6}",
            k1 in "[a-z:]{1,6}",
            k2 in "[a-z:]{1,6}",
        ) {
            prop_assume!((&a, &k1) != (&b, &k2));
            prop_assert_ne!(
                encode_remote_key(&a, &k1).unwrap(),
                encode_remote_key(&b, &k2).unwrap()
            );
        }
    }
}
