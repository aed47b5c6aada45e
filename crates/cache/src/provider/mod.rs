//! Storage backends behind the [`Cache`](crate::Cache) façade
//!
//! Every backend speaks the same batch-oriented, namespace-scoped interface.
//! Namespaces never collide: the same key under two namespaces names two
//! different entries.

mod local;
mod null;
mod remote;

pub use local::NonEvictingProvider;
pub use null::NullProvider;
pub use remote::MemcacheProvider;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::errors::Result;

/// One write in a batch
///
/// A store without data removes the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStore {
    pub key: String,
    pub data: Option<Bytes>,
    pub expiry: DateTime<Utc>,
}

impl CacheStore {
    #[must_use]
    pub fn new(key: impl Into<String>, data: impl Into<Bytes>, expiry: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            data: Some(data.into()),
            expiry,
        }
    }

    /// A store that removes `key`
    #[must_use]
    pub fn removal(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            data: None,
            expiry: Utc::now(),
        }
    }
}

/// A cache backend
#[async_trait]
pub trait CacheProvider: Send + Sync + std::fmt::Debug {
    /// Fetch `keys`; missing keys are absent from the result
    async fn get(&self, namespace: &str, keys: &[&str]) -> Result<HashMap<String, Bytes>>;

    /// Write every store, removing keys whose store carries no data
    async fn set(&self, namespace: &str, stores: Vec<CacheStore>) -> Result<()>;

    /// Remove `keys`
    async fn clear(&self, namespace: &str, keys: &[&str]) -> Result<()>;

    /// Write each store only if its key is absent, reporting which were written
    ///
    /// A store without data is never written and reports `false`.
    async fn add(&self, namespace: &str, stores: Vec<CacheStore>)
        -> Result<HashMap<String, bool>>;

    /// Acquire whatever the backend needs before serving requests
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Release backend resources
    async fn stop(&self) {}
}
