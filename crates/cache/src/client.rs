//! The seam between the factory and a memcached client library
//!
//! The factory never speaks a wire protocol itself. It asks a
//! [`ClientConnector`] for a [`NetworkCacheClient`] bound to a topology and
//! publishes whatever comes back.

use async_trait::async_trait;
use bytes::Bytes;
use cachemesh_core::{Endpoint, TopologySnapshot};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::Result;

/// A client bound to a fixed set of cache servers
///
/// Implementations decide which server owns a key. Errors from individual
/// servers are returned as-is; callers see them unmodified.
#[async_trait]
pub trait NetworkCacheClient: Send + Sync + std::fmt::Debug {
    /// Fetch a value, `None` on a miss
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store a value unconditionally
    async fn set(&self, key: &str, value: Bytes, expiry: DateTime<Utc>) -> Result<()>;

    /// Store a value only if the key is absent, returning whether it was stored
    async fn add(&self, key: &str, value: Bytes, expiry: DateTime<Utc>) -> Result<bool>;

    /// Remove a key, returning whether it existed
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Close the client
    ///
    /// Operations already in flight get up to `grace` to finish, after which
    /// the client is closed regardless. Closing a closed client is a no-op.
    async fn close(&self, grace: Duration);

    /// The servers this client was built for, in order
    fn endpoints(&self) -> &[Endpoint];
}

/// Builds network clients for a topology
#[async_trait]
pub trait ClientConnector: Send + Sync {
    /// Build a client bound to `topology`, which is never empty
    async fn connect(&self, topology: &TopologySnapshot) -> Result<Arc<dyn NetworkCacheClient>>;
}
