//! Topology-tracking cache client for memcached clusters
//!
//! This crate keeps a network client pointed at whatever servers a cluster
//! currently has, and puts a namespaced cache façade in front of it:
//! - [`ClientFactory`] polls a [`MembershipSource`], rebuilds the client when
//!   the server set changes and publishes it atomically
//! - [`Cache`] / [`NamespacedCache`] route each operation through the
//!   published client, or through an in-process backend
//! - [`CacheConfig`] loads settings from code, a JSON file or the environment
//!
//! The wire protocol is not implemented here. Callers plug a client library in
//! through [`ClientConnector`].

pub mod cache;
pub mod client;
pub mod config;
pub mod errors;
pub mod factory;
pub mod keys;
pub mod membership;
pub mod provider;
pub mod statistics;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod tests;

pub use cache::{Cache, CacheBuilder, NamespacedCache};
pub use client::{ClientConnector, NetworkCacheClient};
pub use config::{CacheConfig, CacheConfigBuilder, CacheConfigLoader, CacheType, ConfigSource};
pub use errors::{CacheError, Error, RecoveryHint, Result};
pub use factory::{ClientFactory, ClientHandle, FactorySettings};
pub use membership::{DnsMembership, MembershipSource, StaticMembership};
pub use provider::{CacheProvider, CacheStore, MemcacheProvider, NonEvictingProvider, NullProvider};
pub use statistics::{CacheStatistics, CacheStatisticsManager, StatisticsSnapshot};
