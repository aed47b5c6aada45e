//! The cache façade callers use

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::ClientConnector;
use crate::config::{CacheConfig, CacheType};
use crate::errors::{CacheError, Result};
use crate::factory::{ClientFactory, FactorySettings};
use crate::keys::validate_key;
use crate::membership::{MembershipSource, StaticMembership};
use crate::provider::{
    CacheProvider, CacheStore, MemcacheProvider, NonEvictingProvider, NullProvider,
};
use crate::statistics::{CacheStatistics, CacheStatisticsManager, StatisticsSnapshot};

/// A named cache over one backend
///
/// Cheap to clone; clones share the backend and statistics. Keys must be
/// non-empty. A memcache-backed cache with no servers published reports
/// reads as misses and fails writes with [`CacheError::CacheUnavailable`].
#[derive(Clone)]
pub struct Cache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    name: String,
    cache_type: CacheType,
    provider: Arc<dyn CacheProvider>,
    factory: Option<ClientFactory>,
    statistics: Option<CacheStatisticsManager>,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.inner.name)
            .field("cache_type", &self.inner.cache_type)
            .field("provider", &self.inner.provider)
            .finish_non_exhaustive()
    }
}

impl Cache {
    /// Start building a cache from `config`
    #[must_use]
    pub fn builder(config: CacheConfig) -> CacheBuilder {
        CacheBuilder::new(config)
    }

    /// Start the backend; for memcache this runs the first reconciliation
    pub async fn start(&self) -> Result<()> {
        info!(cache_name = %self.inner.name, cache_type = %self.inner.cache_type, "Starting cache");
        self.inner.provider.start().await
    }

    /// Stop the backend; safe to call more than once
    pub async fn stop(&self) {
        self.inner.provider.stop().await;
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn cache_type(&self) -> CacheType {
        self.inner.cache_type
    }

    /// The factory behind a memcache cache, for observing topology changes
    #[must_use]
    pub fn client_factory(&self) -> Option<&ClientFactory> {
        self.inner.factory.as_ref()
    }

    /// A handle scoped to `namespace`
    #[must_use]
    pub fn with_namespace(&self, namespace: impl Into<String>) -> NamespacedCache {
        NamespacedCache {
            cache: self.clone(),
            namespace: namespace.into(),
        }
    }

    /// Statistics for `namespace`, `None` when statistics are disabled
    #[must_use]
    pub fn statistics(&self, namespace: &str) -> Option<Arc<CacheStatistics>> {
        self.inner
            .statistics
            .as_ref()
            .map(|manager| manager.for_namespace(namespace))
    }

    /// Snapshot of every namespace seen so far
    #[must_use]
    pub fn statistics_snapshot(&self) -> HashMap<String, StatisticsSnapshot> {
        self.inner
            .statistics
            .as_ref()
            .map(CacheStatisticsManager::snapshot)
            .unwrap_or_default()
    }

    /// Fetch `keys` from `namespace`; misses are absent from the result
    pub async fn get(&self, namespace: &str, keys: &[&str]) -> Result<HashMap<String, Bytes>> {
        for key in keys {
            validate_key(key)?;
        }
        let stats = self.statistics(namespace);

        match self.inner.provider.get(namespace, keys).await {
            Ok(found) => {
                if let Some(stats) = &stats {
                    stats.record_fetches(keys.len() as u64, found.len() as u64);
                }
                Ok(found)
            }
            Err(e) if e.is_unavailable() => {
                debug!(cache_name = %self.inner.name, namespace, "No client published, reporting miss");
                if let Some(stats) = &stats {
                    stats.record_unavailable();
                    stats.record_fetches(keys.len() as u64, 0);
                }
                Ok(HashMap::new())
            }
            Err(e) => Err(self.record_failure(stats.as_deref(), e)),
        }
    }

    /// Write every store; a store without data removes its key
    pub async fn set(&self, namespace: &str, stores: Vec<CacheStore>) -> Result<()> {
        for store in &stores {
            validate_key(&store.key)?;
        }
        let stats = self.statistics(namespace);
        let count = stores.len() as u64;

        match self.inner.provider.set(namespace, stores).await {
            Ok(()) => {
                if let Some(stats) = &stats {
                    stats.record_stores(count);
                }
                Ok(())
            }
            Err(e) => Err(self.record_failure(stats.as_deref(), e)),
        }
    }

    /// Remove `keys` from `namespace`
    pub async fn clear(&self, namespace: &str, keys: &[&str]) -> Result<()> {
        for key in keys {
            validate_key(key)?;
        }
        let stats = self.statistics(namespace);

        match self.inner.provider.clear(namespace, keys).await {
            Ok(()) => {
                if let Some(stats) = &stats {
                    stats.record_clears(keys.len() as u64);
                }
                Ok(())
            }
            Err(e) => Err(self.record_failure(stats.as_deref(), e)),
        }
    }

    /// Write each store only if its key is absent
    pub async fn add(
        &self,
        namespace: &str,
        stores: Vec<CacheStore>,
    ) -> Result<HashMap<String, bool>> {
        for store in &stores {
            validate_key(&store.key)?;
        }
        let stats = self.statistics(namespace);

        match self.inner.provider.add(namespace, stores).await {
            Ok(added) => {
                if let Some(stats) = &stats {
                    stats.record_adds(added.values().filter(|&&added| added).count() as u64);
                }
                Ok(added)
            }
            Err(e) => Err(self.record_failure(stats.as_deref(), e)),
        }
    }

    fn record_failure(&self, stats: Option<&CacheStatistics>, error: CacheError) -> CacheError {
        if let Some(stats) = stats {
            if error.is_unavailable() {
                stats.record_unavailable();
            } else {
                stats.record_error();
            }
        }
        debug!(cache_name = %self.inner.name, error = %error, "Cache operation failed");
        error
    }
}

/// A [`Cache`] bound to one namespace
#[derive(Debug, Clone)]
pub struct NamespacedCache {
    cache: Cache,
    namespace: String,
}

impl NamespacedCache {
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Fetch one key
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self
            .cache
            .get(&self.namespace, &[key])
            .await?
            .remove(key))
    }

    /// Fetch several keys; misses are absent from the result
    pub async fn get_all(&self, keys: &[&str]) -> Result<HashMap<String, Bytes>> {
        self.cache.get(&self.namespace, keys).await
    }

    pub async fn set(
        &self,
        key: &str,
        data: impl Into<Bytes>,
        expiry: DateTime<Utc>,
    ) -> Result<()> {
        self.cache
            .set(&self.namespace, vec![CacheStore::new(key, data, expiry)])
            .await
    }

    /// Store only if absent, returning whether the value was written
    pub async fn add(
        &self,
        key: &str,
        data: impl Into<Bytes>,
        expiry: DateTime<Utc>,
    ) -> Result<bool> {
        let added = self
            .cache
            .add(&self.namespace, vec![CacheStore::new(key, data, expiry)])
            .await?;
        Ok(added.get(key).copied().unwrap_or(false))
    }

    pub async fn clear(&self, key: &str) -> Result<()> {
        self.cache.clear(&self.namespace, &[key]).await
    }
}

/// Assembles a [`Cache`] from configuration and, for memcache, the
/// membership source and client connector to use
pub struct CacheBuilder {
    config: CacheConfig,
    membership: Option<Arc<dyn MembershipSource>>,
    connector: Option<Arc<dyn ClientConnector>>,
}

impl CacheBuilder {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            membership: None,
            connector: None,
        }
    }

    /// Use `membership` instead of the configured static server list
    #[must_use]
    pub fn with_membership(mut self, membership: Arc<dyn MembershipSource>) -> Self {
        self.membership = Some(membership);
        self
    }

    /// Client library used to reach memcache servers
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn ClientConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Validate the configuration and build the cache
    ///
    /// The cache is not started; call [`Cache::start`].
    pub fn build(self) -> Result<Cache> {
        self.config.validate()?;

        let (provider, factory): (Arc<dyn CacheProvider>, Option<ClientFactory>) =
            match self.config.cache_type {
                CacheType::Memcache => {
                    let connector = self.connector.ok_or_else(|| {
                        CacheError::configuration(format!(
                            "cache '{}' is memcache-backed but has no client connector",
                            self.config.cache_name
                        ))
                    })?;
                    let membership = match self.membership {
                        Some(membership) => membership,
                        None if !self.config.servers.is_empty() => {
                            Arc::new(StaticMembership::new(self.config.topology()?))
                        }
                        None => {
                            return Err(CacheError::configuration(format!(
                                "cache '{}' has neither a membership source nor static servers",
                                self.config.cache_name
                            )))
                        }
                    };
                    let factory = ClientFactory::new(
                        FactorySettings::from(&self.config),
                        membership,
                        connector,
                    );
                    (
                        Arc::new(MemcacheProvider::new(factory.clone())),
                        Some(factory),
                    )
                }
                CacheType::NonEvicting => (Arc::new(NonEvictingProvider::new()), None),
                CacheType::None => (Arc::new(NullProvider), None),
            };

        debug!(
            cache_name = %self.config.cache_name,
            cache_type = %self.config.cache_type,
            "Built cache"
        );

        Ok(Cache {
            inner: Arc::new(CacheInner {
                name: self.config.cache_name.clone(),
                cache_type: self.config.cache_type,
                provider,
                factory,
                statistics: self
                    .config
                    .statistics_enabled
                    .then(CacheStatisticsManager::new),
            }),
        })
    }
}
