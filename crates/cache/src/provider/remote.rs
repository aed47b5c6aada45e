use async_trait::async_trait;
use bytes::Bytes;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

use super::{CacheProvider, CacheStore};
use crate::errors::{CacheError, Result};
use crate::factory::{ClientFactory, ClientHandle};
use crate::keys::encode_remote_key;

/// Backend that talks to the memcached cluster a [`ClientFactory`] tracks
///
/// Each call loads the published client exactly once and uses it for the
/// whole batch. With no client published every call fails with
/// [`CacheError::CacheUnavailable`]; errors from the client itself are
/// returned unchanged.
#[derive(Debug, Clone)]
pub struct MemcacheProvider {
    factory: ClientFactory,
}

impl MemcacheProvider {
    #[must_use]
    pub fn new(factory: ClientFactory) -> Self {
        Self { factory }
    }

    #[must_use]
    pub fn factory(&self) -> &ClientFactory {
        &self.factory
    }

    fn client(&self) -> Result<Arc<ClientHandle>> {
        self.factory
            .current_client()
            .ok_or_else(|| CacheError::unavailable(self.factory.cache_name()))
    }
}

#[async_trait]
impl CacheProvider for MemcacheProvider {
    async fn get(&self, namespace: &str, keys: &[&str]) -> Result<HashMap<String, Bytes>> {
        let client = self.client()?;

        let lookups = keys.iter().map(|&key| {
            let client = &client;
            async move {
                let remote = encode_remote_key(namespace, key)?;
                let data = client.get(&remote).await?;
                trace!(namespace, key, hit = data.is_some(), "get");
                Ok::<_, CacheError>(data.map(|data| (key.to_string(), data)))
            }
        });

        Ok(try_join_all(lookups).await?.into_iter().flatten().collect())
    }

    async fn set(&self, namespace: &str, stores: Vec<CacheStore>) -> Result<()> {
        let client = self.client()?;

        let writes = stores.into_iter().map(|store| {
            let client = &client;
            async move {
                let remote = encode_remote_key(namespace, &store.key)?;
                trace!(namespace, key = %store.key, "set");
                match store.data {
                    Some(data) => client.set(&remote, data, store.expiry).await,
                    None => client.remove(&remote).await.map(|_| ()),
                }
            }
        });

        try_join_all(writes).await?;
        Ok(())
    }

    async fn clear(&self, namespace: &str, keys: &[&str]) -> Result<()> {
        let client = self.client()?;

        let removals = keys.iter().map(|&key| {
            let client = &client;
            async move {
                let remote = encode_remote_key(namespace, key)?;
                trace!(namespace, key, "clear");
                client.remove(&remote).await
            }
        });

        try_join_all(removals).await?;
        Ok(())
    }

    async fn add(
        &self,
        namespace: &str,
        stores: Vec<CacheStore>,
    ) -> Result<HashMap<String, bool>> {
        let client = self.client()?;

        let adds = stores.into_iter().map(|store| {
            let client = &client;
            async move {
                let remote = encode_remote_key(namespace, &store.key)?;
                let added = match store.data {
                    Some(data) => client.add(&remote, data, store.expiry).await?,
                    None => false,
                };
                trace!(namespace, key = %store.key, added, "add");
                Ok::<_, CacheError>((store.key, added))
            }
        });

        Ok(try_join_all(adds).await?.into_iter().collect())
    }

    async fn start(&self) -> Result<()> {
        self.factory.start().await
    }

    async fn stop(&self) {
        self.factory.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConnector;
    use crate::factory::FactorySettings;
    use crate::membership::MembershipSource;
    use crate::testing::{InMemoryCluster, InMemoryConnector, MockMembership};
    use cachemesh_core::{Endpoint, TopologySnapshot};
    use chrono::Utc;

    const SERVICE: &str = "memcached";

    fn expiry() -> chrono::DateTime<Utc> {
        Utc::now() + chrono::Duration::hours(1)
    }

    async fn started_provider() -> (MemcacheProvider, Arc<MockMembership>, Arc<InMemoryCluster>) {
        let cluster = Arc::new(InMemoryCluster::new());
        let membership = Arc::new(MockMembership::new());
        for port in [11211, 11212] {
            let endpoint = Endpoint::new("127.0.0.1", port);
            cluster.start_server(endpoint.clone());
            membership.announce(SERVICE, endpoint);
        }
        let factory = ClientFactory::new(
            FactorySettings::default(),
            Arc::clone(&membership) as Arc<dyn MembershipSource>,
            Arc::new(InMemoryConnector::new(Arc::clone(&cluster))) as Arc<dyn ClientConnector>,
        );
        let provider = MemcacheProvider::new(factory);
        provider.start().await.unwrap();
        (provider, membership, cluster)
    }

    #[tokio::test]
    async fn test_set_get_clear_roundtrip() {
        let (provider, _, cluster) = started_provider().await;

        provider
            .set(
                "ns",
                vec![
                    CacheStore::new("a", Bytes::from_static(b"1"), expiry()),
                    CacheStore::new("b", Bytes::from_static(b"2"), expiry()),
                ],
            )
            .await
            .unwrap();
        assert_eq!(cluster.total_items(), 2);

        let found = provider.get("ns", &["a", "b", "c"]).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found["a"], Bytes::from_static(b"1"));

        // Namespaces are disjoint
        assert!(provider.get("other", &["a"]).await.unwrap().is_empty());

        provider.clear("ns", &["a"]).await.unwrap();
        let found = provider.get("ns", &["a", "b"]).await.unwrap();
        assert_eq!(found.keys().collect::<Vec<_>>(), vec!["b"]);

        provider.stop().await;
    }

    #[tokio::test]
    async fn test_store_without_data_removes() {
        let (provider, _, _) = started_provider().await;
        provider
            .set("ns", vec![CacheStore::new("a", Bytes::from_static(b"1"), expiry())])
            .await
            .unwrap();
        provider
            .set("ns", vec![CacheStore::removal("a")])
            .await
            .unwrap();
        assert!(provider.get("ns", &["a"]).await.unwrap().is_empty());
        provider.stop().await;
    }

    #[tokio::test]
    async fn test_add_only_writes_absent_keys() {
        let (provider, _, _) = started_provider().await;
        provider
            .set("ns", vec![CacheStore::new("a", Bytes::from_static(b"old"), expiry())])
            .await
            .unwrap();

        let added = provider
            .add(
                "ns",
                vec![
                    CacheStore::new("a", Bytes::from_static(b"new"), expiry()),
                    CacheStore::new("b", Bytes::from_static(b"new"), expiry()),
                    CacheStore::removal("c"),
                ],
            )
            .await
            .unwrap();

        assert!(!added["a"]);
        assert!(added["b"]);
        assert!(!added["c"]);
        let found = provider.get("ns", &["a"]).await.unwrap();
        assert_eq!(found["a"], Bytes::from_static(b"old"));
        provider.stop().await;
    }

    #[tokio::test]
    async fn test_no_published_client_is_unavailable() {
        let (provider, membership, _) = started_provider().await;
        let generation = provider.factory().current_generation();
        membership.replace(SERVICE, TopologySnapshot::empty());
        provider.factory().reconcile_now().await;
        assert!(provider.factory().current_generation() > generation);

        let err = provider.get("ns", &["a"]).await.unwrap_err();
        assert!(err.is_unavailable());
        let err = provider
            .set("ns", vec![CacheStore::new("a", Bytes::from_static(b"1"), expiry())])
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        provider.stop().await;
    }

    #[tokio::test]
    async fn test_client_errors_pass_through() {
        let (provider, _, cluster) = started_provider().await;
        cluster
            .server(&Endpoint::new("127.0.0.1", 11211))
            .unwrap()
            .set_up(false);
        cluster
            .server(&Endpoint::new("127.0.0.1", 11212))
            .unwrap()
            .set_up(false);

        let err = provider.get("ns", &["a"]).await.unwrap_err();
        assert!(matches!(err, CacheError::Network { .. }));
        provider.stop().await;
    }

    #[tokio::test]
    async fn test_empty_key_is_rejected() {
        let (provider, _, _) = started_provider().await;
        let err = provider.clear("ns", &[""]).await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidKey { .. }));
        provider.stop().await;
    }
}
