use async_trait::async_trait;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::trace;

use super::{CacheProvider, CacheStore};
use crate::errors::Result;

/// In-process backend that never evicts
///
/// Expiry times are accepted and ignored: entries live until cleared or
/// overwritten with an empty store.
#[derive(Debug, Default)]
pub struct NonEvictingProvider {
    entries: DashMap<(String, String), Bytes>,
}

impl NonEvictingProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries across every namespace
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn entry_key(namespace: &str, key: &str) -> (String, String) {
    (namespace.to_string(), key.to_string())
}

#[async_trait]
impl CacheProvider for NonEvictingProvider {
    async fn get(&self, namespace: &str, keys: &[&str]) -> Result<HashMap<String, Bytes>> {
        let mut found = HashMap::with_capacity(keys.len());
        for &key in keys {
            let data = self
                .entries
                .get(&entry_key(namespace, key))
                .map(|entry| entry.value().clone());
            trace!(namespace, key, hit = data.is_some(), "get");
            if let Some(data) = data {
                found.insert(key.to_string(), data);
            }
        }
        Ok(found)
    }

    async fn set(&self, namespace: &str, stores: Vec<CacheStore>) -> Result<()> {
        for store in stores {
            trace!(namespace, key = %store.key, "set");
            let key = entry_key(namespace, &store.key);
            match store.data {
                Some(data) => {
                    self.entries.insert(key, data);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn clear(&self, namespace: &str, keys: &[&str]) -> Result<()> {
        for &key in keys {
            trace!(namespace, key, "clear");
            self.entries.remove(&entry_key(namespace, key));
        }
        Ok(())
    }

    async fn add(
        &self,
        namespace: &str,
        stores: Vec<CacheStore>,
    ) -> Result<HashMap<String, bool>> {
        let mut result = HashMap::with_capacity(stores.len());
        for store in stores {
            let added = match store.data {
                Some(data) => match self.entries.entry(entry_key(namespace, &store.key)) {
                    Entry::Occupied(_) => false,
                    Entry::Vacant(vacant) => {
                        vacant.insert(data);
                        true
                    }
                },
                None => false,
            };
            trace!(namespace, key = %store.key, added, "add");
            result.insert(store.key, added);
        }
        Ok(result)
    }
}
