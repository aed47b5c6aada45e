use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;

use super::{CacheProvider, CacheStore};
use crate::errors::Result;

/// Backend that stores nothing: every read misses and every write is dropped
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProvider;

#[async_trait]
impl CacheProvider for NullProvider {
    async fn get(&self, _namespace: &str, _keys: &[&str]) -> Result<HashMap<String, Bytes>> {
        Ok(HashMap::new())
    }

    async fn set(&self, _namespace: &str, _stores: Vec<CacheStore>) -> Result<()> {
        Ok(())
    }

    async fn clear(&self, _namespace: &str, _keys: &[&str]) -> Result<()> {
        Ok(())
    }

    async fn add(
        &self,
        _namespace: &str,
        stores: Vec<CacheStore>,
    ) -> Result<HashMap<String, bool>> {
        Ok(stores.into_iter().map(|store| (store.key, false)).collect())
    }
}
