//! Per-namespace cache statistics

use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Counters for one cache namespace
#[derive(Debug, Default)]
pub struct CacheStatistics {
    namespace: String,
    stores: AtomicU64,
    fetches: AtomicU64,
    hits: AtomicU64,
    clears: AtomicU64,
    adds: AtomicU64,
    errors: AtomicU64,
    unavailable: AtomicU64,
}

/// Point-in-time copy of [`CacheStatistics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    pub namespace: String,
    pub stores: u64,
    pub fetches: u64,
    pub hits: u64,
    pub misses: u64,
    pub clears: u64,
    pub adds: u64,
    pub errors: u64,
    pub unavailable: u64,
}

impl CacheStatistics {
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Namespace with characters that are unsafe in metric or object names
    /// (`,` `=` `:` `*` `?`) replaced by `_`
    #[must_use]
    pub fn export_name(&self) -> String {
        sanitize_namespace(&self.namespace)
    }

    pub fn record_stores(&self, count: u64) {
        self.stores.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_fetches(&self, requested: u64, hits: u64) {
        self.fetches.fetch_add(requested, Ordering::Relaxed);
        self.hits.fetch_add(hits, Ordering::Relaxed);
    }

    pub fn record_clears(&self, count: u64) {
        self.clears.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_adds(&self, count: u64) {
        self.adds.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// An operation found no published client
    pub fn record_unavailable(&self) {
        self.unavailable.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatisticsSnapshot {
        let fetches = self.fetches.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        StatisticsSnapshot {
            namespace: self.namespace.clone(),
            stores: self.stores.load(Ordering::Relaxed),
            fetches,
            hits,
            misses: fetches.saturating_sub(hits),
            clears: self.clears.load(Ordering::Relaxed),
            adds: self.adds.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
        }
    }
}

/// Registry of statistics, one entry per namespace seen
#[derive(Debug, Default)]
pub struct CacheStatisticsManager {
    statistics: DashMap<String, Arc<CacheStatistics>>,
}

impl CacheStatisticsManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics for `namespace`, created on first use
    pub fn for_namespace(&self, namespace: &str) -> Arc<CacheStatistics> {
        if let Some(existing) = self.statistics.get(namespace) {
            return Arc::clone(existing.value());
        }

        Arc::clone(
            self.statistics
                .entry(namespace.to_string())
                .or_insert_with(|| {
                    debug!(namespace, "Initializing statistics for new cache namespace");
                    Arc::new(CacheStatistics::new(namespace))
                })
                .value(),
        )
    }

    /// Snapshot of every namespace
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, StatisticsSnapshot> {
        self.statistics
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }
}

fn sanitize_namespace(namespace: &str) -> String {
    namespace
        .chars()
        .map(|c| match c {
            ',' | '=' | ':' | '*' | '?' => '_',
            other => other,
        })
        .collect()
}
