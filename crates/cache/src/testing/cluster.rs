use bytes::Bytes;
use cachemesh_core::Endpoint;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct StoredItem {
    data: Bytes,
    expires_at: DateTime<Utc>,
}

impl StoredItem {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// One simulated cache server
#[derive(Debug)]
pub struct InMemoryServer {
    endpoint: Endpoint,
    items: DashMap<String, StoredItem>,
    up: AtomicBool,
}

impl InMemoryServer {
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            items: DashMap::new(),
            up: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Whether the server accepts connections and requests
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    /// Bring the server down or back up; stored items survive either way
    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    /// Number of unexpired items held
    #[must_use]
    pub fn current_items(&self) -> usize {
        let now = Utc::now();
        self.items.iter().filter(|item| item.is_live(now)).count()
    }

    pub(crate) fn get(&self, key: &str) -> Option<Bytes> {
        let now = Utc::now();
        // The read guard must be released before removing from the same shard
        let lookup = self
            .items
            .get(key)
            .map(|item| item.is_live(now).then(|| item.data.clone()));
        match lookup {
            Some(Some(data)) => Some(data),
            Some(None) => {
                self.items.remove(key);
                None
            }
            None => None,
        }
    }

    pub(crate) fn set(&self, key: &str, data: Bytes, expires_at: DateTime<Utc>) {
        self.items
            .insert(key.to_string(), StoredItem { data, expires_at });
    }

    pub(crate) fn add(&self, key: &str, data: Bytes, expires_at: DateTime<Utc>) -> bool {
        let now = Utc::now();
        match self.items.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    false
                } else {
                    occupied.insert(StoredItem { data, expires_at });
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredItem { data, expires_at });
                true
            }
        }
    }

    pub(crate) fn remove(&self, key: &str) -> bool {
        self.items.remove(key).is_some()
    }
}

/// A set of simulated servers addressed by endpoint
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    servers: DashMap<Endpoint, Arc<InMemoryServer>>,
}

impl InMemoryCluster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a server at `endpoint`, or return the one already there
    pub fn start_server(&self, endpoint: Endpoint) -> Arc<InMemoryServer> {
        Arc::clone(
            self.servers
                .entry(endpoint.clone())
                .or_insert_with(|| Arc::new(InMemoryServer::new(endpoint)))
                .value(),
        )
    }

    #[must_use]
    pub fn server(&self, endpoint: &Endpoint) -> Option<Arc<InMemoryServer>> {
        self.servers.get(endpoint).map(|s| Arc::clone(s.value()))
    }

    /// Unexpired items across every server
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.servers.iter().map(|s| s.current_items()).sum()
    }
}
