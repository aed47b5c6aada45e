use async_trait::async_trait;
use cachemesh_core::{Endpoint, TopologySnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::errors::{CacheError, Result};
use crate::membership::MembershipSource;

/// Hand-driven service discovery
///
/// Endpoints are kept in announcement order per service. Lookups can be made
/// to fail to exercise the transient-discovery path, or to panic once.
#[derive(Debug, Default)]
pub struct MockMembership {
    services: RwLock<HashMap<String, Vec<Endpoint>>>,
    failing: AtomicBool,
    panic_next: AtomicBool,
    lookups: AtomicU64,
}

impl MockMembership {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce `endpoint` for `service`; announcing twice has no effect
    pub fn announce(&self, service: &str, endpoint: Endpoint) {
        let mut services = self.services.write();
        let endpoints = services.entry(service.to_string()).or_default();
        if !endpoints.contains(&endpoint) {
            endpoints.push(endpoint);
        }
    }

    /// Withdraw `endpoint` from `service`
    pub fn unannounce(&self, service: &str, endpoint: &Endpoint) {
        if let Some(endpoints) = self.services.write().get_mut(service) {
            endpoints.retain(|e| e != endpoint);
        }
    }

    /// Replace everything announced for `service`
    pub fn replace(&self, service: &str, topology: TopologySnapshot) {
        self.services
            .write()
            .insert(service.to_string(), topology.endpoints().to_vec());
    }

    /// Make every subsequent lookup fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Panic inside the next lookup
    pub fn panic_next(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    /// Number of lookups served so far, failed ones included
    #[must_use]
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipSource for MockMembership {
    async fn lookup(&self, service: &str) -> Result<TopologySnapshot> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("injected membership panic");
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::discovery(service, "injected discovery failure"));
        }

        let services = self.services.read();
        Ok(services
            .get(service)
            .map(|endpoints| TopologySnapshot::new(endpoints.clone()))
            .unwrap_or_default())
    }
}
