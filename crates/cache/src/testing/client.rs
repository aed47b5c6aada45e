use async_trait::async_trait;
use bytes::Bytes;
use cachemesh_core::{Endpoint, TopologySnapshot};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use xxhash_rust::xxh3::{xxh3_64, xxh3_64_with_seed};

use super::cluster::{InMemoryCluster, InMemoryServer};
use crate::client::{ClientConnector, NetworkCacheClient};
use crate::errors::{CacheError, Result};

const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Decrements the in-flight counter when an operation ends, however it ends
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Client over a fixed set of [`InMemoryServer`]s
#[derive(Debug)]
pub struct InMemoryClient {
    endpoints: Vec<Endpoint>,
    servers: Vec<(u64, Arc<InMemoryServer>)>,
    op_delay: Duration,
    in_flight: AtomicUsize,
    closing: AtomicBool,
    closed: AtomicBool,
    forced: AtomicBool,
}

impl InMemoryClient {
    fn new(servers: Vec<Arc<InMemoryServer>>, op_delay: Duration) -> Self {
        let endpoints = servers.iter().map(|s| s.endpoint().clone()).collect();
        let servers = servers
            .into_iter()
            .map(|s| (xxh3_64(s.endpoint().to_string().as_bytes()), s))
            .collect();
        Self {
            endpoints,
            servers,
            op_delay,
            in_flight: AtomicUsize::new(0),
            closing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            forced: AtomicBool::new(false),
        }
    }

    /// The server owning `key`: highest rendezvous score wins
    #[must_use]
    pub fn server_for(&self, key: &str) -> Option<&Arc<InMemoryServer>> {
        self.servers
            .iter()
            .max_by_key(|(seed, _)| xxh3_64_with_seed(key.as_bytes(), *seed))
            .map(|(_, server)| server)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Whether `close` gave up waiting on in-flight operations
    #[must_use]
    pub fn was_forced(&self) -> bool {
        self.forced.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn closed_error(&self, operation: &'static str) -> CacheError {
        CacheError::network(
            self.endpoints
                .first()
                .map(ToString::to_string)
                .unwrap_or_default(),
            operation,
            "client is closed",
        )
    }

    async fn execute<T: Send>(
        &self,
        operation: &'static str,
        key: &str,
        f: impl FnOnce(&InMemoryServer) -> T + Send,
    ) -> Result<T> {
        if self.is_closed() {
            return Err(self.closed_error(operation));
        }
        let _in_flight = InFlight::enter(&self.in_flight);

        if !self.op_delay.is_zero() {
            tokio::time::sleep(self.op_delay).await;
        }
        if self.is_closed() {
            return Err(self.closed_error(operation));
        }

        let server = self
            .server_for(key)
            .ok_or_else(|| self.closed_error(operation))?;
        if !server.is_up() {
            return Err(CacheError::network(
                server.endpoint().to_string(),
                operation,
                "connection refused",
            ));
        }
        Ok(f(server.as_ref()))
    }
}

#[async_trait]
impl NetworkCacheClient for InMemoryClient {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.execute("get", key, |server| server.get(key)).await
    }

    async fn set(&self, key: &str, value: Bytes, expiry: DateTime<Utc>) -> Result<()> {
        self.execute("set", key, |server| server.set(key, value, expiry))
            .await
    }

    async fn add(&self, key: &str, value: Bytes, expiry: DateTime<Utc>) -> Result<bool> {
        self.execute("add", key, |server| server.add(key, value, expiry))
            .await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        self.execute("remove", key, |server| server.remove(key)).await
    }

    async fn close(&self, grace: Duration) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }

        let deadline = Instant::now() + grace;
        while self.in_flight() > 0 && Instant::now() < deadline {
            tokio::time::sleep(CLOSE_POLL_INTERVAL).await;
        }

        let outstanding = self.in_flight();
        if outstanding > 0 {
            self.forced.store(true, Ordering::SeqCst);
            debug!(outstanding, "Grace period expired, forcing client closed");
        }
        self.closed.store(true, Ordering::SeqCst);
    }

    fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}

/// Builds [`InMemoryClient`]s against an [`InMemoryCluster`]
///
/// Construction fails when an endpoint has no running server, mirroring a
/// refused connection. Failures and panics can also be injected.
#[derive(Debug)]
pub struct InMemoryConnector {
    cluster: Arc<InMemoryCluster>,
    op_delay: Duration,
    attempts: AtomicU64,
    fail_next: AtomicU64,
    panic_next: AtomicBool,
    clients: Mutex<Vec<Arc<InMemoryClient>>>,
}

impl InMemoryConnector {
    #[must_use]
    pub fn new(cluster: Arc<InMemoryCluster>) -> Self {
        Self {
            cluster,
            op_delay: Duration::ZERO,
            attempts: AtomicU64::new(0),
            fail_next: AtomicU64::new(0),
            panic_next: AtomicBool::new(false),
            clients: Mutex::new(Vec::new()),
        }
    }

    /// Make every operation on built clients take `delay`
    #[must_use]
    pub fn with_op_delay(mut self, delay: Duration) -> Self {
        self.op_delay = delay;
        self
    }

    /// Fail the next `count` constructions
    pub fn fail_next(&self, count: u64) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Panic inside the next construction
    pub fn panic_next(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    /// Construction attempts, failed ones included
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Clients successfully built, oldest first
    #[must_use]
    pub fn clients(&self) -> Vec<Arc<InMemoryClient>> {
        self.clients.lock().clone()
    }

    /// Number of clients successfully built
    #[must_use]
    pub fn constructions(&self) -> usize {
        self.clients.lock().len()
    }
}

#[async_trait]
impl ClientConnector for InMemoryConnector {
    async fn connect(&self, topology: &TopologySnapshot) -> Result<Arc<dyn NetworkCacheClient>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("injected connector panic");
        }
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(CacheError::client_construction(
                topology,
                "injected construction failure",
            ));
        }

        let mut servers = Vec::with_capacity(topology.len());
        for endpoint in topology {
            match self.cluster.server(endpoint) {
                Some(server) if server.is_up() => servers.push(server),
                _ => {
                    return Err(CacheError::client_construction(
                        topology,
                        format!("connection refused by {endpoint}"),
                    ))
                }
            }
        }

        let client = Arc::new(InMemoryClient::new(servers, self.op_delay));
        self.clients.lock().push(Arc::clone(&client));
        Ok(client)
    }
}
