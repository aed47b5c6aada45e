//! Topology-tracking client factory
//!
//! A [`ClientFactory`] keeps exactly one network client bound to the servers
//! its [`MembershipSource`] currently reports. A background task polls the
//! source and, whenever the answer changes, builds a new client, publishes it
//! atomically and drains the one it replaced.
//!
//! Readers call [`ClientFactory::current_client`] per operation. That call is
//! a single atomic load and never waits on a reconciliation in progress.

mod drain;
mod reconcile;

#[cfg(test)]
mod tests;

pub(crate) use reconcile::ReconcileOutcome;

use arc_swap::ArcSwapOption;
use cachemesh_core::constants::{
    DEFAULT_CACHE_NAME, DEFAULT_DRAIN_GRACE, DEFAULT_GENERATION_POLL_INTERVAL,
    DEFAULT_REDISCOVERY_INTERVAL, DEFAULT_SERVICE_NAME, DEFAULT_SHUTDOWN_GRACE,
};
use cachemesh_core::{Generation, TopologySnapshot};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::client::{ClientConnector, NetworkCacheClient};
use crate::config::CacheConfig;
use crate::errors::{CacheError, Result};
use crate::membership::MembershipSource;

/// Timing and naming for one factory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorySettings {
    /// Name used in logs and `CacheUnavailable` errors
    pub cache_name: String,
    /// Service name passed to the membership source
    pub service_name: String,
    /// Period between background reconciliations
    pub rediscovery_interval: Duration,
    /// Grace period for a client replaced by a newer one
    pub drain_grace: Duration,
    /// Grace period for the last client when the factory stops
    pub shutdown_grace: Duration,
    /// Sleep between checks in [`ClientFactory::await_generation_after`]
    pub poll_interval: Duration,
}

impl Default for FactorySettings {
    fn default() -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            rediscovery_interval: DEFAULT_REDISCOVERY_INTERVAL,
            drain_grace: DEFAULT_DRAIN_GRACE,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            poll_interval: DEFAULT_GENERATION_POLL_INTERVAL,
        }
    }
}

impl From<&CacheConfig> for FactorySettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            cache_name: config.cache_name.clone(),
            service_name: config.service_name.clone(),
            rediscovery_interval: config.rediscovery_interval(),
            drain_grace: config.drain_grace(),
            shutdown_grace: config.shutdown_grace(),
            poll_interval: config.poll_interval(),
        }
    }
}

/// A published client together with the generation and topology it was
/// published for
///
/// Handles are immutable. Holding one keeps its client usable until the
/// drain grace period that follows its replacement expires.
pub struct ClientHandle {
    client: Arc<dyn NetworkCacheClient>,
    generation: Generation,
    topology: Arc<TopologySnapshot>,
}

impl ClientHandle {
    #[must_use]
    pub fn client(&self) -> &Arc<dyn NetworkCacheClient> {
        &self.client
    }

    /// Generation this client was published as
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Servers this client was built for
    #[must_use]
    pub fn topology(&self) -> &TopologySnapshot {
        &self.topology
    }
}

impl Deref for ClientHandle {
    type Target = dyn NetworkCacheClient;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref()
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("generation", &self.generation)
            .field("topology", &self.topology.to_string())
            .finish_non_exhaustive()
    }
}

pub(crate) struct FactoryInner {
    settings: FactorySettings,
    membership: Arc<dyn MembershipSource>,
    connector: Arc<dyn ClientConnector>,
    /// The single published client; `None` when stopped or no servers exist
    current: ArcSwapOption<ClientHandle>,
    /// Last topology a reconciliation claimed, only ever replaced by CAS
    previous: ArcSwapOption<TopologySnapshot>,
    generation: AtomicU64,
    running: AtomicBool,
    /// Serializes `start` and `stop`; holds the background task while running
    lifecycle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Drop for FactoryInner {
    fn drop(&mut self) {
        if let Some(handle) = self.lifecycle.get_mut().take() {
            handle.abort();
        }
        if let Some(handle) = self.current.swap(None) {
            if tokio::runtime::Handle::try_current().is_ok() {
                drain::retire(
                    &self.settings.cache_name,
                    handle,
                    self.settings.shutdown_grace,
                );
            }
        }
    }
}

/// Maintains a network client for the servers a membership source reports
///
/// Cloning is cheap and every clone shares the same published client. The
/// background task stops once the last clone is dropped.
#[derive(Clone)]
pub struct ClientFactory {
    inner: Arc<FactoryInner>,
}

impl fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFactory")
            .field("cache_name", &self.inner.settings.cache_name)
            .field("generation", &self.current_generation())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl ClientFactory {
    #[must_use]
    pub fn new(
        settings: FactorySettings,
        membership: Arc<dyn MembershipSource>,
        connector: Arc<dyn ClientConnector>,
    ) -> Self {
        Self {
            inner: Arc::new(FactoryInner {
                settings,
                membership,
                connector,
                current: ArcSwapOption::empty(),
                previous: ArcSwapOption::empty(),
                generation: AtomicU64::new(Generation::INITIAL.value()),
                running: AtomicBool::new(false),
                lifecycle: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Reconcile once, then keep reconciling in the background
    ///
    /// When this returns, [`current_client`](Self::current_client) reflects
    /// the membership observed during the call. Calling `start` on a running
    /// factory fails with [`CacheError::AlreadyStarted`].
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        if lifecycle.is_some() {
            return Err(CacheError::already_started(&self.inner.settings.cache_name));
        }

        info!(
            cache_name = %self.inner.settings.cache_name,
            service = %self.inner.settings.service_name,
            interval_ms = self.inner.settings.rediscovery_interval.as_millis() as u64,
            "Starting topology discovery"
        );

        let outcome = reconcile::reconcile_guarded(&self.inner).await;
        debug!(?outcome, "Initial reconciliation finished");

        *lifecycle = Some(spawn_reconcile_task(
            Arc::downgrade(&self.inner),
            self.inner.settings.rediscovery_interval,
        ));
        self.inner.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop background reconciliation and close the published client
    ///
    /// Stopping a stopped factory only logs. The generation is left as is so
    /// it keeps counting reconciliations across a restart.
    pub async fn stop(&self) {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        let Some(task) = lifecycle.take() else {
            info!(
                cache_name = %self.inner.settings.cache_name,
                "Cache was already stopped"
            );
            return;
        };

        task.abort();
        // Once the task has finished nothing can publish behind our back
        let _ = task.await;
        self.inner.running.store(false, Ordering::SeqCst);

        // Forget the claimed topology so a later start rebuilds the client
        self.inner.previous.store(None);

        if let Some(handle) = self.inner.current.swap(None) {
            drain::close(
                &self.inner.settings.cache_name,
                handle,
                self.inner.settings.shutdown_grace,
            )
            .await;
        }

        info!(cache_name = %self.inner.settings.cache_name, "Cache stopped");
    }

    /// The published client, if any
    ///
    /// Never blocks and never returns a partially built client.
    #[must_use]
    pub fn current_client(&self) -> Option<Arc<ClientHandle>> {
        self.inner.current.load_full()
    }

    #[must_use]
    pub fn current_generation(&self) -> Generation {
        Generation::new(self.inner.generation.load(Ordering::SeqCst))
    }

    /// Topology of the published client, `None` when no client is published
    #[must_use]
    pub fn current_topology(&self) -> Option<TopologySnapshot> {
        self.current_client().map(|handle| handle.topology().clone())
    }

    /// Wait until the generation moves past `generation`
    ///
    /// Polls at the configured interval. There is no built-in deadline; wrap
    /// the future in `tokio::time::timeout` or drop it to cancel.
    pub async fn await_generation_after(&self, generation: Generation) -> Generation {
        loop {
            let current = self.current_generation();
            if current > generation {
                return current;
            }
            tokio::time::sleep(self.inner.settings.poll_interval).await;
        }
    }

    #[must_use]
    pub fn cache_name(&self) -> &str {
        &self.inner.settings.cache_name
    }

    #[must_use]
    pub fn settings(&self) -> &FactorySettings {
        &self.inner.settings
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Run one reconciliation outside the schedule
    ///
    /// Only for use while no background task runs, so that reconciliations
    /// never overlap.
    #[cfg(test)]
    pub(crate) async fn reconcile_now(&self) -> ReconcileOutcome {
        reconcile::reconcile_guarded(&self.inner).await
    }
}

/// Spawn the recurring reconciliation task
///
/// Ticks run one after another inside a single task, so two reconciliations
/// never overlap. The task only holds a weak reference and ends once the
/// factory is gone.
fn spawn_reconcile_task(inner: Weak<FactoryInner>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let Some(inner) = inner.upgrade() else {
                debug!("Client factory dropped, ending topology discovery");
                break;
            };
            let outcome = reconcile::reconcile_guarded(&inner).await;
            tracing::trace!(?outcome, "Scheduled reconciliation finished");
        }
    })
}
