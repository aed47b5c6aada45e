use super::*;
use crate::testing::{InMemoryCluster, InMemoryConnector, MockMembership};
use async_trait::async_trait;
use bytes::Bytes;
use cachemesh_core::Endpoint;
use chrono::Utc;
use std::sync::atomic::AtomicBool;
use tokio::sync::Notify;

const SERVICE: &str = "memcached-test";
const INTERVAL: Duration = Duration::from_secs(1);

fn settings() -> FactorySettings {
    FactorySettings {
        cache_name: "factory-test".to_string(),
        service_name: SERVICE.to_string(),
        rediscovery_interval: INTERVAL,
        drain_grace: Duration::from_millis(100),
        shutdown_grace: Duration::from_secs(1),
        poll_interval: Duration::from_millis(10),
    }
}

struct Harness {
    membership: Arc<MockMembership>,
    connector: Arc<InMemoryConnector>,
    factory: ClientFactory,
    endpoints: Vec<Endpoint>,
}

impl Harness {
    fn new() -> Self {
        Self::with_connector(|connector| connector)
    }

    fn with_connector(configure: impl FnOnce(InMemoryConnector) -> InMemoryConnector) -> Self {
        let cluster = Arc::new(InMemoryCluster::new());
        let endpoints: Vec<Endpoint> = (1..=3)
            .map(|port| Endpoint::new("127.0.0.1", 11210 + port))
            .collect();
        for endpoint in &endpoints {
            cluster.start_server(endpoint.clone());
        }

        let membership = Arc::new(MockMembership::new());
        let connector = Arc::new(configure(InMemoryConnector::new(cluster)));
        let factory = ClientFactory::new(
            settings(),
            Arc::clone(&membership) as Arc<dyn MembershipSource>,
            Arc::clone(&connector) as Arc<dyn ClientConnector>,
        );

        Self {
            membership,
            connector,
            factory,
            endpoints,
        }
    }

    fn announce_all(&self) {
        for endpoint in &self.endpoints {
            self.membership.announce(SERVICE, endpoint.clone());
        }
    }

    fn published_endpoints(&self) -> Option<Vec<Endpoint>> {
        self.factory
            .current_client()
            .map(|handle| handle.endpoints().to_vec())
    }
}

#[tokio::test(start_paused = true)]
async fn test_start_publishes_before_returning() {
    let h = Harness::new();
    h.announce_all();

    h.factory.start().await.unwrap();

    let handle = h.factory.current_client().expect("client published by start");
    assert_eq!(handle.endpoints(), h.endpoints.as_slice());
    assert_eq!(h.factory.current_generation(), Generation::new(1));
    assert_eq!(handle.generation(), h.factory.current_generation());
    assert!(h.factory.is_running());

    h.factory.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_with_no_servers_publishes_absence() {
    let h = Harness::new();

    h.factory.start().await.unwrap();
    assert!(h.factory.current_client().is_none());
    assert_eq!(h.factory.current_generation(), Generation::new(1));
    assert_eq!(h.connector.attempts(), 0);

    h.announce_all();
    let generation = h.factory.await_generation_after(Generation::new(1)).await;
    assert_eq!(generation, Generation::new(2));
    assert_eq!(h.published_endpoints(), Some(h.endpoints.clone()));

    h.factory.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_topology_does_not_rebuild() {
    let h = Harness::new();
    h.announce_all();
    h.factory.start().await.unwrap();
    let first = h.factory.current_client().unwrap();

    tokio::time::sleep(INTERVAL * 5 + Duration::from_millis(10)).await;

    assert!(h.membership.lookups() >= 6);
    assert_eq!(h.connector.constructions(), 1);
    assert_eq!(h.factory.current_generation(), Generation::new(1));
    assert!(Arc::ptr_eq(&first, &h.factory.current_client().unwrap()));

    h.factory.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_removal_then_readdition_advance_generation_once_each() {
    let h = Harness::new();
    h.announce_all();
    h.factory.start().await.unwrap();
    let before_removal = h.factory.current_generation();

    h.membership.unannounce(SERVICE, &h.endpoints[1]);
    let after_removal = h.factory.await_generation_after(before_removal).await;
    assert_eq!(after_removal, before_removal.next());
    assert_eq!(
        h.published_endpoints(),
        Some(vec![h.endpoints[0].clone(), h.endpoints[2].clone()])
    );

    h.membership.announce(SERVICE, h.endpoints[1].clone());
    let after_readd = h.factory.await_generation_after(after_removal).await;
    assert_eq!(after_readd, after_removal.next());
    let published = h.published_endpoints().unwrap();
    assert_eq!(published.len(), 3);
    for endpoint in &h.endpoints {
        assert!(published.contains(endpoint));
    }
    assert_eq!(h.connector.constructions(), 3);

    h.factory.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_total_loss_publishes_absence() {
    let h = Harness::new();
    h.announce_all();
    h.factory.start().await.unwrap();
    let generation = h.factory.current_generation();

    h.membership.replace(SERVICE, TopologySnapshot::empty());
    let after = h.factory.await_generation_after(generation).await;
    assert_eq!(after, generation.next());
    assert!(h.factory.current_client().is_none());
    assert!(h.factory.current_topology().is_none());

    // The client serving the old topology is drained
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(h.connector.clients()[0].is_closed());

    h.announce_all();
    h.factory.await_generation_after(after).await;
    assert_eq!(h.published_endpoints(), Some(h.endpoints.clone()));

    h.factory.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_fails() {
    let h = Harness::new();
    h.announce_all();
    h.factory.start().await.unwrap();

    let err = h.factory.start().await.unwrap_err();
    assert!(matches!(err, CacheError::AlreadyStarted { .. }));
    assert_eq!(h.factory.current_generation(), Generation::new(1));

    h.factory.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_closes_client_and_is_idempotent() {
    let h = Harness::new();
    h.announce_all();

    // Stopping a factory that never started only logs
    h.factory.stop().await;

    h.factory.start().await.unwrap();
    h.factory.stop().await;

    assert!(!h.factory.is_running());
    assert!(h.factory.current_client().is_none());
    assert!(h.connector.clients()[0].is_closed());
    assert_eq!(h.factory.current_generation(), Generation::new(1));

    h.factory.stop().await;

    // No more lookups once stopped
    let lookups = h.membership.lookups();
    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(h.membership.lookups(), lookups);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_stop_rebuilds_client() {
    let h = Harness::new();
    h.announce_all();
    h.factory.start().await.unwrap();
    h.factory.stop().await;

    h.factory.start().await.unwrap();

    assert_eq!(h.published_endpoints(), Some(h.endpoints.clone()));
    assert_eq!(h.connector.constructions(), 2);
    assert_eq!(h.factory.current_generation(), Generation::new(2));
    assert!(!h.connector.clients()[1].is_closed());

    h.factory.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_discovery_failure_keeps_current_client() {
    let h = Harness::new();
    h.announce_all();
    h.factory.start().await.unwrap();
    let published = h.factory.current_client().unwrap();

    h.membership.set_failing(true);
    h.membership.unannounce(SERVICE, &h.endpoints[0]);
    tokio::time::sleep(INTERVAL * 3 + Duration::from_millis(10)).await;

    assert!(Arc::ptr_eq(&published, &h.factory.current_client().unwrap()));
    assert_eq!(h.factory.current_generation(), Generation::new(1));

    h.membership.set_failing(false);
    h.factory
        .await_generation_after(Generation::new(1))
        .await;
    assert_eq!(h.published_endpoints().unwrap().len(), 2);

    h.factory.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_construction_failure_retries_next_tick() {
    let h = Harness::new();
    h.announce_all();
    h.factory.start().await.unwrap();

    h.connector.fail_next(1);
    h.membership.unannounce(SERVICE, &h.endpoints[2]);

    // First tick fails to build; the old client stays published
    tokio::time::sleep(INTERVAL + Duration::from_millis(10)).await;
    assert_eq!(h.connector.attempts(), 2);
    assert_eq!(h.factory.current_generation(), Generation::new(1));
    assert_eq!(h.published_endpoints(), Some(h.endpoints.clone()));

    // The next tick retries the same target topology
    let generation = h.factory.await_generation_after(Generation::new(1)).await;
    assert_eq!(generation, Generation::new(2));
    assert_eq!(h.connector.attempts(), 3);
    assert_eq!(
        h.published_endpoints(),
        Some(vec![h.endpoints[0].clone(), h.endpoints[1].clone()])
    );

    h.factory.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_connector_panic_does_not_end_reconciliation() {
    let h = Harness::new();
    h.announce_all();
    h.factory.start().await.unwrap();

    h.connector.panic_next();
    h.membership.unannounce(SERVICE, &h.endpoints[0]);

    tokio::time::sleep(INTERVAL + Duration::from_millis(10)).await;
    assert_eq!(h.factory.current_generation(), Generation::new(1));

    let generation = h.factory.await_generation_after(Generation::new(1)).await;
    assert_eq!(generation, Generation::new(2));
    assert_eq!(h.published_endpoints().unwrap().len(), 2);

    h.factory.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_panicking_pass_is_reported() {
    let h = Harness::new();
    h.announce_all();
    h.connector.panic_next();

    assert_eq!(h.factory.reconcile_now().await, ReconcileOutcome::Panicked);
    assert!(h.factory.current_client().is_none());
    assert_eq!(
        h.factory.reconcile_now().await,
        ReconcileOutcome::Published {
            generation: Generation::new(1)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_membership_panic_keeps_claimed_topology() {
    let h = Harness::new();
    h.membership.announce(SERVICE, h.endpoints[0].clone());

    assert_eq!(
        h.factory.reconcile_now().await,
        ReconcileOutcome::Published {
            generation: Generation::new(1)
        }
    );
    let published = h.factory.current_client().unwrap();

    h.membership.panic_next();
    assert_eq!(h.factory.reconcile_now().await, ReconcileOutcome::Panicked);

    // Same servers as before the panic: nothing to rebuild
    assert_eq!(h.factory.reconcile_now().await, ReconcileOutcome::Unchanged);
    assert_eq!(h.factory.current_generation(), Generation::new(1));
    assert_eq!(h.connector.constructions(), 1);
    assert!(Arc::ptr_eq(&published, &h.factory.current_client().unwrap()));
}

#[tokio::test(start_paused = true)]
async fn test_connector_panic_hands_claim_back() {
    let h = Harness::new();
    h.announce_all();
    assert_eq!(
        h.factory.reconcile_now().await,
        ReconcileOutcome::Published {
            generation: Generation::new(1)
        }
    );

    h.membership.unannounce(SERVICE, &h.endpoints[0]);
    h.connector.panic_next();
    assert_eq!(h.factory.reconcile_now().await, ReconcileOutcome::Panicked);
    assert_eq!(h.factory.current_generation(), Generation::new(1));
    assert_eq!(h.published_endpoints(), Some(h.endpoints.clone()));

    // The failed target is retried, not skipped as already claimed
    assert_eq!(
        h.factory.reconcile_now().await,
        ReconcileOutcome::Published {
            generation: Generation::new(2)
        }
    );
    assert_eq!(h.published_endpoints().unwrap().len(), 2);
}

/// Membership that can park the next lookup until released
struct GatedMembership {
    inner: MockMembership,
    hold_next: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedMembership {
    fn new(inner: MockMembership) -> Self {
        Self {
            inner,
            hold_next: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl MembershipSource for GatedMembership {
    async fn lookup(&self, service: &str) -> Result<TopologySnapshot> {
        if self.hold_next.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.lookup(service).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_lost_claim_is_abandoned() {
    let cluster = Arc::new(InMemoryCluster::new());
    let endpoint = Endpoint::new("127.0.0.1", 11211);
    cluster.start_server(endpoint.clone());

    let mock = MockMembership::new();
    mock.announce(SERVICE, endpoint);
    let membership = Arc::new(GatedMembership::new(mock));
    let connector = Arc::new(InMemoryConnector::new(cluster));
    let factory = ClientFactory::new(
        settings(),
        Arc::clone(&membership) as Arc<dyn MembershipSource>,
        Arc::clone(&connector) as Arc<dyn ClientConnector>,
    );

    membership.hold_next.store(true, Ordering::SeqCst);
    let stale = tokio::spawn({
        let factory = factory.clone();
        async move { factory.reconcile_now().await }
    });
    membership.entered.notified().await;

    assert_eq!(
        factory.reconcile_now().await,
        ReconcileOutcome::Published {
            generation: Generation::new(1)
        }
    );

    membership.release.notify_one();
    assert_eq!(stale.await.unwrap(), ReconcileOutcome::RaceAbandoned);
    assert_eq!(factory.current_generation(), Generation::new(1));
    assert_eq!(connector.constructions(), 1);

    // The abandoned pass left the winner's claim in place
    assert_eq!(factory.reconcile_now().await, ReconcileOutcome::Unchanged);
}

#[tokio::test(start_paused = true)]
async fn test_retired_client_finishes_in_flight_work_within_grace() {
    let h = Harness::with_connector(|c| c.with_op_delay(Duration::from_millis(50)));
    h.announce_all();
    h.factory.reconcile_now().await;

    let held = h.factory.current_client().unwrap();
    let op = tokio::spawn(async move {
        held.set(
            "drain-key",
            Bytes::from_static(b"v"),
            Utc::now() + chrono::Duration::hours(1),
        )
        .await
    });
    tokio::task::yield_now().await;

    h.membership.unannounce(SERVICE, &h.endpoints[1]);
    assert!(matches!(
        h.factory.reconcile_now().await,
        ReconcileOutcome::Published { .. }
    ));

    assert!(op.await.unwrap().is_ok());
    tokio::time::sleep(Duration::from_millis(200)).await;
    let retired = &h.connector.clients()[0];
    assert!(retired.is_closed());
    assert!(!retired.was_forced());
}

#[tokio::test(start_paused = true)]
async fn test_retired_client_is_forced_closed_after_grace() {
    let h = Harness::with_connector(|c| c.with_op_delay(Duration::from_millis(500)));
    h.announce_all();
    h.factory.reconcile_now().await;

    let held = h.factory.current_client().unwrap();
    let op = tokio::spawn(async move { held.get("drain-key").await });
    tokio::task::yield_now().await;

    h.membership.unannounce(SERVICE, &h.endpoints[1]);
    h.factory.reconcile_now().await;

    assert!(op.await.unwrap().is_err());
    let retired = &h.connector.clients()[0];
    assert!(retired.is_closed());
    assert!(retired.was_forced());
}

#[tokio::test(start_paused = true)]
async fn test_await_generation_after_can_be_cancelled() {
    let h = Harness::new();
    h.announce_all();
    h.factory.start().await.unwrap();

    let waited = tokio::time::timeout(
        INTERVAL * 3,
        h.factory.await_generation_after(h.factory.current_generation()),
    )
    .await;
    assert!(waited.is_err());

    // A generation already passed returns at once
    assert_eq!(
        h.factory.await_generation_after(Generation::INITIAL).await,
        Generation::new(1)
    );

    h.factory.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_background_task_ends_when_factory_dropped() {
    let h = Harness::new();
    h.announce_all();
    h.factory.start().await.unwrap();
    tokio::time::sleep(INTERVAL * 2 + Duration::from_millis(10)).await;

    let Harness {
        membership,
        connector,
        factory,
        ..
    } = h;
    drop(factory);

    let lookups = membership.lookups();
    tokio::time::sleep(INTERVAL * 5).await;
    assert_eq!(membership.lookups(), lookups);
    assert!(connector.clients()[0].is_closed());
}

#[test]
fn test_settings_from_config() {
    let config = CacheConfig::builder()
        .with_cache_name("sessions")
        .with_service_name("memcached-sessions")
        .with_rediscovery_interval(Duration::from_millis(250))
        .build();

    let settings = FactorySettings::from(&config);
    assert_eq!(settings.cache_name, "sessions");
    assert_eq!(settings.service_name, "memcached-sessions");
    assert_eq!(settings.rediscovery_interval, Duration::from_millis(250));
    assert_eq!(settings.drain_grace, DEFAULT_DRAIN_GRACE);
}
