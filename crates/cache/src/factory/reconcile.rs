//! One reconciliation pass: observe, compare, claim, build, publish

use cachemesh_core::{Generation, TopologySnapshot};
use cachemesh_utils::reconcile_span;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn, Instrument};

use super::{drain, ClientHandle, FactoryInner};
use crate::client::NetworkCacheClient;

/// What a reconciliation pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReconcileOutcome {
    /// Membership matched the claimed topology
    Unchanged,
    /// A new client (or its absence) was published
    Published { generation: Generation },
    /// Another pass claimed a topology first
    RaceAbandoned,
    /// The membership source failed
    DiscoveryFailed,
    /// Building a client for the new topology failed
    ConstructionFailed,
    /// The pass panicked and was contained
    Panicked,
}

/// Run one pass with panics contained and the pass wrapped in a span
///
/// Nothing escapes: every failure is logged and turned into an outcome so the
/// scheduled task keeps ticking.
pub(crate) async fn reconcile_guarded(inner: &FactoryInner) -> ReconcileOutcome {
    let span = reconcile_span(&inner.settings.cache_name, &inner.settings.service_name);
    let result = AssertUnwindSafe(reconcile(inner))
        .catch_unwind()
        .instrument(span)
        .await;

    match result {
        Ok(outcome) => outcome,
        Err(payload) => {
            // No claim to undo: a panic while one is held is handled in the pass
            error!(
                cache_name = %inner.settings.cache_name,
                panic = %panic_message(payload.as_ref()),
                "Reconciliation panicked, will retry on the next tick"
            );
            ReconcileOutcome::Panicked
        }
    }
}

async fn reconcile(inner: &FactoryInner) -> ReconcileOutcome {
    trace!(client = ?inner.current.load(), "Cache prior to discovery");

    // Loaded before the lookup so a pass that raced us across the await is
    // detected by the CAS below
    let previous = inner.previous.load_full();

    let observed = match inner.membership.lookup(&inner.settings.service_name).await {
        Ok(topology) => topology,
        Err(e) => {
            warn!(
                service = %inner.settings.service_name,
                error = %e,
                "Membership lookup failed, keeping current client"
            );
            return ReconcileOutcome::DiscoveryFailed;
        }
    };

    if previous.as_deref() == Some(&observed) {
        trace!(topology = %observed, "Topology unchanged, identical list of servers");
        return ReconcileOutcome::Unchanged;
    }

    let topology = Arc::new(observed);
    let claimed = Some(Arc::clone(&topology));
    let won = {
        let witnessed = inner.previous.compare_and_swap(&previous, claimed.clone());
        same_snapshot(&witnessed, &previous)
    };
    if !won {
        warn!(
            topology = %topology,
            current = %display_topology(&inner.previous.load_full()),
            "Tried to claim topology, but it changed behind our back"
        );
        return ReconcileOutcome::RaceAbandoned;
    }

    info!(
        cache_name = %inner.settings.cache_name,
        topology = %topology,
        "Processing topology change"
    );

    let client = if topology.is_empty() {
        warn!(cache_name = %inner.settings.cache_name, "All cache servers disappeared");
        None
    } else {
        debug!("Creating new client");
        let connected = AssertUnwindSafe(inner.connector.connect(&topology))
            .catch_unwind()
            .await;
        match connected {
            Ok(Ok(client)) => Some(client),
            Ok(Err(e)) => {
                error!(
                    cache_name = %inner.settings.cache_name,
                    topology = %topology,
                    error = %e,
                    "Could not connect to cache cluster, keeping current client"
                );
                // Hand the claim back so the next tick retries this topology
                drop(inner.previous.compare_and_swap(&claimed, previous));
                return ReconcileOutcome::ConstructionFailed;
            }
            Err(payload) => {
                error!(
                    cache_name = %inner.settings.cache_name,
                    topology = %topology,
                    panic = %panic_message(payload.as_ref()),
                    "Connector panicked, keeping current client"
                );
                drop(inner.previous.compare_and_swap(&claimed, previous));
                return ReconcileOutcome::Panicked;
            }
        }
    };

    let generation = publish(inner, client, topology);
    info!(
        cache_name = %inner.settings.cache_name,
        generation = %generation,
        available = inner.current.load().is_some(),
        "Finished processing topology change"
    );
    ReconcileOutcome::Published { generation }
}

/// Swap in a new client (or none) and advance the generation by one
///
/// The handle carries its generation before it becomes visible, and the
/// counter moves only after the swap, so a reader that sees generation N can
/// always find a client at least that new.
fn publish(
    inner: &FactoryInner,
    client: Option<Arc<dyn NetworkCacheClient>>,
    topology: Arc<TopologySnapshot>,
) -> Generation {
    let generation = Generation::new(inner.generation.load(Ordering::SeqCst)).next();
    let handle = client.map(|client| {
        Arc::new(ClientHandle {
            client,
            generation,
            topology,
        })
    });

    let retired = inner.current.swap(handle);
    inner.generation.store(generation.value(), Ordering::SeqCst);

    if let Some(retired) = retired {
        drain::retire(&inner.settings.cache_name, retired, inner.settings.drain_grace);
    }
    generation
}

fn same_snapshot(
    a: &Option<Arc<TopologySnapshot>>,
    b: &Option<Arc<TopologySnapshot>>,
) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn display_topology(topology: &Option<Arc<TopologySnapshot>>) -> String {
    topology
        .as_deref()
        .map_or_else(|| "<none>".to_string(), ToString::to_string)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
