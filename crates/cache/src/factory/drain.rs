//! Closing clients that are no longer published

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::ClientHandle;

/// Close a replaced client off the publishing path
///
/// The handle is already detached; callers still holding it keep working
/// until `grace` runs out.
pub(super) fn retire(cache_name: &str, handle: Arc<ClientHandle>, grace: Duration) {
    let cache_name = cache_name.to_string();
    tokio::spawn(async move {
        close(&cache_name, handle, grace).await;
    });
}

/// Close a detached client, waiting at most `grace` for in-flight operations
pub(super) async fn close(cache_name: &str, handle: Arc<ClientHandle>, grace: Duration) {
    info!(
        cache_name,
        generation = %handle.generation(),
        grace_ms = grace.as_millis() as u64,
        "Shutting down old client"
    );
    handle.client().close(grace).await;
    debug!(cache_name, generation = %handle.generation(), "Finished shutting down old client");
}
