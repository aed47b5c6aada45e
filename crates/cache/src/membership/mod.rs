//! Cluster membership sources
//!
//! A [`MembershipSource`] answers "which servers make up this cache cluster
//! right now". Answers may be empty or stale; the client factory copes with
//! both.

mod dns;
mod static_source;

pub use dns::DnsMembership;
pub use static_source::StaticMembership;

use async_trait::async_trait;
use cachemesh_core::TopologySnapshot;

use crate::errors::Result;

/// Source of the current server set for a named service
#[async_trait]
pub trait MembershipSource: Send + Sync {
    /// Look up the ordered servers currently announced for `service`
    ///
    /// An `Err` is treated as a transient failure: the caller keeps whatever
    /// topology it already has.
    async fn lookup(&self, service: &str) -> Result<TopologySnapshot>;
}
