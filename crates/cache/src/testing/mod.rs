//! In-process cluster for tests and local development
//!
//! Stands in for a real memcached fleet and a real service-discovery client:
//! servers are plain maps, membership is announced by hand, and the client
//! routes keys with rendezvous hashing so that dropping one server only
//! affects the keys that server owned.

mod client;
mod cluster;
mod membership;

pub use client::{InMemoryClient, InMemoryConnector};
pub use cluster::{InMemoryCluster, InMemoryServer};
pub use membership::MockMembership;
