//! Topology value types

mod endpoint;
mod generation;
mod topology;

pub use endpoint::Endpoint;
pub use generation::Generation;
pub use topology::TopologySnapshot;
