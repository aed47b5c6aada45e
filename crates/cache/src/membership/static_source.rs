use async_trait::async_trait;
use cachemesh_core::TopologySnapshot;

use super::MembershipSource;
use crate::errors::Result;

/// Membership fixed at construction, typically from configuration
///
/// Answers the same servers for every service name.
#[derive(Debug, Clone, Default)]
pub struct StaticMembership {
    topology: TopologySnapshot,
}

impl StaticMembership {
    #[must_use]
    pub fn new(topology: TopologySnapshot) -> Self {
        Self { topology }
    }

    /// Build from `host:port` strings
    pub fn parse<I, S>(servers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self::new(TopologySnapshot::parse(servers)?))
    }
}

#[async_trait]
impl MembershipSource for StaticMembership {
    async fn lookup(&self, _service: &str) -> Result<TopologySnapshot> {
        Ok(self.topology.clone())
    }
}
